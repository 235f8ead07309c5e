//! Encyclopedic search capability — MediaWiki search plus the REST summary.

use async_trait::async_trait;
use serde::Deserialize;
use wayfarer_config::CapabilitiesConfig;
use wayfarer_core::capability::{
    Arguments, Capability, CapabilityId, CapabilityInput, parse_arguments,
};
use wayfarer_core::error::CapabilityError;

use crate::http;

const MAX_SENTENCES: u32 = 10;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchInput {
    pub query: String,
    #[serde(default)]
    pub sentences: Option<u32>,
}

impl CapabilityInput for SearchInput {
    fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }
        if let Some(n) = self.sentences
            && !(1..=MAX_SENTENCES).contains(&n)
        {
            return Err(format!("sentences must be between 1 and {MAX_SENTENCES}"));
        }
        Ok(())
    }
}

pub struct WikipediaCapability {
    client: reqwest::Client,
    base_url: String,
    default_sentences: u32,
    timeout_secs: u64,
}

impl WikipediaCapability {
    pub fn new(config: &CapabilitiesConfig) -> Self {
        Self {
            client: http::client(config.timeout_secs),
            base_url: config.wikipedia_url.trim_end_matches('/').to_string(),
            default_sentences: config.default_sentences.clamp(1, MAX_SENTENCES),
            timeout_secs: config.timeout_secs,
        }
    }

    async fn first_hit(&self, query: &str) -> Result<String, CapabilityError> {
        let url = http::parse_url(&format!("{}/w/api.php", self.base_url))?;
        let body = http::get_json(
            &self.client,
            url,
            &[
                ("action", "query".into()),
                ("list", "search".into()),
                ("srsearch", query.to_string()),
                ("srlimit", "5".into()),
                ("format", "json".into()),
            ],
            self.timeout_secs,
        )
        .await?;

        let response: SearchResponse = serde_json::from_value(body)
            .map_err(|e| CapabilityError::Upstream(format!("malformed search response: {e}")))?;

        response
            .query
            .search
            .into_iter()
            .next()
            .map(|hit| hit.title)
            .ok_or_else(|| {
                CapabilityError::Upstream(format!("no Wikipedia articles found for '{query}'"))
            })
    }

    async fn summary(&self, title: &str) -> Result<Summary, CapabilityError> {
        let mut url = http::parse_url(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| {
                CapabilityError::Upstream(format!("invalid wikipedia url '{}'", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "rest_v1", "page", "summary", &title.replace(' ', "_")]);

        let body = http::get_json(&self.client, url, &[], self.timeout_secs).await?;
        serde_json::from_value(body)
            .map_err(|e| CapabilityError::Upstream(format!("malformed summary response: {e}")))
    }
}

#[async_trait]
impl Capability for WikipediaCapability {
    fn id(&self) -> CapabilityId {
        CapabilityId::WikipediaSearch
    }

    fn description(&self) -> &str {
        "Search Wikipedia and return a short summary of the best matching article."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search term or article title"
                },
                "sentences": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_SENTENCES,
                    "description": "Number of summary sentences to return"
                }
            },
            "required": ["query"]
        })
    }

    fn validate(&self, arguments: &Arguments) -> Result<(), CapabilityError> {
        parse_arguments::<SearchInput>(arguments).map(|_| ())
    }

    async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, CapabilityError> {
        let input: SearchInput = parse_arguments(arguments)?;
        let query = input.query.trim();
        let sentences = input.sentences.unwrap_or(self.default_sentences);

        let title = self.first_hit(query).await?;
        let summary = self.summary(&title).await?;

        Ok(serde_json::json!({
            "title": summary.title.unwrap_or(title),
            "summary": first_sentences(&summary.extract, sentences as usize),
            "url": summary
                .content_urls
                .and_then(|u| u.desktop)
                .map(|d| d.page),
        }))
    }
}

/// Keep the first `n` sentences of `text`.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or end of text.
fn first_sentences(text: &str, n: usize) -> String {
    let mut count = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if at_boundary {
                count += 1;
                if count == n {
                    return text[..i + c.len_utf8()].trim().to_string();
                }
            }
        }
    }
    text.trim().to_string()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    #[serde(default)]
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: String,
}
