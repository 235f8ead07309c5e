//! Currency conversion capability backed by exchangerate-api v4.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use wayfarer_config::CapabilitiesConfig;
use wayfarer_core::capability::{
    Arguments, Capability, CapabilityId, CapabilityInput, parse_arguments,
};
use wayfarer_core::error::CapabilityError;

use crate::http;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvertInput {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

impl CapabilityInput for ConvertInput {
    fn validate(&self) -> Result<(), String> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err("amount must be a non-negative number".into());
        }
        for (field, code) in [("from", &self.from), ("to", &self.to)] {
            let code = code.trim();
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(format!("'{field}' must be a 3-letter currency code"));
            }
        }
        Ok(())
    }
}

pub struct CurrencyCapability {
    client: reqwest::Client,
    exchange_url: String,
    timeout_secs: u64,
}

impl CurrencyCapability {
    pub fn new(config: &CapabilitiesConfig) -> Self {
        Self {
            client: http::client(config.timeout_secs),
            exchange_url: config.exchange_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait]
impl Capability for CurrencyCapability {
    fn id(&self) -> CapabilityId {
        CapabilityId::CurrencyConvert
    }

    fn description(&self) -> &str {
        "Convert an amount of money between two currencies using the latest exchange rate."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "number",
                    "minimum": 0,
                    "description": "Amount to convert"
                },
                "from": {
                    "type": "string",
                    "description": "ISO 4217 source currency code, e.g. \"EUR\""
                },
                "to": {
                    "type": "string",
                    "description": "ISO 4217 target currency code, e.g. \"USD\""
                }
            },
            "required": ["amount", "from", "to"]
        })
    }

    fn validate(&self, arguments: &Arguments) -> Result<(), CapabilityError> {
        parse_arguments::<ConvertInput>(arguments).map(|_| ())
    }

    async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, CapabilityError> {
        let input: ConvertInput = parse_arguments(arguments)?;
        let from = input.from.trim().to_ascii_uppercase();
        let to = input.to.trim().to_ascii_uppercase();

        let mut url = http::parse_url(&self.exchange_url)?;
        url.path_segments_mut()
            .map_err(|_| {
                CapabilityError::Upstream(format!("invalid exchange url '{}'", self.exchange_url))
            })?
            .pop_if_empty()
            .push(&from);

        let body = http::get_json(&self.client, url, &[], self.timeout_secs).await?;
        let rates: RatesResponse = serde_json::from_value(body)
            .map_err(|e| CapabilityError::Upstream(format!("malformed rates response: {e}")))?;

        let rate = rates.rates.get(&to).copied().ok_or_else(|| {
            CapabilityError::Upstream(format!("unable to convert {from} to {to}"))
        })?;

        Ok(serde_json::json!({
            "amount": input.amount,
            "from": from,
            "to": to,
            "rate": rate,
            "result": round_cents(input.amount * rate),
            "date": rates.date,
        }))
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}
