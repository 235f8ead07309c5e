//! Weather capability — current conditions via Open-Meteo.
//!
//! Two upstream calls: geocode the city name, then fetch the current
//! weather at the resolved coordinates.

use async_trait::async_trait;
use serde::Deserialize;
use wayfarer_config::CapabilitiesConfig;
use wayfarer_core::capability::{
    Arguments, Capability, CapabilityId, CapabilityInput, parse_arguments,
};
use wayfarer_core::error::CapabilityError;

use crate::http;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherInput {
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl CapabilityInput for WeatherInput {
    fn validate(&self) -> Result<(), String> {
        if self.city.trim().is_empty() {
            return Err("city must not be empty".into());
        }
        Ok(())
    }
}

pub struct WeatherCapability {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
    timeout_secs: u64,
}

impl WeatherCapability {
    pub fn new(config: &CapabilitiesConfig) -> Self {
        Self {
            client: http::client(config.timeout_secs),
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    async fn geocode(&self, input: &WeatherInput, city: &str) -> Result<Place, CapabilityError> {
        let filtered = input.state.is_some() || input.country.is_some();
        let count = if filtered { 10 } else { 1 };

        let body = http::get_json(
            &self.client,
            http::parse_url(&self.geocoding_url)?,
            &[
                ("name", city.to_string()),
                ("count", count.to_string()),
                ("language", "en".into()),
                ("format", "json".into()),
            ],
            self.timeout_secs,
        )
        .await?;

        let response: GeocodingResponse = serde_json::from_value(body)
            .map_err(|e| CapabilityError::Upstream(format!("malformed geocoding response: {e}")))?;

        let mut places = response.results.unwrap_or_default();
        let chosen = places
            .iter()
            .position(|p| p.matches(input.state.as_deref(), input.country.as_deref()))
            .unwrap_or(0);

        if places.is_empty() {
            return Err(CapabilityError::Upstream(format!(
                "no location found for '{city}'"
            )));
        }
        Ok(places.swap_remove(chosen))
    }
}

#[async_trait]
impl Capability for WeatherCapability {
    fn id(&self) -> CapabilityId {
        CapabilityId::Weather
    }

    fn description(&self) -> &str {
        "Get the current weather for a city: temperature in °C, wind speed and conditions."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name, e.g. \"Paris\""
                },
                "state": {
                    "type": "string",
                    "description": "Optional state or region to disambiguate the city"
                },
                "country": {
                    "type": "string",
                    "description": "Optional country name or ISO code to disambiguate the city"
                }
            },
            "required": ["city"]
        })
    }

    fn validate(&self, arguments: &Arguments) -> Result<(), CapabilityError> {
        parse_arguments::<WeatherInput>(arguments).map(|_| ())
    }

    async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, CapabilityError> {
        let input: WeatherInput = parse_arguments(arguments)?;
        let city = normalize_city(&input.city);

        let place = self.geocode(&input, &city).await?;

        let body = http::get_json(
            &self.client,
            http::parse_url(&self.forecast_url)?,
            &[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                ("current_weather", "true".into()),
            ],
            self.timeout_secs,
        )
        .await?;

        let forecast: ForecastResponse = serde_json::from_value(body)
            .map_err(|e| CapabilityError::Upstream(format!("malformed forecast response: {e}")))?;
        let current = forecast.current_weather.ok_or_else(|| {
            CapabilityError::Upstream("forecast response has no current_weather".into())
        })?;

        Ok(serde_json::json!({
            "city": place.name.unwrap_or(city),
            "country": place.country,
            "latitude": place.latitude,
            "longitude": place.longitude,
            "temperature_c": current.temperature,
            "windspeed_kmh": current.windspeed,
            "conditions_code": current.weathercode,
            "conditions": describe_weather_code(current.weathercode),
        }))
    }
}

/// Trim and collapse internal whitespace.
fn normalize_city(city: &str) -> String {
    city.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Human-readable label for a WMO weather interpretation code.
pub fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61 | 63 | 65 => "rain",
        66 | 67 => "freezing rain",
        71 | 73 | 75 => "snow",
        77 => "snow grains",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95 => "thunderstorm",
        96 | 99 => "thunderstorm with hail",
        _ => "unknown",
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<Place>>,
}

#[derive(Debug, Deserialize)]
struct Place {
    #[serde(default)]
    name: Option<String>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    admin1: Option<String>,
}

impl Place {
    fn matches(&self, state: Option<&str>, country: Option<&str>) -> bool {
        let eq = |a: &Option<String>, b: &str| {
            a.as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(b.trim()))
        };
        let state_ok = state.is_none_or(|s| eq(&self.admin1, s));
        let country_ok =
            country.is_none_or(|c| eq(&self.country, c) || eq(&self.country_code, c));
        state_ok && country_ok
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: u16,
}
