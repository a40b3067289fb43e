//! Current weather lookup via Open-Meteo (no API key required)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ParamType, Tool, ToolArgs, ToolError, ToolHandler, ToolParam};
use crate::Result;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Build the `get_weather` tool
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built
pub fn tool(timeout: Duration) -> Result<Tool> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("camille/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(Tool::new("get_weather", WeatherTool { client }))
}

struct WeatherTool {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentWeather,
}

/// Current conditions as reported by the forecast API
#[derive(Debug, Deserialize)]
pub struct CurrentWeather {
    #[serde(rename = "temperature_2m")]
    pub temperature: f64,
    #[serde(rename = "relative_humidity_2m")]
    pub humidity: f64,
    #[serde(rename = "weather_code")]
    pub code: u8,
}

impl WeatherTool {
    async fn locate(&self, city: &str) -> std::result::Result<Option<Place>, ToolError> {
        let response = self
            .client
            .get(GEOCODING_URL)
            .query(&[("name", city), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ToolError::Failed(format!("geocoding failed: {e}")))?;

        let body: GeocodingResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Failed(format!("invalid geocoding response: {e}")))?;

        Ok(body.results.into_iter().next())
    }

    async fn current(&self, place: &Place) -> std::result::Result<CurrentWeather, ToolError> {
        let response = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,weather_code".to_string(),
                ),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ToolError::Failed(format!("forecast failed: {e}")))?;

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Failed(format!("invalid forecast response: {e}")))?;

        Ok(body.current)
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    fn doc(&self) -> &str {
        "Get the current weather for a specific city. Only accepts real city names as input."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required("city", ParamType::String).describe("Name of the city")]
    }

    async fn call(&self, args: ToolArgs) -> std::result::Result<String, ToolError> {
        let city = args.str("city")?.trim();
        if city.is_empty() {
            return Err(ToolError::InvalidArguments("'city' must not be empty".to_string()));
        }

        let Some(place) = self.locate(city).await? else {
            return Ok(format!("I couldn't find a city named {city}."));
        };

        let current = self.current(&place).await?;
        tracing::debug!(city = %place.name, code = current.code, "weather fetched");
        Ok(format_report(&place.name, &current))
    }
}

/// Sentence describing current conditions
#[must_use]
pub fn format_report(city: &str, current: &CurrentWeather) -> String {
    format!(
        "The weather in {city} is {:.0}°C with {}. Humidity is {:.0}%.",
        current.temperature,
        describe_code(current.code),
        current.humidity
    )
}

/// Plain-language description of a WMO weather code
#[must_use]
pub const fn describe_code(code: u8) -> &'static str {
    match code {
        0 => "clear skies",
        1 => "mostly clear skies",
        2 => "partly cloudy skies",
        3 => "overcast skies",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61 | 63 => "rain",
        65 => "heavy rain",
        66 | 67 => "freezing rain",
        71 | 73 | 75 | 77 => "snow",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95..=99 => "thunderstorms",
        _ => "unknown conditions",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_report() {
        let current = CurrentWeather {
            temperature: 18.4,
            humidity: 62.0,
            code: 0,
        };
        assert_eq!(
            format_report("Paris", &current),
            "The weather in Paris is 18°C with clear skies. Humidity is 62%."
        );
    }

    #[test]
    fn test_describe_code() {
        assert_eq!(describe_code(3), "overcast skies");
        assert_eq!(describe_code(81), "rain showers");
        assert_eq!(describe_code(96), "thunderstorms");
        assert_eq!(describe_code(200), "unknown conditions");
    }

    #[test]
    fn test_forecast_parses() {
        let body = r#"{"current": {"time": "2024-05-01T12:00", "temperature_2m": 21.3,
            "relative_humidity_2m": 40, "weather_code": 2}}"#;
        let parsed: ForecastResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.current.code, 2);
        assert!((parsed.current.humidity - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_schema() {
        let schema = tool(Duration::from_secs(5)).unwrap().to_schema();
        assert_eq!(schema.name, "get_weather");
        assert!(schema.description.starts_with("Get the current weather"));
        assert_eq!(schema.parameters["required"], serde_json::json!(["city"]));
    }
}
