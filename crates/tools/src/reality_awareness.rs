//! Reality awareness tool: current time plus weather for a city.
//!
//! Time comes from the local clock; weather is derived deterministically
//! from the city name so the agent loop can be exercised offline.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolResult};

pub struct RealityAwarenessTool;

#[async_trait]
impl Tool for RealityAwarenessTool {
    fn name(&self) -> &str {
        "reality_awareness"
    }

    fn description(&self) -> &str {
        "Report the current date and time together with the weather for a given city."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "(required) The city to report the weather for"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let city = arguments["city"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'city' argument".into()))?;

        let report = Report::new(city, Local::now());
        let data = serde_json::to_value(&report).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "reality_awareness".into(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult::success(report.render()).with_data(data))
    }
}

#[derive(Debug, Serialize)]
struct Report {
    city: String,
    local_time: String,
    weekday: String,
    weather: String,
    temperature_c: i32,
    humidity: u32,
    wind: String,
}

impl Report {
    fn new(city: &str, now: DateTime<Local>) -> Self {
        let hash = city
            .to_lowercase()
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

        let conditions = ["Sunny", "Cloudy", "Overcast", "Light rain", "Showers", "Thunderstorm", "Snow", "Haze"];
        let directions = ["north", "northeast", "east", "southeast", "south", "southwest", "west", "northwest"];

        Self {
            city: city.to_string(),
            local_time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            weekday: now.format("%A").to_string(),
            weather: conditions[(hash as usize / 7) % conditions.len()].to_string(),
            temperature_c: (hash % 40) as i32 - 5,
            humidity: 30 + hash % 60,
            wind: format!(
                "{} wind, force {}",
                directions[(hash as usize / 3) % directions.len()],
                1 + hash % 6
            ),
        }
    }

    fn render(&self) -> String {
        format!(
            "Current time: {} ({})\nWeather in {}: {}, {}°C, humidity {}%, {}",
            self.local_time,
            self.weekday,
            self.city,
            self.weather,
            self.temperature_c,
            self.humidity,
            self.wind
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn reports_time_and_weather() {
        let result = RealityAwarenessTool
            .execute(serde_json::json!({"city": "Beijing"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("Current time:"));
        assert!(result.output.contains("Weather in Beijing"));
        assert!(result.data.is_some());
    }

    #[test]
    fn weather_is_stable_per_city() {
        let now = Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let a = Report::new("London", now);
        let b = Report::new("london", now);
        assert_eq!(a.weather, b.weather);
        assert_eq!(a.temperature_c, b.temperature_c);
        assert_eq!(a.local_time, "2026-03-01 09:30:00");
        assert_eq!(a.weekday, "Sunday");
    }

    #[test]
    fn values_stay_in_range() {
        let now = Local::now();
        for city in ["Tokyo", "Lagos", "Reykjavik", "Lima"] {
            let report = Report::new(city, now);
            assert!((-5..35).contains(&report.temperature_c));
            assert!((30..90).contains(&report.humidity));
        }
    }

    #[tokio::test]
    async fn missing_city_returns_error() {
        let result = RealityAwarenessTool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
