// Engine configuration: retry budgets, candidate filters and classifier markers

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Attempt and time bounds for one retry scope.
///
/// `deadline_ms` caps wall-clock time across every combination tried for a
/// single hotel; when unset only the attempt count bounds the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub inter_attempt_delay_ms: u64,
    pub deadline_ms: Option<u64>,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            inter_attempt_delay_ms: 1000,
            deadline_ms: None,
        }
    }
}

impl RetryBudget {
    pub fn deadline_bounded() -> Self {
        Self {
            deadline_ms: Some(30_000),
            ..Self::default()
        }
    }

    pub fn inter_attempt_delay(&self) -> Duration {
        Duration::from_millis(self.inter_attempt_delay_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightPolicy {
    pub max_duration_minutes: u32,
    // Share of the price-sorted list dropped at each end
    pub outlier_trim_fraction: f64,
}

impl Default for FlightPolicy {
    fn default() -> Self {
        Self {
            max_duration_minutes: 24 * 60,
            outlier_trim_fraction: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotelPolicy {
    pub max_hotel_attempts: u32,
    pub rate_retry: RetryBudget,
}

impl Default for HotelPolicy {
    fn default() -> Self {
        Self {
            max_hotel_attempts: 3,
            rate_retry: RetryBudget::default(),
        }
    }
}

/// Provider markers the error classifier looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Error codes meaning "this exact offer is gone".
    pub skip_codes: Vec<String>,
    /// Message fragments meaning the rate can be asked for again.
    pub availability_patterns: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            skip_codes: vec!["1000".to_string(), "50".to_string()],
            availability_patterns: vec![
                "Not Available".to_string(),
                "Price Changed".to_string(),
                "Sold out".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub flight: FlightPolicy,
    pub hotel: HotelPolicy,
    pub classifier: ClassifierConfig,
}

impl EngineConfig {
    /// Parses a JSON document; missing sections fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hotel.max_hotel_attempts == 0 {
            return Err(ConfigError::Invalid(
                "hotel.max_hotel_attempts must be at least 1".to_string(),
            ));
        }
        if self.hotel.rate_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "hotel.rate_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.hotel.rate_retry.deadline_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "hotel.rate_retry.deadline_ms must be positive when set".to_string(),
            ));
        }

        let trim = self.flight.outlier_trim_fraction;
        if !(0.0..0.5).contains(&trim) {
            return Err(ConfigError::Invalid(format!(
                "flight.outlier_trim_fraction must be in [0, 0.5), got {trim}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_provider_limits() {
        let config = EngineConfig::default();
        assert_eq!(config.hotel.max_hotel_attempts, 3);
        assert_eq!(config.hotel.rate_retry.max_attempts, 5);
        assert_eq!(
            config.hotel.rate_retry.inter_attempt_delay(),
            Duration::from_secs(1)
        );
        assert_eq!(config.hotel.rate_retry.deadline(), None);
        assert_eq!(config.flight.max_duration_minutes, 1440);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deadline_bounded_preset() {
        let budget = RetryBudget::deadline_bounded();
        assert_eq!(budget.max_attempts, 5);
        assert_eq!(budget.deadline(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "hotel": { "rate_retry": { "deadline_ms": 30000 } } }"#,
        )
        .unwrap();

        assert_eq!(config.hotel.max_hotel_attempts, 3);
        assert_eq!(config.hotel.rate_retry.max_attempts, 5);
        assert_eq!(config.hotel.rate_retry.deadline_ms, Some(30000));
        assert_eq!(config.classifier, ClassifierConfig::default());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let result = EngineConfig::from_json_str(r#"{ "hotel": { "max_hotel_attempts": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result =
            EngineConfig::from_json_str(r#"{ "flight": { "outlier_trim_fraction": 0.5 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = EngineConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
