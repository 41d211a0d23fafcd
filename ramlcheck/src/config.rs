//! Run-time configuration for suite execution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Knobs for one execution run. Deserializable so a config file can be
/// passed straight through from a driver binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Total attempts per request (first try included).
    pub retry_attempts: u32,
    /// Fixed delay between attempts, in milliseconds. No backoff growth.
    pub retry_delay_ms: u64,
    /// Delay after each generated (autotest) request, in milliseconds,
    /// letting the server settle before the next request.
    pub settle_delay_ms: u64,
    /// Validate responses against the RAML contract.
    pub validate: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 500,
            settle_delay_ms: 500,
            validate: true,
        }
    }
}

impl RunConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// A configuration that never sleeps, for tests.
    pub fn immediate() -> Self {
        Self {
            retry_attempts: 1,
            retry_delay_ms: 0,
            settle_delay_ms: 0,
            validate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: RunConfig = serde_json::from_str(r#"{"retry_attempts": 5}"#).unwrap();
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.retry_delay_ms, 500);
        assert!(config.validate);
    }
}
