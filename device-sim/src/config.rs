//! Simulator configuration from `DEVICE_SIM_*` environment variables

use std::time::Duration;
use tracing::warn;

/// Where to listen and how slowly to answer
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub listen_addr: String,
    /// Delay before each `ok`, emulating command execution time
    pub ack_delay: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5555".to_string(),
            ack_delay: Duration::ZERO,
        }
    }
}

impl SimConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("DEVICE_SIM_ADDR").filter(|a| !a.trim().is_empty()) {
            config.listen_addr = addr.trim().to_string();
        }

        if let Some(raw) = lookup("DEVICE_SIM_ACK_DELAY_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.ack_delay = Duration::from_millis(ms),
                Err(_) => warn!("Ignoring invalid DEVICE_SIM_ACK_DELAY_MS={:?}", raw),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::from_lookup(|_| None);
        assert_eq!(config.listen_addr, "127.0.0.1:5555");
        assert_eq!(config.ack_delay, Duration::ZERO);
    }

    #[test]
    fn test_overrides() {
        let config = SimConfig::from_lookup(|key| match key {
            "DEVICE_SIM_ADDR" => Some("0.0.0.0:7000".into()),
            "DEVICE_SIM_ACK_DELAY_MS" => Some("25".into()),
            _ => None,
        });
        assert_eq!(config.listen_addr, "0.0.0.0:7000");
        assert_eq!(config.ack_delay, Duration::from_millis(25));
    }

    #[test]
    fn test_invalid_delay_is_ignored() {
        let config = SimConfig::from_lookup(|key| {
            (key == "DEVICE_SIM_ACK_DELAY_MS").then(|| "soon".to_string())
        });
        assert_eq!(config.ack_delay, Duration::ZERO);
    }
}
