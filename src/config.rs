//! Streamer configuration
//!
//! Defaults match a single USB-attached printer streaming `./hook.gcode`.
//! Each field can be overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `GSTREAM_SOURCE` | `source_path` |
//! | `GSTREAM_PORTS` | `ports` (comma separated) |
//! | `GSTREAM_BAUD` | `baud_rate` |
//! | `GSTREAM_TCP` | `tcp_address` |
//! | `GSTREAM_ACK_TIMEOUT_MS` | `ack_timeout` |
//! | `GSTREAM_QUEUE_CAPACITY` | `queue_capacity` |
//! | `GSTREAM_SKIP_HANDSHAKE` | `handshake` |

use gstream_shared::protocol;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Configuration for a streaming run
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// G-code file streamed to every device
    pub source_path: PathBuf,
    /// Explicit serial ports; empty means enumerate
    pub ports: Vec<String>,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Stream to a TCP-attached device instead of serial ports
    pub tcp_address: Option<String>,
    /// Command queue capacity (producer run-ahead)
    pub queue_capacity: usize,
    /// Response stream capacity
    pub ack_capacity: usize,
    /// Give up on a command after this long; `None` waits forever
    pub ack_timeout: Option<Duration>,
    /// Send the status query and auto-report request before streaming
    pub handshake: bool,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("./hook.gcode"),
            ports: Vec::new(),
            baud_rate: protocol::DEFAULT_BAUD_RATE,
            tcp_address: None,
            queue_capacity: protocol::COMMAND_QUEUE_CAPACITY,
            ack_capacity: protocol::ACK_STREAM_CAPACITY,
            ack_timeout: None,
            handshake: true,
        }
    }
}

impl StreamerConfig {
    /// Defaults overridden by `GSTREAM_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("GSTREAM_SOURCE") {
            config.source_path = PathBuf::from(path);
        }

        if let Some(ports) = lookup("GSTREAM_PORTS") {
            config.ports = ports
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(addr) = lookup("GSTREAM_TCP").filter(|a| !a.trim().is_empty()) {
            config.tcp_address = Some(addr.trim().to_string());
        }

        if let Some(baud) = parse_var(&lookup, "GSTREAM_BAUD") {
            config.baud_rate = baud;
        }

        match parse_var::<usize, _>(&lookup, "GSTREAM_QUEUE_CAPACITY") {
            Some(0) => warn!("GSTREAM_QUEUE_CAPACITY must be positive, keeping default"),
            Some(capacity) => config.queue_capacity = capacity,
            None => {}
        }

        match parse_var::<u64, _>(&lookup, "GSTREAM_ACK_TIMEOUT_MS") {
            Some(0) => config.ack_timeout = None,
            Some(ms) => config.ack_timeout = Some(Duration::from_millis(ms)),
            None => {}
        }

        if let Some(skip) = lookup("GSTREAM_SKIP_HANDSHAKE") {
            config.handshake = !matches!(skip.trim(), "1" | "true" | "yes");
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = StreamerConfig::default();
        assert_eq!(config.source_path, PathBuf::from("./hook.gcode"));
        assert_eq!(config.queue_capacity, 50);
        assert_eq!(config.ack_capacity, 5);
        assert_eq!(config.baud_rate, 115_200);
        assert!(config.ack_timeout.is_none());
        assert!(config.handshake);
    }

    #[test]
    fn test_env_overrides() {
        let config = StreamerConfig::from_lookup(lookup_from(&[
            ("GSTREAM_SOURCE", "/tmp/part.gcode"),
            ("GSTREAM_PORTS", "/dev/ttyUSB0, /dev/ttyACM1,"),
            ("GSTREAM_BAUD", "250000"),
            ("GSTREAM_ACK_TIMEOUT_MS", "1500"),
            ("GSTREAM_SKIP_HANDSHAKE", "true"),
        ]));

        assert_eq!(config.source_path, PathBuf::from("/tmp/part.gcode"));
        assert_eq!(config.ports, vec!["/dev/ttyUSB0", "/dev/ttyACM1"]);
        assert_eq!(config.baud_rate, 250_000);
        assert_eq!(config.ack_timeout, Some(Duration::from_millis(1500)));
        assert!(!config.handshake);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = StreamerConfig::from_lookup(lookup_from(&[
            ("GSTREAM_BAUD", "fast"),
            ("GSTREAM_QUEUE_CAPACITY", "0"),
            ("GSTREAM_TCP", "  "),
        ]));

        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.queue_capacity, 50);
        assert!(config.tcp_address.is_none());
    }

    #[test]
    fn test_zero_timeout_means_wait_forever() {
        let config =
            StreamerConfig::from_lookup(lookup_from(&[("GSTREAM_ACK_TIMEOUT_MS", "0")]));
        assert!(config.ack_timeout.is_none());
    }
}
