//! Device response classification
//!
//! Only [`is_acknowledgement`] gates streaming. The remaining kinds decide how
//! loudly a discarded line is logged.

use crate::protocol::ACK_TOKEN;

/// Kind of a line received from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Acknowledgement of the last command
    Ok,
    /// Temperature report, e.g. `T:200.0 /200.0 B:60.0 /60.0`
    Temperature,
    /// Firmware keep-alive while a long command runs
    Busy,
    /// Firmware rejected something
    Error,
    /// Informational output such as `echo:` lines
    Echo,
    /// Anything else
    Other,
}

impl Response {
    /// Classify a response line
    pub fn classify(line: &str) -> Self {
        if is_acknowledgement(line) {
            return Response::Ok;
        }

        let line = line.trim_start();
        if line.starts_with("error:") || line.starts_with("Error:") || line.starts_with("!!") {
            Response::Error
        } else if line.contains("busy:") {
            Response::Busy
        } else if line.contains("T:") {
            Response::Temperature
        } else if line.starts_with("echo:") {
            Response::Echo
        } else {
            Response::Other
        }
    }
}

/// Whether a response line acknowledges the command in flight
///
/// Plain substring match: `ok`, `ok T:21.0` and `echo:SD card ok` all count.
pub fn is_acknowledgement(line: &str) -> bool {
    line.contains(ACK_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledgements() {
        assert!(is_acknowledgement("ok"));
        assert!(is_acknowledgement("ok T:21.3 /0.0 B:20.9 /0.0"));
        assert!(is_acknowledgement("  ok"));
        assert!(!is_acknowledgement("OK"));
        assert!(!is_acknowledgement("T:21.3 /0.0"));
        assert!(!is_acknowledgement(""));
    }

    #[test]
    fn test_classify() {
        assert_eq!(Response::classify("ok"), Response::Ok);
        assert_eq!(
            Response::classify(" T:199.8 /200.0 B:60.1 /60.0 @:64 B@:0"),
            Response::Temperature
        );
        assert_eq!(
            Response::classify("echo:busy: processing"),
            Response::Busy
        );
        assert_eq!(
            Response::classify("Error:Printer halted. kill() called!"),
            Response::Error
        );
        assert_eq!(Response::classify("error:Unknown command"), Response::Error);
        assert_eq!(
            Response::classify("echo:Active Extruder: 0"),
            Response::Echo
        );
        assert_eq!(Response::classify("start"), Response::Other);
    }

    #[test]
    fn test_substring_ack_wins() {
        // Some firmwares end informational lines with "ok"
        assert_eq!(Response::classify("echo:SD card ok"), Response::Ok);
    }
}
