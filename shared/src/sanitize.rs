//! Line sanitizer
//!
//! Reduces a raw G-code line to a transmittable [`Command`]:
//!
//! ```text
//! "  G1 X10 ; move  "  ->  "G1 X10\n"
//! "; full-line comment" ->  skip
//! "   "                 ->  skip
//! ```

use crate::protocol::COMMENT_MARKER;
use crate::Command;
use tracing::trace;

/// Why a line produced no command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Empty or whitespace only
    Blank,
    /// First non-space character is the comment marker
    Comment,
}

/// Outcome of sanitizing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sanitized {
    /// Nothing to send
    Skip(SkipReason),
    /// A command ready for the queue
    Command(Command),
}

impl Sanitized {
    /// The command, if the line produced one
    pub fn into_command(self) -> Option<Command> {
        match self {
            Sanitized::Command(cmd) => Some(cmd),
            Sanitized::Skip(_) => None,
        }
    }
}

/// Sanitize a single raw line
pub fn sanitize(line: &str) -> Sanitized {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return Sanitized::Skip(SkipReason::Blank);
    }

    match trimmed.find(COMMENT_MARKER) {
        Some(0) => {
            trace!("Is comment: {}", trimmed);
            Sanitized::Skip(SkipReason::Comment)
        }
        // Anything before the marker is non-blank since the line is trimmed
        Some(idx) => Sanitized::Command(Command::from_code(trimmed[..idx].trim_end())),
        None => Sanitized::Command(Command::from_code(trimmed)),
    }
}

/// Sanitize a line, returning `None` when it should be skipped
pub fn sanitize_line(line: &str) -> Option<Command> {
    sanitize(line).into_command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_command() {
        let cmd = sanitize_line("G1 X10").unwrap();
        assert_eq!(cmd.as_str(), "G1 X10\n");
    }

    #[test]
    fn test_full_line_comment_skipped() {
        assert_eq!(sanitize("; layer 1"), Sanitized::Skip(SkipReason::Comment));
        assert_eq!(sanitize(";"), Sanitized::Skip(SkipReason::Comment));
    }

    #[test]
    fn test_indented_comment_skipped() {
        assert_eq!(
            sanitize("    ;TYPE:WALL-OUTER"),
            Sanitized::Skip(SkipReason::Comment)
        );
        assert_eq!(sanitize("\t; tabbed"), Sanitized::Skip(SkipReason::Comment));
    }

    #[test]
    fn test_trailing_comment_removed() {
        let cmd = sanitize_line("G1 Y10 ; move").unwrap();
        assert_eq!(cmd.as_str(), "G1 Y10\n");

        let cmd = sanitize_line("M104 S200;set hotend").unwrap();
        assert_eq!(cmd.as_str(), "M104 S200\n");
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let cmd = sanitize_line("   G28 X Y   \r").unwrap();
        assert_eq!(cmd.as_str(), "G28 X Y\n");
    }

    #[test]
    fn test_blank_lines_skipped() {
        assert_eq!(sanitize(""), Sanitized::Skip(SkipReason::Blank));
        assert_eq!(sanitize("   "), Sanitized::Skip(SkipReason::Blank));
        assert_eq!(sanitize("\t \r"), Sanitized::Skip(SkipReason::Blank));
        assert!(sanitize_line(" \n").is_none());
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let lines = [
            "G1 X10",
            "  G1 Y10 ; move ",
            "M107",
            "G1 F1500 E-6.5;retract",
        ];

        for line in lines {
            let once = sanitize_line(line).unwrap();
            let twice = sanitize_line(once.as_str()).unwrap();
            assert_eq!(once, twice, "sanitizing {:?} twice changed it", line);
        }
    }

    #[test]
    fn test_only_first_marker_matters() {
        let cmd = sanitize_line("M117 Hi ; a ; b").unwrap();
        assert_eq!(cmd.as_str(), "M117 Hi\n");
    }
}
