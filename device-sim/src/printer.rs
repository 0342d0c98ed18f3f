//! Emulated printer firmware
//!
//! Pure state: feed it received lines, get back the lines it would print.

use gstream_shared::sanitize_line;
use std::time::Duration;

const AMBIENT: f32 = 21.0;

/// Heater state plus the temperature auto-report period
#[derive(Debug, Clone)]
pub struct Printer {
    hotend: f32,
    hotend_target: f32,
    bed: f32,
    bed_target: f32,
    auto_report: Option<Duration>,
    lines_handled: u64,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer {
    pub fn new() -> Self {
        Self {
            hotend: AMBIENT,
            hotend_target: 0.0,
            bed: AMBIENT,
            bed_target: 0.0,
            auto_report: None,
            lines_handled: 0,
        }
    }

    /// Period requested by the last `M155`, `None` when reports are off
    pub fn auto_report(&self) -> Option<Duration> {
        self.auto_report
    }

    pub fn lines_handled(&self) -> u64 {
        self.lines_handled
    }

    /// Handle one received line and return the reply lines, unterminated
    ///
    /// Blank lines and bare comments get no reply. Everything else is
    /// acknowledged exactly once.
    pub fn handle_line(&mut self, line: &str) -> Vec<String> {
        let Some(command) = sanitize_line(line) else {
            return Vec::new();
        };
        self.lines_handled += 1;

        let mut words = command.code().split_whitespace();
        let code = words.next().unwrap_or_default().to_ascii_uppercase();
        let s_param = words
            .filter_map(|w| w.strip_prefix('S').or_else(|| w.strip_prefix('s')))
            .find_map(|v| v.parse::<f32>().ok());

        match code.as_str() {
            "M105" => return vec![format!("ok {}", self.temperature_report())],
            "M155" => {
                self.auto_report = match s_param {
                    Some(secs) if secs > 0.0 => Duration::try_from_secs_f32(secs).ok(),
                    _ => None,
                };
            }
            "M104" | "M109" => {
                if let Some(target) = s_param {
                    self.hotend_target = target;
                }
            }
            "M140" | "M190" => {
                if let Some(target) = s_param {
                    self.bed_target = target;
                }
            }
            _ => {}
        }
        vec!["ok".to_string()]
    }

    /// Move both heaters halfway to their targets
    pub fn tick(&mut self) {
        self.hotend = approach(self.hotend, self.hotend_target);
        self.bed = approach(self.bed, self.bed_target);
    }

    /// `T:<hotend> /<target> B:<bed> /<target>`
    pub fn temperature_report(&self) -> String {
        format!(
            "T:{:.1} /{:.1} B:{:.1} /{:.1}",
            self.hotend, self.hotend_target, self.bed, self.bed_target
        )
    }
}

fn approach(current: f32, target: f32) -> f32 {
    let goal = target.max(AMBIENT);
    current + (goal - current) / 2.0
}
