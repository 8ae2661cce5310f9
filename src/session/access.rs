//! Hidden access gate for the calibration and factory views
//!
//! Ten taps on the brand title open a code prompt. The code `cal` unlocks
//! calibration, `fset` unlocks factory settings. A gated view locks again as
//! soon as the operator navigates elsewhere.

use crate::types::View;

/// Taps needed to open the code prompt
pub const TAPS_TO_PROMPT: u32 = 10;

/// Outcome of submitting an access code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The view is now unlocked and should be shown
    Unlocked(View),
    Denied,
    /// Prompt dismissed without a code
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    taps: u32,
    calibration_unlocked: bool,
    factory_unlocked: bool,
}

impl AccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tap; true when the code prompt should open
    pub fn tap(&mut self) -> bool {
        self.taps += 1;
        if self.taps >= TAPS_TO_PROMPT {
            self.taps = 0;
            true
        } else {
            false
        }
    }

    /// Check an access code, case- and whitespace-insensitive
    pub fn submit(&mut self, code: &str) -> AccessOutcome {
        let code = code.trim().to_ascii_lowercase();
        match code.as_str() {
            "" => AccessOutcome::Cancelled,
            "cal" => {
                self.calibration_unlocked = true;
                AccessOutcome::Unlocked(View::Calibration)
            }
            "fset" => {
                self.factory_unlocked = true;
                AccessOutcome::Unlocked(View::Factory)
            }
            _ => AccessOutcome::Denied,
        }
    }

    /// Whether `view` may be shown
    pub fn is_unlocked(&self, view: View) -> bool {
        match view {
            View::Calibration => self.calibration_unlocked,
            View::Factory => self.factory_unlocked,
            _ => true,
        }
    }

    /// Re-lock gated views other than `target`
    pub fn navigate(&mut self, target: View) {
        if target != View::Calibration {
            self.calibration_unlocked = false;
        }
        if target != View::Factory {
            self.factory_unlocked = false;
        }
    }
}
