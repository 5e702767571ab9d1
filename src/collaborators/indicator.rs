use tracing::trace;

use super::ActivityIndicator;

// ---

/// Activity indicator for hosts without an LED: state changes become trace events.
#[derive(Debug, Default)]
pub struct LogIndicator {
    lit: bool,
}

impl LogIndicator {
    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl ActivityIndicator for LogIndicator {
    fn on(&mut self) {
        // ---
        if !self.lit {
            trace!("activity on");
        }
        self.lit = true;
    }

    fn off(&mut self) {
        // ---
        if self.lit {
            trace!("activity off");
        }
        self.lit = false;
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_toggles() {
        // ---
        let mut led = LogIndicator::default();
        assert!(!led.is_lit());
        led.on();
        led.on();
        assert!(led.is_lit());
        led.off();
        assert!(!led.is_lit());
    }
}
