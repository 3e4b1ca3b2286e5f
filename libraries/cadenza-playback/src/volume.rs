//! Output volume
//!
//! The player exposes a linear rate (0.0..=1.0) that the pipelines apply as-is.
//! Mute keeps the rate so unmuting restores it.

/// Volume controller
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Linear rate (0.0-1.0)
    rate: f64,

    /// Mute state (preserves rate)
    muted: bool,
}

impl Volume {
    /// Create new volume controller, clamping the rate
    pub fn new(rate: f64) -> Self {
        Self {
            rate: Self::clamp(rate),
            muted: false,
        }
    }

    /// Set rate (clamped to 0.0-1.0, NaN becomes 0.0)
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = Self::clamp(rate);
    }

    /// Current rate
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Mute output (preserves rate)
    pub fn mute(&mut self) {
        self.muted = true;
    }

    /// Unmute output
    pub fn unmute(&mut self) {
        self.muted = false;
    }

    /// Toggle mute state
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Gain the pipelines should apply
    ///
    /// Returns 0.0 if muted, otherwise the rate
    pub fn gain(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            self.rate
        }
    }

    /// Gain in dB, floored at -60 dB
    pub fn to_db(&self) -> f64 {
        let gain = self.gain();
        if gain <= 0.001 {
            -60.0
        } else {
            20.0 * gain.log10()
        }
    }

    fn clamp(rate: f64) -> f64 {
        if rate.is_nan() {
            0.0
        } else {
            rate.clamp(0.0, 1.0)
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_clamped() {
        let mut vol = Volume::new(1.5);
        assert_eq!(vol.rate(), 1.0);

        vol.set_rate(-0.2);
        assert_eq!(vol.rate(), 0.0);

        vol.set_rate(f64::NAN);
        assert_eq!(vol.rate(), 0.0);

        vol.set_rate(0.4);
        assert_eq!(vol.rate(), 0.4);
    }

    #[test]
    fn mute_preserves_rate() {
        let mut vol = Volume::new(0.8);
        vol.mute();
        assert!(vol.is_muted());
        assert_eq!(vol.gain(), 0.0);
        assert_eq!(vol.rate(), 0.8);

        vol.unmute();
        assert_eq!(vol.gain(), 0.8);
    }

    #[test]
    fn toggle_mute() {
        let mut vol = Volume::default();
        vol.toggle_mute();
        assert!(vol.is_muted());
        vol.toggle_mute();
        assert!(!vol.is_muted());
    }

    #[test]
    fn db_conversion() {
        assert!((Volume::new(1.0).to_db() - 0.0).abs() < 1e-9);
        assert!((Volume::new(0.1).to_db() + 20.0).abs() < 1e-9);
        assert_eq!(Volume::new(0.0).to_db(), -60.0);
    }
}
