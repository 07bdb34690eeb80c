pub struct EnergyMeter {
    epsilon: f32,
}

impl EnergyMeter {
    pub fn new() -> Self {
        Self { epsilon: 1e-10 }
    }

    /// RMS energy of a frame of normalized samples in [-1.0, 1.0].
    pub fn calculate_rms(&self, frame: &[f32]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }

        let sum_squares: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_squares / frame.len() as f64).sqrt() as f32
    }

    pub fn rms_to_dbfs(&self, rms: f32) -> f32 {
        if rms <= self.epsilon {
            return -100.0;
        }
        20.0 * rms.log10()
    }

    pub fn calculate_dbfs(&self, frame: &[f32]) -> f32 {
        let rms = self.calculate_rms(frame);
        self.rms_to_dbfs(rms)
    }
}

impl Default for EnergyMeter {
    fn default() -> Self {
        Self::new()
    }
}
