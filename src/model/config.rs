/// Tunables for [`MachineBuilder`](crate::model::builder::MachineBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderConfig {
    window_bits: u32,
    max_operands: usize,
    check_part_coverage: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            window_bits: 64,
            max_operands: 16,
            check_part_coverage: true,
        }
    }
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Width of one pack window. Rounded down to whole bytes and clamped to `8..=64`.
    pub fn with_window_bits(mut self, bits: u32) -> Self {
        self.window_bits = (bits / 8 * 8).clamp(8, 64);
        self
    }

    pub fn with_max_operands(mut self, max: usize) -> Self {
        self.max_operands = max;
        self
    }

    /// Require part widths to add up to the form width.
    pub fn with_part_coverage(mut self, enabled: bool) -> Self {
        self.check_part_coverage = enabled;
        self
    }

    pub fn window_bits(&self) -> u32 {
        self.window_bits
    }

    pub fn max_operands(&self) -> usize {
        self.max_operands
    }

    pub fn check_part_coverage(&self) -> bool {
        self.check_part_coverage
    }
}

#[cfg(test)]
mod tests {
    use super::BuilderConfig;

    #[test]
    fn window_bits_are_clamped_to_bytes() {
        assert_eq!(BuilderConfig::new().window_bits(), 64);
        assert_eq!(BuilderConfig::new().with_window_bits(20).window_bits(), 16);
        assert_eq!(BuilderConfig::new().with_window_bits(4).window_bits(), 8);
        assert_eq!(BuilderConfig::new().with_window_bits(128).window_bits(), 64);
    }
}
