//! Configuration for library compression

/// Compression loop configuration
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Maximum number of ghosts adopted in one call
    pub max_iterations: usize,
    /// Maximum number of holes (arguments) in a ghost
    pub max_holes: usize,
    /// Minimum number of occurrences for a ghost to be considered
    pub min_occurrences: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 16,
            max_holes: 4,
            min_occurrences: 2,
        }
    }
}

impl CompressionConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_holes(mut self, max_holes: usize) -> Self {
        self.max_holes = max_holes;
        self
    }

    pub fn with_min_occurrences(mut self, min_occurrences: usize) -> Self {
        self.min_occurrences = min_occurrences.max(1);
        self
    }
}
