//! Configuration types for exploration

use std::time::Duration;

/// What the enumerator does once a candidate matches the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Stop at the first match
    #[default]
    Fast,
    /// Keep enumerating until the budget runs out, keeping the smallest match
    BestEffort,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Fast => write!(f, "fast"),
            SearchMode::BestEffort => write!(f, "best-effort"),
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "fast" | "first" => Ok(SearchMode::Fast),
            "best-effort" | "best" | "shortest" => Ok(SearchMode::BestEffort),
            _ => Err(format!(
                "Unknown search mode: '{}'. Valid options: fast, best-effort",
                s
            )),
        }
    }
}

/// Main exploration configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Fast (first match) or best-effort (smallest match before timeout)
    pub mode: SearchMode,
    /// Width of each description-length window, in nats
    pub gap: f64,
    /// Description length ceiling; windows stop here
    pub max_cost: f64,
    /// Maximum tree depth (the root is at depth 1)
    pub max_depth: usize,
    /// Wall-clock budget per target
    pub timeout: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            gap: 1.5,
            max_cost: 30.0,
            max_depth: 8,
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl SearchConfig {
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the window width. A gap that is not a positive finite number is
    /// ignored and the current gap kept.
    pub fn with_gap(mut self, gap: f64) -> Self {
        if gap > 0.0 && gap.is_finite() {
            self.gap = gap;
        } else {
            log::warn!("ignoring window gap {}, keeping {}", gap, self.gap);
        }
        self
    }

    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_timeout_option(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of windows needed to cover `[0, max_cost)`
    pub fn window_count(&self) -> usize {
        (self.max_cost / self.gap).ceil().max(0.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_from_str() {
        assert_eq!("fast".parse::<SearchMode>().unwrap(), SearchMode::Fast);
        assert_eq!(
            "best-effort".parse::<SearchMode>().unwrap(),
            SearchMode::BestEffort
        );
        assert_eq!(
            "best_effort".parse::<SearchMode>().unwrap(),
            SearchMode::BestEffort
        );
        assert!("exhaustive".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_search_mode_display() {
        assert_eq!(format!("{}", SearchMode::Fast), "fast");
        assert_eq!(format!("{}", SearchMode::BestEffort), "best-effort");
    }

    #[test]
    fn test_search_config_builder() {
        let config = SearchConfig::default()
            .with_mode(SearchMode::BestEffort)
            .with_gap(2.0)
            .with_max_cost(9.0)
            .with_max_depth(0)
            .with_timeout(Duration::from_secs(1));

        assert_eq!(config.mode, SearchMode::BestEffort);
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.window_count(), 5);
    }

    #[test]
    fn test_invalid_gap_is_ignored() {
        let config = SearchConfig::default().with_gap(2.0);
        assert_eq!(config.clone().with_gap(0.0).gap, 2.0);
        assert_eq!(config.clone().with_gap(-1.0).gap, 2.0);
        assert_eq!(config.with_gap(f64::NAN).gap, 2.0);
    }

    #[test]
    fn test_window_count_default() {
        assert_eq!(SearchConfig::default().window_count(), 20);
    }
}
