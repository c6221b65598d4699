//! Exploration result types and statistics

use crate::ir::Program;
use crate::search::config::SearchMode;
use std::time::Duration;

/// A program whose evaluation equals the target
#[derive(Debug, Clone)]
pub struct Solution {
    pub program: Program,
    /// Node count of the program
    pub size: usize,
    /// Prior log-probability of the program
    pub log_prob: f64,
    /// Window the program was enumerated in
    pub window: usize,
    /// Position of the program within its window's enumeration order
    pub ordinal: u64,
}

impl Solution {
    /// Enumeration position; smaller means enumerated earlier
    pub fn position(&self) -> (usize, u64) {
        (self.window, self.ordinal)
    }

    /// Whether `self` should replace `other` as the answer for its target.
    ///
    /// Fast mode prefers the earliest enumerated match; best-effort prefers
    /// the fewest nodes, then the earliest.
    pub fn improves_on(&self, other: &Solution, mode: SearchMode) -> bool {
        match mode {
            SearchMode::Fast => self.position() < other.position(),
            SearchMode::BestEffort => {
                (self.size, self.position()) < (other.size, other.position())
            }
        }
    }
}

/// Why a target ended without a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsolved {
    /// Every window up to the cost ceiling was enumerated
    Exhausted,
    /// The wall-clock budget ran out or exploration was cancelled
    Timeout,
}

impl std::fmt::Display for Unsolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unsolved::Exhausted => write!(f, "exhausted"),
            Unsolved::Timeout => write!(f, "timeout"),
        }
    }
}

/// Outcome of exploring one target
#[derive(Debug, Clone)]
pub enum Outcome {
    Solved(Solution),
    Unsolved(Unsolved),
}

/// Result of exploring one target
#[derive(Debug, Clone)]
pub struct ExploreResult {
    pub outcome: Outcome,
    pub statistics: SearchStatistics,
}

impl ExploreResult {
    pub fn solved(solution: Solution, statistics: SearchStatistics) -> Self {
        Self {
            outcome: Outcome::Solved(solution),
            statistics,
        }
    }

    pub fn unsolved(reason: Unsolved, statistics: SearchStatistics) -> Self {
        Self {
            outcome: Outcome::Unsolved(reason),
            statistics,
        }
    }

    pub fn solution(&self) -> Option<&Solution> {
        match &self.outcome {
            Outcome::Solved(solution) => Some(solution),
            Outcome::Unsolved(_) => None,
        }
    }

    pub fn into_solution(self) -> Option<Solution> {
        match self.outcome {
            Outcome::Solved(solution) => Some(solution),
            Outcome::Unsolved(_) => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self.outcome, Outcome::Solved(_))
    }
}

/// Statistics from an exploration
#[derive(Debug, Clone, Default)]
pub struct SearchStatistics {
    /// Mode used for the exploration
    pub mode: SearchMode,
    /// Total time spent exploring
    pub elapsed_time: Duration,
    /// Number of complete candidate trees evaluated
    pub candidates_evaluated: u64,
    /// Candidates rejected by a shape or domain error
    pub eval_failures: u64,
    /// Candidates whose value equalled the target
    pub matches: u64,
    /// Windows enumerated to completion
    pub windows_completed: u64,
    /// Number of times the current best match improved
    pub improvements_found: u64,
}

impl SearchStatistics {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Fold another exploration's counters into this one
    pub fn merge(&mut self, other: &SearchStatistics) {
        self.candidates_evaluated += other.candidates_evaluated;
        self.eval_failures += other.eval_failures;
        self.matches += other.matches;
        self.windows_completed += other.windows_completed;
        self.improvements_found += other.improvements_found;
    }

    /// Fraction of evaluated candidates rejected by the primitives
    pub fn failure_rate(&self) -> f64 {
        if self.candidates_evaluated == 0 {
            0.0
        } else {
            self.eval_failures as f64 / self.candidates_evaluated as f64
        }
    }

    /// Get candidates evaluated per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.candidates_evaluated as f64 / secs
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Mode: {}\n", self.mode));
        s.push_str(&format!("Time: {:.2?}\n", self.elapsed_time));
        s.push_str(&format!(
            "Candidates evaluated: {}\n",
            self.candidates_evaluated
        ));
        s.push_str(&format!(
            "Throughput: {:.0} candidates/sec\n",
            self.throughput()
        ));
        if self.eval_failures > 0 {
            s.push_str(&format!(
                "Evaluation failures: {:.2}%\n",
                self.failure_rate() * 100.0
            ));
        }
        s.push_str(&format!("Windows completed: {}\n", self.windows_completed));
        s.push_str(&format!("Matches: {}\n", self.matches));
        s
    }
}
