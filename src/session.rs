//! Round driver: explore, compress, re-weight
//!
//! A [`Session`] owns the current library, prior and solution store. They are
//! read-only while a round explores and replaced together at the end of the
//! round, so an in-flight window never sees a half-updated library.

use crate::compress::{self, Adoption, CompressionConfig};
use crate::ir::{Grid, Type};
use crate::library::{Library, LibraryError, Prior, PriorError};
use crate::recognition::{self, RecognitionModel, TrainingBatch, TrainingPair};
use crate::search::{
    run_parallel_explore, ParallelConfig, SearchConfig, SearchStatistics, SolutionStore,
};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("compression produced an invalid library: {0}")]
    Library(#[from] LibraryError),

    #[error("recognition model returned an invalid prior: {0}")]
    Prior(#[from] PriorError),
}

/// Everything a session needs besides the library and the model
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Type of the programs searched for
    pub request: Type,
    pub search: SearchConfig,
    pub parallel: ParallelConfig,
    pub compression: CompressionConfig,
    /// Rounds run by [`Session::run`]
    pub rounds: usize,
    /// Explore targets that already have a stored program, looking for a
    /// shorter one under the grown library
    pub revisit_solved: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request: Type::MAT,
            search: SearchConfig::default(),
            parallel: ParallelConfig::default(),
            compression: CompressionConfig::default(),
            rounds: 3,
            revisit_solved: false,
        }
    }
}

impl SessionConfig {
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_revisit_solved(mut self, revisit_solved: bool) -> Self {
        self.revisit_solved = revisit_solved;
        self
    }
}

/// What one round did
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: usize,
    pub targets: usize,
    /// Targets handed to this round's exploration
    pub explored: usize,
    /// Targets matched by this round's exploration
    pub solved: usize,
    /// Targets with a stored program after the round
    pub total_solved: usize,
    /// Entries newly stored or shortened this round
    pub improved: usize,
    pub adopted: Vec<Adoption>,
    pub description_length_before: usize,
    pub description_length_after: usize,
    pub library_version: u64,
    pub library_size: usize,
    pub statistics: SearchStatistics,
}

impl RoundReport {
    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "Round {}", self.round);
        let _ = writeln!(
            s,
            "Solved: {}/{} explored ({}/{} stored, {} improved)",
            self.solved, self.explored, self.total_solved, self.targets, self.improved
        );
        let _ = writeln!(
            s,
            "Description length: {} -> {}",
            self.description_length_before, self.description_length_after
        );
        for adoption in &self.adopted {
            let _ = writeln!(
                s,
                "Adopted {}/{} (score {}, {} occurrences)",
                adoption.name, adoption.arity, adoption.score, adoption.occurrences
            );
        }
        let _ = writeln!(
            s,
            "Library: {} primitives (version {})",
            self.library_size, self.library_version
        );
        s.push_str(&self.statistics.format_summary());
        s
    }
}

pub struct Session {
    library: Library,
    prior: Prior,
    store: SolutionStore,
    model: Box<dyn RecognitionModel + Send>,
    config: SessionConfig,
    round: usize,
}

impl Session {
    /// Start from `library` with a uniform prior
    pub fn new(
        library: Library,
        model: Box<dyn RecognitionModel + Send>,
        config: SessionConfig,
    ) -> Self {
        let prior = Prior::uniform(&library);
        Self {
            library,
            prior,
            store: SolutionStore::new(),
            model,
            config,
            round: 0,
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn prior(&self) -> &Prior {
        &self.prior
    }

    pub fn store(&self) -> &SolutionStore {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of rounds completed
    pub fn rounds_completed(&self) -> usize {
        self.round
    }

    /// Run one round over `targets`.
    ///
    /// Every target without a stored program (every target, with
    /// `revisit_solved`) is explored against the current snapshot. Matches go
    /// into the store, the store is compressed, and the recognition model is
    /// retrained on the rewritten programs to produce the next prior.
    pub fn run_round(&mut self, targets: &[Grid]) -> Result<RoundReport, SessionError> {
        let pending: Vec<Grid> = targets
            .iter()
            .filter(|t| self.config.revisit_solved || !self.store.contains(t))
            .cloned()
            .collect();
        log::debug!(
            "round {}: exploring {} of {} targets",
            self.round,
            pending.len(),
            targets.len()
        );
        let explored = run_parallel_explore(
            &self.library,
            &self.prior,
            &self.config.request,
            &pending,
            &self.config.search,
            &self.config.parallel,
        );

        let mut improved = 0;
        for (target, result) in pending.iter().zip(&explored.results) {
            if let Some(solution) = result.solution() {
                if self.store.record(target, solution.program.clone()) {
                    improved += 1;
                }
            }
        }

        let programs = self.store.programs();
        let description_length_before = compress::description_length(&self.library, &programs);
        let compressed = compress::compress(&self.library, programs, &self.config.compression)?;
        let description_length_after = compressed.description_length();
        self.store.replace_programs(compressed.programs);
        self.library = compressed.library;

        let pairs = self
            .store
            .iter()
            .map(|entry| TrainingPair {
                program: entry.program.clone(),
                target: entry.target.clone(),
            })
            .collect();
        let batch = TrainingBatch::new(self.library.clone(), pairs);
        self.model.train(&batch);
        self.prior = recognition::next_prior(self.model.as_ref(), &self.library)?;

        let report = RoundReport {
            round: self.round,
            targets: targets.len(),
            explored: pending.len(),
            solved: explored.solved_count(),
            total_solved: self.store.len(),
            improved,
            adopted: compressed.adopted,
            description_length_before,
            description_length_after,
            library_version: self.library.version(),
            library_size: self.library.len(),
            statistics: explored.total_statistics,
        };
        log::info!(
            "round {}: solved {}/{}, adopted {}, description length {} -> {}",
            report.round,
            report.solved,
            report.explored,
            report.adopted.len(),
            report.description_length_before,
            report.description_length_after
        );
        self.round += 1;
        Ok(report)
    }

    /// Run `config.rounds` rounds over the same targets
    pub fn run(&mut self, targets: &[Grid]) -> Result<Vec<RoundReport>, SessionError> {
        (0..self.config.rounds)
            .map(|_| self.run_round(targets))
            .collect()
    }
}
