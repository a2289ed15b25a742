//! # ALICE-PLSA
//!
//! Probabilistic Latent Semantic Analysis by Expectation-Maximization.
//!
//! Words and documents are explained through a small set of latent topics:
//! `P(w, d) = Σ_z P(z) P(w|z) P(d|z)`. The trainer fits the three tables to
//! a sparse term-document count matrix, or folds new documents into an
//! already trained model.
//!
//! ## Principle
//!
//! ```text
//! Sparse counts (word, doc, count)
//!     ↓
//! E-step: responsibility of each topic for each observation
//!     ↓
//! M-step: re-estimate P(z), P(w|z), P(d|z)
//!     ↓
//! Repeat until the log-likelihood stops improving
//! ```
//!
//! ## Example
//!
//! ```rust
//! use alice_plsa::{InitStrategy, ModelState, SparseCorpus, Trainer, TrainerConfig};
//!
//! let corpus = SparseCorpus::from_triples(2, 2, &[(0, 0, 1), (1, 0, 1), (0, 1, 2)]).unwrap();
//! let initial = ModelState::initialize(&corpus, 1, InitStrategy::Uniform).unwrap();
//!
//! let outcome = Trainer::new(TrainerConfig::new().with_epsilon(1e-9))
//!     .train(&corpus, initial)
//!     .unwrap();
//!
//! assert!((outcome.model.p_w_z.get(0, 0).unwrap() - 0.75).abs() < 1e-12);
//! ```

// --- Global Allocator: mimalloc (Microsoft's high-performance allocator) ---
#[cfg(not(target_env = "msvc"))]
use mimalloc::MiMalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod config;
pub mod corpus;
pub mod format;
pub mod likelihood;
pub mod matrix;
pub mod model;
pub mod normalizer;
pub mod trainer;

pub use config::TrainerConfig;
pub use corpus::{Observation, SparseCorpus};
pub use format::{read_header, ModelHeader};
pub use likelihood::{
    checked_log_likelihood, log_likelihood, mixture_probability, par_log_likelihood,
};
pub use matrix::TopicMatrix;
pub use model::{Generations, InitStrategy, ModelState, ParameterChange};
pub use normalizer::{normalize_column, normalize_columns, normalize_vector};
pub use trainer::{
    fold_in, train, train_averaged, CancelToken, LogProgress, Progress, ProgressObserver,
    StopReason, Trainer, TrainingOutcome,
};

use std::fmt;
use thiserror::Error;

/// ALICE-PLSA model file magic bytes
pub const ALICE_PLSA_MAGIC: &[u8; 8] = b"ALICEPLS";

/// ALICE-PLSA model file version
pub const ALICE_PLSA_VERSION: (u8, u8) = (1, 0);

/// Which index of an observation was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Word,
    Document,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Word => f.write_str("word"),
            Axis::Document => f.write_str("document"),
        }
    }
}

/// Error types for ALICE-PLSA operations
#[derive(Error, Debug)]
pub enum ALICEPLSAError {
    #[error("{axis} index {index} out of range (< {bound}) at observation {position}")]
    IndexOutOfRange {
        axis: Axis,
        index: usize,
        bound: usize,
        position: usize,
    },

    #[error("Degenerate corpus: total count is zero")]
    DegenerateCorpus,

    #[error("Allocation failure: {table} needs {elements} elements")]
    AllocationFailure { table: &'static str, elements: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Invalid magic: expected ALICEPLS")]
    InvalidMagic,

    #[error("Invalid version: {0}.{1}")]
    InvalidVersion(u8, u8),
}

pub type Result<T> = std::result::Result<T, ALICEPLSAError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_and_version_constants() {
        assert_eq!(ALICE_PLSA_MAGIC, b"ALICEPLS");
        assert_eq!(ALICE_PLSA_VERSION, (1, 0));
    }

    #[test]
    fn test_error_messages() {
        let err = ALICEPLSAError::IndexOutOfRange {
            axis: Axis::Document,
            index: 7,
            bound: 3,
            position: 2,
        };
        assert_eq!(
            err.to_string(),
            "document index 7 out of range (< 3) at observation 2"
        );
        assert_eq!(
            ALICEPLSAError::DegenerateCorpus.to_string(),
            "Degenerate corpus: total count is zero"
        );
    }

    #[test]
    fn test_end_to_end_single_topic() {
        let corpus = SparseCorpus::from_triples(2, 2, &[(0, 0, 1), (1, 0, 1), (0, 1, 2)]).unwrap();
        let initial = ModelState::initialize(&corpus, 1, InitStrategy::Uniform).unwrap();
        let outcome = train(&corpus, 1, TrainerConfig::new().with_epsilon(1e-9), initial).unwrap();

        assert!(outcome.converged());
        let m = &outcome.model;
        assert!((m.p_w_z.get(0, 0).unwrap() - 0.75).abs() < 1e-12);
        assert!((m.p_w_z.get(1, 0).unwrap() - 0.25).abs() < 1e-12);
        assert!((m.p_d_z.get(0, 0).unwrap() - 0.5).abs() < 1e-12);
    }
}
