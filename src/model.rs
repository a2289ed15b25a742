//! Model state module for ALICE-PLSA
//!
//! The three PLSA tables and the two-generation buffer the EM loop
//! alternates between.

use crate::corpus::SparseCorpus;
use crate::matrix::TopicMatrix;
use crate::normalizer::{normalize_columns, normalize_vector};
use crate::{ALICEPLSAError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// How a fresh model is seeded before training
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InitStrategy {
    /// Every distribution uniform
    Uniform,
    /// Uniform draws in `[0, 1)` normalized per column
    Random { seed: u64 },
}

impl Default for InitStrategy {
    fn default() -> Self {
        Self::Random { seed: 1234 }
    }
}

/// PLSA parameters: P(z), P(w|z), P(d|z)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    /// Topic prior, `n_topics` entries
    pub p_z: Vec<f64>,
    /// P(word | topic), `n_words × n_topics`
    pub p_w_z: TopicMatrix,
    /// P(document | topic), `n_docs × n_topics`
    pub p_d_z: TopicMatrix,
}

/// Parameter change between two models, per table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterChange {
    pub p_z: f64,
    pub p_w_z: f64,
    pub p_d_z: f64,
}

impl ModelState {
    /// All-zero model, allocated fallibly
    pub fn zeros(n_words: usize, n_docs: usize, n_topics: usize) -> Result<Self> {
        let mut p_z = Vec::new();
        p_z.try_reserve_exact(n_topics)
            .map_err(|_| ALICEPLSAError::AllocationFailure {
                table: "p_z",
                elements: n_topics,
            })?;
        p_z.resize(n_topics, 0.0);

        Ok(Self {
            p_z,
            p_w_z: TopicMatrix::zeros("p_w_z", n_words, n_topics)?,
            p_d_z: TopicMatrix::zeros("p_d_z", n_docs, n_topics)?,
        })
    }

    /// Assemble from existing tables, checking shapes agree
    pub fn from_parts(p_z: Vec<f64>, p_w_z: TopicMatrix, p_d_z: TopicMatrix) -> Result<Self> {
        let model = Self { p_z, p_w_z, p_d_z };
        model.check_shape()?;
        Ok(model)
    }

    /// Uniform model
    pub fn uniform(n_words: usize, n_docs: usize, n_topics: usize) -> Result<Self> {
        let mut model = Self::zeros(n_words, n_docs, n_topics)?;
        model.p_z.fill(1.0 / n_topics.max(1) as f64);
        model.p_w_z.as_mut_slice().fill(1.0 / n_words.max(1) as f64);
        model.p_d_z.as_mut_slice().fill(1.0 / n_docs.max(1) as f64);
        Ok(model)
    }

    /// Random model, reproducible for a given seed
    pub fn random(n_words: usize, n_docs: usize, n_topics: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut model = Self::zeros(n_words, n_docs, n_topics)?;

        for value in model.p_z.iter_mut() {
            *value = rng.gen::<f64>();
        }
        for value in model.p_w_z.as_mut_slice() {
            *value = rng.gen::<f64>();
        }
        for value in model.p_d_z.as_mut_slice() {
            *value = rng.gen::<f64>();
        }

        normalize_vector(&mut model.p_z);
        normalize_columns(&mut model.p_w_z);
        normalize_columns(&mut model.p_d_z);
        Ok(model)
    }

    /// Initialize a model sized for `corpus`
    pub fn initialize(corpus: &SparseCorpus, n_topics: usize, strategy: InitStrategy) -> Result<Self> {
        if n_topics == 0 {
            return Err(ALICEPLSAError::InvalidConfiguration(
                "topic count must be positive".to_string(),
            ));
        }
        match strategy {
            InitStrategy::Uniform => Self::uniform(corpus.n_words(), corpus.n_docs(), n_topics),
            InitStrategy::Random { seed } => {
                Self::random(corpus.n_words(), corpus.n_docs(), n_topics, seed)
            }
        }
    }

    /// Starting point for folding `n_docs` new documents into a trained model.
    ///
    /// `p_z` and `p_w_z` are copied from `trained`; `p_d_z` starts uniform.
    pub fn for_folding_in(trained: &ModelState, n_docs: usize) -> Result<Self> {
        let n_topics = trained.n_topics();
        let mut p_d_z = TopicMatrix::zeros("p_d_z", n_docs, n_topics)?;
        p_d_z.as_mut_slice().fill(1.0 / n_docs.max(1) as f64);
        Ok(Self {
            p_z: trained.p_z.clone(),
            p_w_z: trained.p_w_z.clone(),
            p_d_z,
        })
    }

    #[inline]
    pub fn n_topics(&self) -> usize {
        self.p_z.len()
    }

    #[inline]
    pub fn n_words(&self) -> usize {
        self.p_w_z.rows()
    }

    #[inline]
    pub fn n_docs(&self) -> usize {
        self.p_d_z.rows()
    }

    /// Check the three tables agree on the topic count
    pub fn check_shape(&self) -> Result<()> {
        if !self.p_w_z.is_well_formed() || !self.p_d_z.is_well_formed() {
            return Err(ALICEPLSAError::InvalidConfiguration(
                "table data does not match its dimensions".to_string(),
            ));
        }
        let n_topics = self.n_topics();
        if n_topics == 0 {
            return Err(ALICEPLSAError::InvalidConfiguration(
                "topic count must be positive".to_string(),
            ));
        }
        if self.p_w_z.topics() != n_topics || self.p_d_z.topics() != n_topics {
            return Err(ALICEPLSAError::InvalidConfiguration(format!(
                "topic count mismatch: p_z has {}, p_w_z has {}, p_d_z has {}",
                n_topics,
                self.p_w_z.topics(),
                self.p_d_z.topics()
            )));
        }
        Ok(())
    }

    /// Check the model is sized for `corpus`
    pub fn check_against(&self, corpus: &SparseCorpus) -> Result<()> {
        self.check_shape()?;
        if self.n_words() != corpus.n_words() {
            return Err(ALICEPLSAError::InvalidConfiguration(format!(
                "p_w_z has {} words, corpus has {}",
                self.n_words(),
                corpus.n_words()
            )));
        }
        if self.n_docs() != corpus.n_docs() {
            return Err(ALICEPLSAError::InvalidConfiguration(format!(
                "p_d_z has {} documents, corpus has {}",
                self.n_docs(),
                corpus.n_docs()
            )));
        }
        Ok(())
    }

    /// Zero the tables an iteration writes into
    pub(crate) fn reset_for_iteration(&mut self, folding_in: bool) {
        self.p_d_z.fill_zero();
        if !folding_in {
            self.p_z.fill(0.0);
            self.p_w_z.fill_zero();
        }
    }

    /// P(z|d): one row per document, `P(z) P(d|z)` normalized over topics.
    ///
    /// A document with no mass under any topic keeps an all-zero row.
    pub fn document_topics(&self) -> Result<TopicMatrix> {
        self.topic_posterior(&self.p_d_z)
    }

    /// P(z|w): one row per word, `P(z) P(w|z)` normalized over topics
    pub fn word_topics(&self) -> Result<TopicMatrix> {
        self.topic_posterior(&self.p_w_z)
    }

    fn topic_posterior(&self, table: &TopicMatrix) -> Result<TopicMatrix> {
        let mut posterior = TopicMatrix::zeros("posterior", table.rows(), self.n_topics())?;
        for row in 0..table.rows() {
            let out = posterior.row_mut(row);
            for ((value, p), pz) in out.iter_mut().zip(table.row(row)).zip(&self.p_z) {
                *value = pz * p;
            }
            normalize_vector(out);
        }
        Ok(posterior)
    }

    /// L1 distance to another model of the same shape
    pub fn l1_distance(&self, other: &ModelState) -> ParameterChange {
        ParameterChange {
            p_z: self
                .p_z
                .iter()
                .zip(&other.p_z)
                .map(|(a, b)| (a - b).abs())
                .sum(),
            p_w_z: self.p_w_z.l1_distance(&other.p_w_z),
            p_d_z: self.p_d_z.l1_distance(&other.p_d_z),
        }
    }

    /// Average several models of the same shape and re-normalize
    pub fn average(models: &[ModelState]) -> Result<Self> {
        let first = models.first().ok_or_else(|| {
            ALICEPLSAError::InvalidConfiguration("cannot average zero models".to_string())
        })?;
        let mut sum = ModelState::zeros(first.n_words(), first.n_docs(), first.n_topics())?;

        for model in models {
            if model.p_z.len() != sum.p_z.len()
                || !model.p_w_z.same_shape(&sum.p_w_z)
                || !model.p_d_z.same_shape(&sum.p_d_z)
            {
                return Err(ALICEPLSAError::InvalidConfiguration(
                    "cannot average models of different shapes".to_string(),
                ));
            }
            for (acc, v) in sum.p_z.iter_mut().zip(&model.p_z) {
                *acc += *v;
            }
            sum.p_w_z.add_assign(&model.p_w_z);
            sum.p_d_z.add_assign(&model.p_d_z);
        }

        normalize_vector(&mut sum.p_z);
        normalize_columns(&mut sum.p_w_z);
        normalize_columns(&mut sum.p_d_z);
        Ok(sum)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON, checking table shapes
    pub fn from_json(json: &str) -> Result<Self> {
        let model: ModelState = serde_json::from_str(json)?;
        model.check_shape()?;
        Ok(model)
    }
}

/// Two preallocated model generations with an explicit current index
#[derive(Debug)]
pub struct Generations {
    buffers: [ModelState; 2],
    current: usize,
}

impl Generations {
    /// Start with `initial` as current; the other generation is a copy.
    pub fn new(initial: ModelState) -> Result<Self> {
        let mut previous =
            ModelState::zeros(initial.n_words(), initial.n_docs(), initial.n_topics())?;
        previous.p_z.copy_from_slice(&initial.p_z);
        previous
            .p_w_z
            .as_mut_slice()
            .copy_from_slice(initial.p_w_z.as_slice());
        previous
            .p_d_z
            .as_mut_slice()
            .copy_from_slice(initial.p_d_z.as_slice());

        Ok(Self {
            buffers: [initial, previous],
            current: 0,
        })
    }

    /// Index (0 or 1) of the current generation
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn current(&self) -> &ModelState {
        &self.buffers[self.current]
    }

    #[inline]
    pub fn previous(&self) -> &ModelState {
        &self.buffers[1 - self.current]
    }

    /// Flip roles and hand out `(old, new)`: the read source and the write target.
    pub fn advance(&mut self) -> (&ModelState, &mut ModelState) {
        self.current = 1 - self.current;
        let (first, second) = self.buffers.split_at_mut(1);
        if self.current == 1 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// Give up the buffers, returning the current generation
    pub fn into_current(self) -> ModelState {
        let [a, b] = self.buffers;
        if self.current == 0 {
            a
        } else {
            b
        }
    }
}
