//! EM trainer for ALICE-PLSA
//!
//! ```text
//! Initializing
//!     ↓
//! Iterating ── swap generations → E-step → M-step → likelihood
//!     ↓
//! Converged (ΔL < ε) | IterationLimitReached | Cancelled
//! ```
//!
//! Each iteration reads the previous generation of the model and writes the
//! other one, so no table is read and written in the same pass.

use crate::config::TrainerConfig;
use crate::corpus::{Observation, SparseCorpus};
use crate::likelihood::{log_likelihood, par_log_likelihood};
use crate::matrix::TopicMatrix;
use crate::model::{Generations, InitStrategy, ModelState};
use crate::normalizer::normalize_column;
use crate::{ALICEPLSAError, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Likelihood drop tolerated before warning about numerical drift
const DRIFT_TOLERANCE: f64 = 1e-6;

/// Snapshot handed to a [`ProgressObserver`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Completed iterations so far
    pub iteration: usize,
    pub log_likelihood: f64,
    pub delta: f64,
}

/// Receives periodic progress notifications; purely observational
pub trait ProgressObserver {
    fn on_progress(&mut self, progress: &Progress);
}

impl<F> ProgressObserver for F
where
    F: FnMut(&Progress),
{
    fn on_progress(&mut self, progress: &Progress) {
        self(progress)
    }
}

/// Observer that writes progress to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, progress: &Progress) {
        log::info!(
            "iteration {}: L = {:.6} (ΔL = {:.6})",
            progress.iteration,
            progress.log_likelihood,
            progress.delta
        );
    }
}

/// Cooperative stop signal, checked between iterations only
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Likelihood gain fell below epsilon
    Converged,
    /// Iteration ceiling reached
    IterationLimitReached,
    /// Cancel token observed between iterations
    Cancelled,
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Final tables
    pub model: ModelState,
    /// Completed E/M cycles
    pub iterations: usize,
    /// Last likelihood gain, `None` if no iteration ran
    pub final_delta: Option<f64>,
    /// Likelihood of `model`
    pub log_likelihood: f64,
    pub stop_reason: StopReason,
    /// Initial likelihood followed by the likelihood after each iteration
    pub likelihood_trace: Vec<f64>,
}

impl TrainingOutcome {
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Converged
    }

    /// P(z|d) of the trained documents; after folding-in, the topic
    /// weights of the new batch
    pub fn document_topics(&self) -> Result<TopicMatrix> {
        self.model.document_topics()
    }
}

/// PLSA EM trainer
pub struct Trainer<'o> {
    config: TrainerConfig,
    observer: Option<Box<dyn ProgressObserver + 'o>>,
    cancel: Option<CancelToken>,
}

impl<'o> Trainer<'o> {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            observer: None,
            cancel: None,
        }
    }

    /// Attach a progress observer
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: ProgressObserver + 'o,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Attach a cancel token
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run EM from `initial` until convergence, the iteration limit, or
    /// cancellation.
    pub fn train(&mut self, corpus: &SparseCorpus, initial: ModelState) -> Result<TrainingOutcome> {
        let config = self.config;
        config.validate()?;
        initial.check_against(corpus)?;

        let total = corpus.total_count();
        if total == 0 {
            return Err(ALICEPLSAError::DegenerateCorpus);
        }
        let total = total as f64;

        let mut lik = self.evaluate(corpus, &initial);
        let mut trace = vec![lik];

        if config.max_iterations == 0 {
            log::info!("max_iterations is 0, returning initial model");
            return Ok(TrainingOutcome {
                model: initial,
                iterations: 0,
                final_delta: None,
                log_likelihood: lik,
                stop_reason: StopReason::IterationLimitReached,
                likelihood_trace: trace,
            });
        }

        let n_topics = initial.n_topics();
        let mut generations = Generations::new(initial)?;
        let mut scratch = vec![0.0; n_topics];
        let mut iterations = 0usize;
        let mut final_delta = None;

        log::debug!(
            "training: {} observations, R = {}, {} topics, folding_in = {}, L0 = {:.6}",
            corpus.len(),
            corpus.total_count(),
            n_topics,
            config.folding_in,
            lik
        );

        let stop_reason = loop {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                break StopReason::Cancelled;
            }

            let (old, new) = generations.advance();
            new.reset_for_iteration(config.folding_in);

            if config.parallel {
                par_expectation(corpus, old, new, config.folding_in)?;
            } else {
                expectation(corpus.observations(), old, new, config.folding_in, &mut scratch);
            }
            maximization(new, total, config.folding_in);

            let lik_new = self.evaluate(corpus, new);
            let delta = lik_new - lik;
            lik = lik_new;
            iterations += 1;
            final_delta = Some(delta);
            trace.push(lik);

            if log::log_enabled!(log::Level::Debug) {
                let change = new.l1_distance(old);
                log::debug!(
                    "iteration {}: L = {:.6} ΔL = {:.6e} |ΔP(z)| = {:.3e} |ΔP(w|z)| = {:.3e} |ΔP(d|z)| = {:.3e}",
                    iterations,
                    lik,
                    delta,
                    change.p_z,
                    change.p_w_z,
                    change.p_d_z
                );
            }
            if !config.folding_in && delta < -DRIFT_TOLERANCE {
                log::warn!(
                    "log-likelihood decreased by {:.3e} at iteration {}",
                    -delta,
                    iterations
                );
            }

            if iterations % config.progress_interval == 0 {
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_progress(&Progress {
                        iteration: iterations,
                        log_likelihood: lik,
                        delta,
                    });
                }
            }

            if delta < config.epsilon {
                break StopReason::Converged;
            }
            if iterations >= config.max_iterations {
                break StopReason::IterationLimitReached;
            }
        };

        log::info!(
            "stopped at iteration {} ({:?}, L = {:.6}, ΔL = {:?})",
            iterations,
            stop_reason,
            lik,
            final_delta
        );

        Ok(TrainingOutcome {
            model: generations.into_current(),
            iterations,
            final_delta,
            log_likelihood: lik,
            stop_reason,
            likelihood_trace: trace,
        })
    }

    fn evaluate(&self, corpus: &SparseCorpus, model: &ModelState) -> f64 {
        if self.config.parallel {
            par_log_likelihood(corpus, model)
        } else {
            log_likelihood(corpus, model)
        }
    }
}

/// E-step over a slice of observations, accumulating into `acc`.
///
/// `acc.p_w_z` and `acc.p_z` are not touched when folding in.
fn expectation(
    observations: &[Observation],
    old: &ModelState,
    acc: &mut ModelState,
    folding_in: bool,
    scratch: &mut [f64],
) {
    for obs in observations {
        let w = obs.word as usize;
        let d = obs.doc as usize;
        let pw = old.p_w_z.row(w);
        let pd = old.p_d_z.row(d);

        let mut sum = 0.0;
        for (z, r) in scratch.iter_mut().enumerate() {
            *r = old.p_z[z] * pd[z] * pw[z];
            sum += *r;
        }
        if sum <= 0.0 {
            continue;
        }

        let scale = f64::from(obs.count) / sum;
        for r in scratch.iter_mut() {
            *r *= scale;
        }

        for (acc_d, r) in acc.p_d_z.row_mut(d).iter_mut().zip(scratch.iter()) {
            *acc_d += *r;
        }
        if !folding_in {
            for (acc_w, r) in acc.p_w_z.row_mut(w).iter_mut().zip(scratch.iter()) {
                *acc_w += *r;
            }
            for (acc_z, r) in acc.p_z.iter_mut().zip(scratch.iter()) {
                *acc_z += *r;
            }
        }
    }
}

/// Parallel E-step: one partial table set per worker chunk, summed in
/// chunk order afterwards.
fn par_expectation(
    corpus: &SparseCorpus,
    old: &ModelState,
    new: &mut ModelState,
    folding_in: bool,
) -> Result<()> {
    let n_topics = old.n_topics();
    let n_words = if folding_in { 0 } else { old.n_words() };
    let chunk = corpus
        .len()
        .div_ceil(rayon::current_num_threads())
        .max(1);

    let partials = corpus
        .observations()
        .par_chunks(chunk)
        .map(|observations| {
            let mut partial = ModelState::zeros(n_words, old.n_docs(), n_topics)?;
            let mut scratch = vec![0.0; n_topics];
            expectation(observations, old, &mut partial, folding_in, &mut scratch);
            Ok(partial)
        })
        .collect::<Result<Vec<ModelState>>>()?;

    for partial in &partials {
        new.p_d_z.add_assign(&partial.p_d_z);
        if !folding_in {
            new.p_w_z.add_assign(&partial.p_w_z);
            for (acc, v) in new.p_z.iter_mut().zip(&partial.p_z) {
                *acc += *v;
            }
        }
    }
    Ok(())
}

/// M-step: column-normalize P(d|z), and unless folding in P(w|z), then
/// divide the topic mass by the corpus total.
fn maximization(new: &mut ModelState, total: f64, folding_in: bool) {
    for z in 0..new.n_topics() {
        normalize_column(&mut new.p_d_z, z);
        if !folding_in {
            normalize_column(&mut new.p_w_z, z);
            new.p_z[z] /= total;
        }
    }
}

/// Train from an explicit initial model with `n_topics` topics
pub fn train(
    corpus: &SparseCorpus,
    n_topics: usize,
    config: TrainerConfig,
    initial: ModelState,
) -> Result<TrainingOutcome> {
    if n_topics == 0 || initial.n_topics() != n_topics {
        return Err(ALICEPLSAError::InvalidConfiguration(format!(
            "requested {} topics, initial model has {}",
            n_topics,
            initial.n_topics()
        )));
    }
    Trainer::new(config).train(corpus, initial)
}

/// Fold a batch of new documents into a trained model.
///
/// Only P(d|z) of the new documents is estimated; the trained P(z) and
/// P(w|z) are carried through unchanged. The new documents' topic weights
/// are [`TrainingOutcome::document_topics`].
pub fn fold_in(
    trained: &ModelState,
    new_docs: &SparseCorpus,
    config: TrainerConfig,
) -> Result<TrainingOutcome> {
    let initial = ModelState::for_folding_in(trained, new_docs.n_docs())?;
    Trainer::new(config.with_folding_in(true)).train(new_docs, initial)
}

/// Train `runs` randomly initialized models and average them
pub fn train_averaged(
    corpus: &SparseCorpus,
    n_topics: usize,
    runs: usize,
    config: TrainerConfig,
    base_seed: u64,
) -> Result<ModelState> {
    if runs == 0 {
        return Err(ALICEPLSAError::InvalidConfiguration(
            "averaged training needs at least one run".to_string(),
        ));
    }

    let mut models = Vec::with_capacity(runs);
    for run in 0..runs {
        let seed = base_seed.wrapping_add(run as u64);
        log::info!("averaged training: run {}/{} (seed {})", run + 1, runs, seed);
        let initial = ModelState::initialize(corpus, n_topics, InitStrategy::Random { seed })?;
        let outcome = Trainer::new(config).train(corpus, initial)?;
        models.push(outcome.model);
    }
    ModelState::average(&models)
}
