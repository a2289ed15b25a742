//! Log-likelihood evaluation for ALICE-PLSA
//!
//! `L = Σ count · ln Σ_z P(z) P(w|z) P(d|z)` over the stored observations.
//! An observation whose mixture probability is not strictly positive adds
//! nothing, rather than `-inf`.

use crate::corpus::{Observation, SparseCorpus};
use crate::model::ModelState;
use crate::Result;
use rayon::prelude::*;

/// Observations per rayon task
const PAR_CHUNK: usize = 4096;

/// Mixture probability `Σ_z P(z) P(w|z) P(d|z)` for one observation
///
/// # Panics
/// Panics if `obs` indexes past the model's word or document rows.
#[inline]
pub fn mixture_probability(model: &ModelState, obs: &Observation) -> f64 {
    let w_row = model.p_w_z.row(obs.word as usize);
    let d_row = model.p_d_z.row(obs.doc as usize);
    model
        .p_z
        .iter()
        .zip(w_row)
        .zip(d_row)
        .map(|((pz, pw), pd)| pz * pw * pd)
        .sum()
}

#[inline]
fn contribution(model: &ModelState, obs: &Observation) -> f64 {
    let sum = mixture_probability(model, obs);
    if sum > 0.0 {
        f64::from(obs.count) * sum.ln()
    } else {
        0.0
    }
}

/// Corpus log-likelihood under `model`.
///
/// # Panics
/// Panics if the model is smaller than the corpus; see
/// [`checked_log_likelihood`].
pub fn log_likelihood(corpus: &SparseCorpus, model: &ModelState) -> f64 {
    corpus.iter().map(|obs| contribution(model, obs)).sum()
}

/// Parallel [`log_likelihood`]; equal up to summation order
///
/// # Panics
/// Same conditions as [`log_likelihood`].
pub fn par_log_likelihood(corpus: &SparseCorpus, model: &ModelState) -> f64 {
    corpus
        .observations()
        .par_chunks(PAR_CHUNK)
        .map(|chunk| chunk.iter().map(|obs| contribution(model, obs)).sum::<f64>())
        .sum()
}

/// [`log_likelihood`] after checking the model is sized for the corpus
pub fn checked_log_likelihood(corpus: &SparseCorpus, model: &ModelState) -> Result<f64> {
    model.check_against(corpus)?;
    Ok(log_likelihood(corpus, model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::TopicMatrix;
    use crate::ALICEPLSAError;

    fn single_topic_corpus() -> SparseCorpus {
        SparseCorpus::from_triples(2, 2, &[(0, 0, 1), (1, 0, 1), (0, 1, 2)]).unwrap()
    }

    #[test]
    fn test_uniform_single_topic() {
        let corpus = single_topic_corpus();
        let model = ModelState::uniform(2, 2, 1).unwrap();
        // every observation has probability 1 * 0.5 * 0.5
        let expected = 4.0 * 0.25f64.ln();
        assert!((log_likelihood(&corpus, &model) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_probability_contributes_nothing() {
        let corpus = single_topic_corpus();
        // word 1 has zero probability under the only topic
        let model = ModelState::from_parts(
            vec![1.0],
            TopicMatrix::from_vec(2, 1, vec![1.0, 0.0]).unwrap(),
            TopicMatrix::from_vec(2, 1, vec![0.5, 0.5]).unwrap(),
        )
        .unwrap();

        let l = log_likelihood(&corpus, &model);
        assert!(l.is_finite());
        // only the two word-0 observations count: 1*ln(0.5) + 2*ln(0.5)
        assert!((l - 3.0 * 0.5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_corpus_is_zero() {
        let corpus = SparseCorpus::new(2, 2, Vec::new()).unwrap();
        let model = ModelState::uniform(2, 2, 2).unwrap();
        assert_eq!(log_likelihood(&corpus, &model), 0.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let triples: Vec<(u32, u32, u32)> = (0..10_000u32)
            .map(|i| (i % 97, i % 31, 1 + i % 5))
            .collect();
        let corpus = SparseCorpus::from_triples(97, 31, &triples).unwrap();
        let model = ModelState::random(97, 31, 4, 11).unwrap();

        let seq = log_likelihood(&corpus, &model);
        let par = par_log_likelihood(&corpus, &model);
        assert!((seq - par).abs() < 1e-9 * seq.abs().max(1.0));
    }

    #[test]
    fn test_mixture_probability() {
        let model = ModelState::from_parts(
            vec![0.25, 0.75],
            TopicMatrix::from_rows(&[vec![0.5, 1.0], vec![0.5, 0.0]]).unwrap(),
            TopicMatrix::from_rows(&[vec![1.0, 1.0]]).unwrap(),
        )
        .unwrap();
        let p = mixture_probability(&model, &Observation::new(0, 0, 1));
        assert!((p - (0.25 * 0.5 + 0.75 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_checked_rejects_mismatched_model() {
        let triples: Vec<(u32, u32, u32)> = (0..7u32).map(|d| (d % 6, d, 1)).collect();
        let corpus = SparseCorpus::from_triples(6, 7, &triples).unwrap();
        let small = ModelState::uniform(2, 2, 2).unwrap();
        assert!(matches!(
            checked_log_likelihood(&corpus, &small),
            Err(ALICEPLSAError::InvalidConfiguration(_))
        ));

        let sized = ModelState::uniform(6, 7, 2).unwrap();
        let l = checked_log_likelihood(&corpus, &sized).unwrap();
        assert_eq!(l, log_likelihood(&corpus, &sized));
    }
}
