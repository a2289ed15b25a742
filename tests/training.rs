//! End-to-end training tests for ALICE-PLSA

use alice_plsa::{
    fold_in, log_likelihood, InitStrategy, ModelState, ALICEPLSAError, SparseCorpus, StopReason,
    Trainer, TrainerConfig,
};
use std::io::Write;

const TOY_CORPUS: &str = "\
# two clusters: words 0-2 in docs 0-2, words 3-5 in docs 3-5
6 6
0 0 3
1 0 2
2 0 1
0 1 1
1 1 3
2 1 2
0 2 2
2 2 2
3 3 2
4 3 3
5 3 1
3 4 1
4 4 1
5 4 4
4 5 2
5 5 2
";

fn toy_corpus() -> SparseCorpus {
    SparseCorpus::from_triple_reader(TOY_CORPUS.as_bytes()).unwrap()
}

#[test]
fn test_two_topics_separate_clusters() {
    let corpus = toy_corpus();
    let initial = ModelState::initialize(&corpus, 2, InitStrategy::Random { seed: 1234 }).unwrap();
    let config = TrainerConfig::new().with_epsilon(1e-10).with_max_iterations(2000);
    let outcome = Trainer::new(config).train(&corpus, initial).unwrap();
    let m = &outcome.model;

    // each topic should put nearly all word mass on one cluster
    for z in 0..2 {
        let first: f64 = (0..3).map(|w| m.p_w_z.get(w, z).unwrap()).sum();
        let second: f64 = (3..6).map(|w| m.p_w_z.get(w, z).unwrap()).sum();
        assert!(first > 0.95 || second > 0.95, "topic {} mixes clusters", z);
    }
    assert!((m.p_z.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn test_trace_monotone_and_matches_final() {
    let corpus = toy_corpus();
    let initial = ModelState::initialize(&corpus, 3, InitStrategy::default()).unwrap();
    let outcome = Trainer::new(TrainerConfig::new().with_epsilon(1e-8))
        .train(&corpus, initial)
        .unwrap();

    assert_eq!(outcome.likelihood_trace.len(), outcome.iterations + 1);
    for pair in outcome.likelihood_trace.windows(2) {
        assert!(pair[1] >= pair[0] - 1e-6);
    }
    let last = *outcome.likelihood_trace.last().unwrap();
    assert_eq!(last, outcome.log_likelihood);
    assert!((log_likelihood(&corpus, &outcome.model) - last).abs() < 1e-9);
}

#[test]
fn test_train_save_fold_in() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = toy_corpus();
    let initial = ModelState::initialize(&corpus, 2, InitStrategy::Random { seed: 5 }).unwrap();
    let trained = Trainer::new(TrainerConfig::new().with_epsilon(1e-8))
        .train(&corpus, initial)
        .unwrap()
        .model;

    let model_path = dir.path().join("toy.plsa");
    trained.save(&model_path).unwrap();
    let loaded = ModelState::load(&model_path).unwrap();
    assert_eq!(loaded, trained);

    // doc 0 uses the first cluster, doc 1 the second
    let new_path = dir.path().join("new.txt");
    let mut file = std::fs::File::create(&new_path).unwrap();
    writeln!(file, "6 2").unwrap();
    writeln!(file, "0 0 4").unwrap();
    writeln!(file, "1 0 2").unwrap();
    writeln!(file, "4 1 3").unwrap();
    writeln!(file, "5 1 1").unwrap();
    drop(file);

    let new_docs = SparseCorpus::from_triple_file(&new_path).unwrap();
    let config = TrainerConfig::folding_in().with_epsilon(f64::NEG_INFINITY);
    let outcome = fold_in(&loaded, &new_docs, config).unwrap();
    assert_eq!(outcome.model.p_z, loaded.p_z);
    assert_eq!(outcome.model.p_w_z, loaded.p_w_z);
    assert_eq!(outcome.model.n_docs(), 2);

    let topics = outcome.document_topics().unwrap();
    assert_eq!(topics.rows(), 2);
    assert_eq!(topics.topics(), 2);
    for d in 0..2 {
        assert!((topics.row(d).iter().sum::<f64>() - 1.0).abs() < 1e-12);
        for z in 0..2 {
            let expected = loaded.p_z[z] * outcome.model.p_d_z.get(d, z).unwrap();
            let mass: f64 = (0..2)
                .map(|k| loaded.p_z[k] * outcome.model.p_d_z.get(d, k).unwrap())
                .sum();
            assert!((topics.get(d, z).unwrap() - expected / mass).abs() < 1e-12);
        }
    }

    // the topic favouring word 0 claims the first document
    let home = if loaded.p_w_z.get(0, 0).unwrap() >= loaded.p_w_z.get(0, 1).unwrap() {
        0
    } else {
        1
    };
    assert!(topics.get(0, home).unwrap() > topics.get(1, home).unwrap() + 0.5);
}

#[test]
fn test_empty_corpus_fails_before_training() {
    let corpus = SparseCorpus::from_triple_reader("4 2\n1 1 0\n".as_bytes()).unwrap();
    assert!(corpus.is_empty());
    let initial = ModelState::uniform(4, 2, 2).unwrap();
    assert!(matches!(
        Trainer::new(TrainerConfig::new()).train(&corpus, initial),
        Err(ALICEPLSAError::DegenerateCorpus)
    ));
}

#[test]
fn test_iteration_limit() {
    let corpus = toy_corpus();
    let initial = ModelState::initialize(&corpus, 2, InitStrategy::default()).unwrap();
    let config = TrainerConfig::new()
        .with_epsilon(f64::NEG_INFINITY)
        .with_max_iterations(4);
    let outcome = Trainer::new(config).train(&corpus, initial).unwrap();
    assert_eq!(outcome.stop_reason, StopReason::IterationLimitReached);
    assert_eq!(outcome.iterations, 4);
    assert!(outcome.final_delta.is_some());
}
