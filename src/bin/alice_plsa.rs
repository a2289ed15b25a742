//! ALICE-PLSA CLI
//!
//! Command-line interface for training and applying PLSA topic models.

use alice_plsa::{
    checked_log_likelihood, fold_in, log_likelihood, read_header, train_averaged, InitStrategy,
    LogProgress, ModelState, SparseCorpus, Trainer, TrainerConfig, TrainingOutcome,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "alice-plsa")]
#[command(author = "Moroya Sakamoto")]
#[command(version = "1.0.0")]
#[command(about = "Probabilistic Latent Semantic Analysis by EM")]
#[command(long_about = r#"
ALICE-PLSA: Probabilistic Latent Semantic Analysis

Model:
  P(w, d) = Σ_z P(z) P(w|z) P(d|z)

Corpus files hold one `word doc count` triple per line, preceded by a
`n_words n_docs` line. `#` starts a comment.

Set RUST_LOG=debug for per-iteration diagnostics.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model on a corpus
    Train {
        /// Corpus triple file
        input: PathBuf,

        /// Output model file (default: input.plsa)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of topics
        #[arg(short = 'k', long, default_value_t = 10)]
        topics: usize,

        /// Trainer config JSON; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum EM iterations
        #[arg(short = 'n', long)]
        max_iterations: Option<usize>,

        /// Convergence threshold on the likelihood gain
        #[arg(short, long)]
        epsilon: Option<f64>,

        /// Random initialization seed
        #[arg(short, long, default_value_t = 1234)]
        seed: u64,

        /// Start from a uniform model instead of a random one
        #[arg(long)]
        uniform: bool,

        /// Average this many randomly initialized runs
        #[arg(long, default_value_t = 1)]
        runs: usize,

        /// Parallel E-step
        #[arg(short, long)]
        parallel: bool,
    },

    /// Fold new documents into a trained model
    FoldIn {
        /// Trained model file
        model: PathBuf,

        /// Triple file of the new documents
        input: PathBuf,

        /// Output model file (default: input.plsa)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum EM iterations
        #[arg(short = 'n', long, default_value_t = TrainerConfig::FOLDING_IN_MAX_ITERATIONS)]
        max_iterations: usize,

        /// Convergence threshold on the likelihood gain
        #[arg(short, long, default_value_t = TrainerConfig::DEFAULT_EPSILON)]
        epsilon: f64,
    },

    /// Show model file information
    Info {
        /// Model file
        model: PathBuf,

        /// Dump the model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a corpus under a model
    Likelihood {
        /// Model file
        model: PathBuf,

        /// Corpus triple file
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            input,
            output,
            topics,
            config,
            max_iterations,
            epsilon,
            seed,
            uniform,
            runs,
            parallel,
        } => {
            let mut trainer_config = match config {
                Some(path) => TrainerConfig::from_json_file(path)?,
                None => TrainerConfig::new(),
            };
            if let Some(n) = max_iterations {
                trainer_config = trainer_config.with_max_iterations(n);
            }
            if let Some(eps) = epsilon {
                trainer_config = trainer_config.with_epsilon(eps);
            }
            if parallel {
                trainer_config = trainer_config.with_parallel(true);
            }
            let strategy = if uniform {
                InitStrategy::Uniform
            } else {
                InitStrategy::Random { seed }
            };
            train_file(&input, output, topics, trainer_config, strategy, runs)?;
        }
        Commands::FoldIn {
            model,
            input,
            output,
            max_iterations,
            epsilon,
        } => {
            let config = TrainerConfig::folding_in()
                .with_max_iterations(max_iterations)
                .with_epsilon(epsilon);
            fold_in_file(&model, &input, output, config)?;
        }
        Commands::Info { model, json } => {
            show_info(&model, json)?;
        }
        Commands::Likelihood { model, input } => {
            show_likelihood(&model, &input)?;
        }
    }

    Ok(())
}

fn default_output(input: &Path, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| {
        let mut p = input.to_path_buf();
        p.set_extension("plsa");
        p
    })
}

fn train_file(
    input: &Path,
    output: Option<PathBuf>,
    topics: usize,
    config: TrainerConfig,
    strategy: InitStrategy,
    runs: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let corpus = SparseCorpus::from_triple_file(input)?;
    let output_path = default_output(input, output);

    println!("ALICE-PLSA Training");
    println!("===================");
    println!("Corpus:     {}", input.display());
    println!("Words:      {}", corpus.n_words());
    println!("Documents:  {}", corpus.n_docs());
    println!("Entries:    {}", corpus.len());
    println!("Tokens:     {}", corpus.total_count());
    println!("Topics:     {}", topics);
    println!();

    let start = Instant::now();
    let model = if runs > 1 {
        let base_seed = match strategy {
            InitStrategy::Random { seed } => seed,
            InitStrategy::Uniform => 0,
        };
        let model = train_averaged(&corpus, topics, runs, config, base_seed)?;
        println!("Runs:       {}", runs);
        println!("Likelihood: {:.6}", log_likelihood(&corpus, &model));
        model
    } else {
        let initial = ModelState::initialize(&corpus, topics, strategy)?;
        let outcome = Trainer::new(config)
            .with_observer(LogProgress)
            .train(&corpus, initial)?;
        print_outcome(&outcome);
        outcome.model
    };
    let elapsed = start.elapsed();

    model.save(&output_path)?;
    println!("Time:       {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    println!("Output:     {}", output_path.display());
    Ok(())
}

fn fold_in_file(
    model_path: &Path,
    input: &Path,
    output: Option<PathBuf>,
    config: TrainerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let trained = ModelState::load(model_path)?;
    let corpus = SparseCorpus::from_triple_file(input)?;
    let output_path = default_output(input, output);

    let start = Instant::now();
    let outcome = fold_in(&trained, &corpus, config)?;
    let elapsed = start.elapsed();

    println!("ALICE-PLSA Folding-in");
    println!("=====================");
    println!("Model:      {}", model_path.display());
    println!("Documents:  {}", corpus.n_docs());
    print_outcome(&outcome);
    println!("Time:       {:.2}ms", elapsed.as_secs_f64() * 1000.0);

    println!();
    println!("Document topics P(z|d):");
    let topics = outcome.document_topics()?;
    for d in 0..topics.rows() {
        let weights: Vec<String> = topics.row(d).iter().map(|p| format!("{:.4}", p)).collect();
        println!("  d{:<4} {}", d, weights.join(" "));
    }
    println!();

    outcome.model.save(&output_path)?;
    println!("Output:     {}", output_path.display());
    Ok(())
}

fn print_outcome(outcome: &TrainingOutcome) {
    println!("Stopped:    {:?}", outcome.stop_reason);
    println!("Iterations: {}", outcome.iterations);
    println!("Likelihood: {:.6}", outcome.log_likelihood);
    match outcome.final_delta {
        Some(delta) => println!("Last ΔL:    {:.6e}", delta),
        None => println!("Last ΔL:    -"),
    }
}

fn show_info(model_path: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(model_path)?;
    let header = read_header(&data)?;

    println!("ALICE-PLSA Model Information");
    println!("============================");
    println!("File:       {}", model_path.display());
    println!("Size:       {} bytes", data.len());
    println!("Version:    {}.{}", data[8], data[9]);
    println!("Words:      {}", header.n_words);
    println!("Documents:  {}", header.n_docs);
    println!("Topics:     {}", header.n_topics);

    let model = ModelState::from_bytes(&data)?;
    let worst = (0..model.n_topics())
        .flat_map(|z| [model.p_w_z.column_sum(z), model.p_d_z.column_sum(z)])
        .map(|sum| if sum == 0.0 { 0.0 } else { (sum - 1.0).abs() })
        .fold(0.0f64, f64::max);
    println!("P(z) sum:   {:.12}", model.p_z.iter().sum::<f64>());
    println!("Max column deviation: {:.3e}", worst);

    println!();
    println!("Topic priors:");
    for (z, p) in model.p_z.iter().enumerate() {
        println!("  z{:<4} {:.6}", z, p);
    }

    if json {
        println!();
        println!("{}", model.to_json()?);
    }
    Ok(())
}

fn show_likelihood(model_path: &Path, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let model = ModelState::load(model_path)?;
    let corpus = SparseCorpus::from_triple_file(input)?;
    let lik = checked_log_likelihood(&corpus, &model)?;
    let tokens = corpus.total_count().max(1) as f64;
    println!("Log-likelihood: {:.6}", lik);
    println!("Per token:      {:.6}", lik / tokens);
    println!("Perplexity:     {:.4}", (-lik / tokens).exp());
    Ok(())
}
