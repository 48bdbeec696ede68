use clap::{ArgEnum, Parser, Subcommand};
use gbmhmm::{
    config::{EmissionKind, HmmConfig, InitMethod},
    em::fit_store,
    error::Result,
    hmm::ModelParameters,
    observation::{
        mocks::{mock_gbm_records, MOCK_FEATURES},
        MissingPolicy, ObservationStore, Record,
    },
    report::Report,
};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, about, version)]
struct Opts {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(ArgEnum, Clone, Copy, Debug)]
enum Kind {
    Diagonal,
    Full,
}

#[derive(ArgEnum, Clone, Copy, Debug)]
enum Init {
    Random,
    Kmeans,
}

#[derive(ArgEnum, Clone, Copy, Debug)]
enum Missing {
    Reject,
    Drop,
    Carry,
    Mean,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fit a model by Baum-Welch and decode every patient
    Fit {
        /// Input table JSON (`{"feature_names": [..], "records": [..]}`).
        /// If not specified, the bundled mock dataset is used.
        #[clap(short, long)]
        input: Option<PathBuf>,
        /// Number of hidden states
        #[clap(short = 'K', default_value_t = 3)]
        n_states: usize,
        #[clap(long, arg_enum, default_value = "full")]
        kind: Kind,
        #[clap(long, arg_enum, default_value = "kmeans")]
        init: Init,
        #[clap(long, arg_enum, default_value = "reject")]
        missing: Missing,
        #[clap(short, long, default_value_t = 42)]
        seed: u64,
        #[clap(short, long, default_value_t = 5)]
        restarts: usize,
        #[clap(short = 'M', long, default_value_t = 200)]
        max_iter: usize,
        #[clap(long, default_value_t = 1e-4)]
        tol: f64,
        /// State names in state order, comma separated
        #[clap(long, use_value_delimiter = true)]
        labels: Vec<String>,
        /// Run the E-step of patients in parallel
        #[clap(short, long)]
        parallel: bool,
        /// Output fitted parameters JSON
        #[clap(long)]
        params_output: Option<PathBuf>,
        /// Output trajectories JSON
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode every patient with already fitted parameters
    Decode {
        /// Fitted parameters JSON
        params: PathBuf,
        #[clap(short, long)]
        input: Option<PathBuf>,
        #[clap(long, arg_enum, default_value = "reject")]
        missing: Missing,
        #[clap(long, use_value_delimiter = true)]
        labels: Vec<String>,
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Deserialize)]
struct Table {
    feature_names: Vec<String>,
    records: Vec<Record>,
}

fn load_store(input: &Option<PathBuf>, missing: Missing) -> Result<ObservationStore> {
    let store = match input {
        Some(path) => {
            let file = std::fs::File::open(path)?;
            let table: Table = serde_json::from_reader(std::io::BufReader::new(file))?;
            ObservationStore::from_records(table.feature_names, table.records)?
        }
        None => {
            let features = MOCK_FEATURES.iter().map(|s| s.to_string()).collect();
            ObservationStore::from_records(features, mock_gbm_records())?
        }
    };
    let policy = match missing {
        Missing::Reject => MissingPolicy::Reject,
        Missing::Drop => MissingPolicy::DropTimepoint,
        Missing::Carry => MissingPolicy::CarryForward,
        Missing::Mean => MissingPolicy::FeatureMean,
    };
    store.apply_missing_policy(policy)
}

fn emit(report: &Report, output: &Option<PathBuf>) -> Result<()> {
    print!("{}", report);
    if let Some(path) = output {
        report.to_file(path)?;
        println!("# trajectories written to {}", path.display());
    }
    Ok(())
}

fn with_labels(config: HmmConfig, labels: &[String]) -> HmmConfig {
    if labels.is_empty() {
        config
    } else {
        config.with_state_labels(labels.to_vec())
    }
}

fn run(opts: &Opts) -> Result<()> {
    match &opts.command {
        Commands::Fit {
            input,
            n_states,
            kind,
            init,
            missing,
            seed,
            restarts,
            max_iter,
            tol,
            labels,
            parallel,
            params_output,
            output,
        } => {
            let store = load_store(input, *missing)?;
            let kind = match kind {
                Kind::Diagonal => EmissionKind::Diagonal,
                Kind::Full => EmissionKind::Full,
            };
            let init = match init {
                Init::Random => InitMethod::Random,
                Init::Kmeans => InitMethod::KMeans,
            };
            let config = HmmConfig::new(*n_states, kind)
                .with_init_method(init)
                .with_seed(*seed)
                .with_restarts(*restarts)
                .with_max_iter(*max_iter)
                .with_tol(*tol)
                .with_parallel(*parallel);
            let config = with_labels(config, labels);
            println!("# config\n{}", config);
            println!(
                "# patients={} observations={}",
                store.n_sequences(),
                store.n_observations()
            );

            let result = fit_store(&config, &store)?;
            println!(
                "# restart={} ll={} iterations={} converged={}",
                result.restart, result.log_likelihood, result.iterations, result.converged
            );
            print!("{}", result.params);
            if let Some(path) = params_output {
                result.params.to_file(path)?;
                println!("# parameters written to {}", path.display());
            }
            emit(&Report::build(&result.params, &config, &store), output)
        }
        Commands::Decode {
            params,
            input,
            missing,
            labels,
            output,
        } => {
            let store = load_store(input, *missing)?;
            let params = ModelParameters::from_file(params)?;
            let config = with_labels(HmmConfig::new(params.n_states(), params.kind()), labels);
            print!("{}", params);
            emit(&Report::build(&params, &config, &store), output)
        }
    }
}

fn main() {
    env_logger::init();
    let opts: Opts = Opts::parse();
    println!("# started_at={}", chrono::Local::now());
    println!("# n_threads={}", rayon::current_num_threads());
    println!("# opts={:?}", opts);
    if let Err(e) = run(&opts) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
    println!("# finished_at={}", chrono::Local::now());
}
