use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;

use timed_automata::serialize;
use timed_learning::{mirrored_configuration, DtaTeacher, Learner};

#[derive(Debug, Parser)]
#[command(name = "tlearn", about = "Learn a deterministic timed automaton")]
struct Cli {
    /// Path to the target automaton document (JSON).
    path: PathBuf,

    /// Maximum number of candidate tables to explore.
    #[arg(long)]
    table_budget: Option<usize>,

    /// Log level filter (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log: tracing_subscriber::filter::LevelFilter,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(cli.log),
        )
        .init();

    let target = match serialize::load(&cli.path) {
        Ok(dta) => dta,
        Err(err) => {
            eprintln!("failed to load {}: {err}", cli.path.display());
            return ExitCode::FAILURE;
        }
    };
    info!(
        locations = target.location_count(),
        transitions = target.transitions().len(),
        clocks = target.clocks().len(),
        "target loaded"
    );

    let teacher = DtaTeacher::new(target);
    let config = mirrored_configuration(teacher.target().config());
    let mut learner = Learner::new(teacher.target().alphabet().clone(), config, &teacher);
    if let Some(budget) = cli.table_budget {
        learner = learner.with_table_budget(budget);
    }

    let start = std::time::Instant::now();
    match learner.learn() {
        Ok(hypothesis) => {
            println!("{hypothesis}");
            println!("membership queries:  {}", teacher.membership_queries());
            println!("equivalence queries: {}", teacher.equivalence_queries());
            println!("wall time:           {:?}", start.elapsed());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("learning aborted: {err}");
            ExitCode::FAILURE
        }
    }
}
