//! AMC command-line interface

use clap::{Parser, Subcommand};
use octofhir_amc::cli::{output, rules, run};
use std::path::PathBuf;

/// AMC command-line tool
#[derive(Parser)]
#[command(name = "amc")]
#[command(author, version, about = "Automated Measure Calculation (AMC) tools", long_about = None)]
struct Cli {
    /// Verbose output (enables debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, table, pretty)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the rules of a run configuration
    Run {
        /// Run configuration file (JSON)
        file: PathBuf,

        /// Include itemized entries in the output
        #[arg(short, long)]
        items: bool,
    },

    /// List object types and criteria kinds
    Rules,
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .init();

    let result = match cli.command {
        Commands::Run { file, items } => {
            let args = run::RunArgs {
                file,
                show_items: items,
                verbose: cli.verbose,
                output_format: cli.format.clone(),
                output_file: cli.output.clone(),
            };
            run::run(args).await
        }

        Commands::Rules => rules::list(rules::RulesArgs {
            output_format: cli.format.clone(),
            output_file: cli.output.clone(),
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
