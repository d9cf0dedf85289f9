//! lumac CLI - Main entry point

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lumac_core::{ExpandError, Preprocessor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lumac")]
#[command(about = "Macro preprocessor with Lua macro code")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a template
    Expand {
        /// Template file to expand
        input: PathBuf,

        /// Write the result to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Report every template token while parsing
        #[arg(long)]
        trace_parsing: bool,

        /// Report every template section as it is evaluated
        #[arg(long)]
        trace_evaluation: bool,
    },

    /// Print the generated template script without executing it
    Script {
        /// Template file
        input: PathBuf,

        /// Generate trace statements into the script
        #[arg(long)]
        trace_evaluation: bool,
    },
}

fn main() -> Result<(), ExpandError> {
    let cli = Cli::parse();

    let tracing_requested = match &cli.command {
        Commands::Expand {
            trace_parsing,
            trace_evaluation,
            ..
        } => *trace_parsing || *trace_evaluation,
        Commands::Script { .. } => false,
    };
    init_tracing(cli.verbose, tracing_requested);

    match cli.command {
        Commands::Expand {
            input,
            output,
            trace_parsing,
            trace_evaluation,
        } => {
            let preprocessor = Preprocessor::new()
                .with_trace_parsing(trace_parsing)
                .with_trace_evaluation(trace_evaluation);
            match output {
                Some(path) => {
                    preprocessor.expand_file_to_file(&input, &path)?;
                    tracing::info!(output = %path.display(), "expansion written");
                }
                None => {
                    let result = preprocessor.expand_file(&input)?;
                    print!("{result}");
                }
            }
        }
        Commands::Script {
            input,
            trace_evaluation,
        } => {
            let preprocessor = Preprocessor::new().with_trace_evaluation(trace_evaluation);
            let script = preprocessor.template_script(&input)?;
            print!("{script}");
        }
    }

    Ok(())
}

/// Initialize logging. Trace flags raise the default filter so their
/// reports are visible without RUST_LOG; logs go to stderr, the expansion
/// result owns stdout.
fn init_tracing(verbose: u8, tracing_requested: bool) {
    let default = match verbose {
        0 if tracing_requested => "lumac_core=debug",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
