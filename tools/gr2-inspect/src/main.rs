//! gr2-inspect - Granny container inspection tool
//!
//! Loads a .gr2 file and prints its section table and collection summary,
//! or dumps the resolved records as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gr2_inspect::{load_file, load_options, render_dump, render_summary, render_summary_json};

#[derive(Parser)]
#[command(name = "gr2-inspect")]
#[command(about = "Granny (.gr2) container inspection tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the section table and per-collection record counts
    Summary {
        /// Input .gr2 file
        input: PathBuf,

        /// Load options (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dump every resolved record as JSON
    Dump {
        /// Input .gr2 file
        input: PathBuf,

        /// Load options (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summary {
            input,
            config,
            json,
        } => {
            let options = load_options(config.as_deref())?;
            let graph = load_file(&input, &options)?;
            if !graph.issues.is_empty() {
                tracing::warn!("{:?}: {} structure issues", input, graph.issues.len());
            }

            if json {
                println!("{}", render_summary_json(&graph)?);
            } else {
                print!("{}", render_summary(&graph));
            }
        }

        Commands::Dump {
            input,
            config,
            output,
        } => {
            let options = load_options(config.as_deref())?;
            let graph = load_file(&input, &options)?;
            let text = render_dump(&graph)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    tracing::info!("Wrote {:?}", path);
                }
                None => println!("{}", text),
            }
        }
    }

    Ok(())
}
