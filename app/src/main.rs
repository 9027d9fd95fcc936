#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

mod command;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use command::{
    ChatInput, ChatStrategy, CommandStrategy, ExportFormat, ExportInput, ExportStrategy,
    InitStrategy, SectionsStrategy, VersionStrategy,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "companion")]
#[command(about = "Sectioned assistant client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Section to start in (defaults to the last active one)
        #[arg(short, long)]
        section: Option<String>,

        /// Single message to send, printed without the reveal
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// Keep history in memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// List the available sections
    Sections,
    /// Export a section's history
    Export {
        /// Section id, e.g. `banking`
        section: String,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::Txt)]
        format: ExportFormat,

        /// Output directory (overrides the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Initialize configuration
    Init,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            section,
            message,
            ephemeral,
        } => {
            ChatStrategy
                .execute(ChatInput {
                    section,
                    message,
                    ephemeral,
                })
                .await
        }
        Commands::Sections => SectionsStrategy.execute(()).await,
        Commands::Export {
            section,
            format,
            output,
        } => {
            ExportStrategy
                .execute(ExportInput {
                    section,
                    format,
                    output,
                })
                .await
        }
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
