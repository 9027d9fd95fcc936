//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use companion_config::{Config, ExportConfig};
use companion_conversation::{SessionContext, SessionController};
use companion_core::{AskService, SectionCatalog, StateStore};
use companion_export::{ExportEngine, PageLayout};
use companion_providers::HttpAskService;
use companion_session::{FileStateStore, MemoryStateStore};
use tracing::info;

mod chat;
mod export;
mod init;
mod sections;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use export::{ExportInput, ExportStrategy};
pub use init::InitStrategy;
pub use sections::SectionsStrategy;
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// # Example
/// ```rust,ignore
/// struct MyStrategy;
///
/// impl CommandStrategy for MyStrategy {
///     type Input = MyInput;
///
///     async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Plain text
    Txt,
    /// Paginated PDF
    Pdf,
}

/// Components shared by the commands that touch a session.
struct CommonComponents {
    config: Config,
    controller: SessionController,
}

/// Load configuration and open the session it points at.
async fn init_common_components(ephemeral: bool) -> anyhow::Result<CommonComponents> {
    let config = Config::load_or_default();
    let catalog = Arc::new(SectionCatalog::builtin());

    let storage: Arc<dyn StateStore> = if ephemeral {
        info!("History is kept in memory only");
        Arc::new(MemoryStateStore::new())
    } else {
        Arc::new(FileStateStore::new(config.state_dir()?))
    };
    let ctx = SessionContext::load(catalog, storage).await;

    info!("Using assistant service at {}", config.service.base_url);
    let service: Arc<dyn AskService> = Arc::new(HttpAskService::new(
        config.service.base_url.clone(),
        Duration::from_secs(config.service.timeout_secs),
    )?);

    let exporter = ExportEngine::with_local_time(page_layout(&config.export));
    let controller = SessionController::new(
        ctx,
        service,
        Duration::from_millis(config.reveal.tick_ms),
        exporter,
    );

    Ok(CommonComponents { config, controller })
}

fn page_layout(export: &ExportConfig) -> PageLayout {
    PageLayout {
        line_width: export.line_width,
        page_height: export.page_height,
        margin: export.margin,
        line_height: export.line_height,
        block_gap: export.block_gap,
        ..PageLayout::default()
    }
}

/// Export `section_id` into `dir`, returning the written path.
async fn write_export(
    controller: &SessionController,
    section_id: &str,
    format: ExportFormat,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let (file_name, bytes) = match format {
        ExportFormat::Txt => {
            let export = controller.export_text(section_id).await?;
            (export.file_name, export.content.into_bytes())
        }
        ExportFormat::Pdf => {
            let export = controller.export_paginated(section_id).await?;
            let bytes = export.to_pdf();
            (export.file_name, bytes)
        }
    };

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    info!("Exported {section_id} to {}", path.display());
    Ok(path)
}
