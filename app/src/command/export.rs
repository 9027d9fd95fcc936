use std::path::PathBuf;

use super::{ExportFormat, init_common_components, write_export};

/// Input parameters for the Export command strategy.
#[derive(Debug, Clone)]
pub struct ExportInput {
    pub section: String,
    pub format: ExportFormat,
    /// Directory to write into instead of the configured one
    pub output: Option<PathBuf>,
}

/// Strategy for writing one section's persisted history to a file.
#[derive(Debug, Clone, Copy)]
pub struct ExportStrategy;

impl super::CommandStrategy for ExportStrategy {
    type Input = ExportInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components(false).await?;
        let dir = input
            .output
            .unwrap_or_else(|| common.config.export_dir());

        let path = write_export(&common.controller, &input.section, input.format, &dir).await?;
        println!("{}", path.display());
        Ok(())
    }
}
