use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use companion_core::{StateStore, TranscriptMap};
use tokio::sync::Mutex;
use tracing::{debug, info};

const ACTIVE_SECTION_FILE: &str = "active_section";
const TRANSCRIPTS_FILE: &str = "transcripts.json";

/// State kept as two files in one directory: the active section id as raw
/// text and the transcript mapping as JSON.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        info!("Using state directory: {}", dir.display());
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_optional(&self, name: &str) -> anyhow::Result<Option<String>> {
        match tokio::fs::read_to_string(self.dir.join(name)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes land in a sibling temp file that is then renamed over the target.
    async fn write_atomic(&self, name: &str, content: &[u8]) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &target).await?;
        debug!("Wrote {}", target.display());
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read_active_section(&self) -> anyhow::Result<Option<String>> {
        Ok(self
            .read_optional(ACTIVE_SECTION_FILE)
            .await?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    async fn write_active_section(&self, section_id: &str) -> anyhow::Result<()> {
        self.write_atomic(ACTIVE_SECTION_FILE, section_id.as_bytes())
            .await
    }

    async fn read_transcripts(&self) -> anyhow::Result<Option<TranscriptMap>> {
        match self.read_optional(TRANSCRIPTS_FILE).await? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    async fn write_transcripts(&self, transcripts: &TranscriptMap) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(transcripts)?;
        self.write_atomic(TRANSCRIPTS_FILE, &json).await
    }
}

#[derive(Debug, Default)]
struct MemoryRecords {
    active_section: Option<String>,
    transcripts: Option<TranscriptMap>,
}

/// Process-local `StateStore`. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<MemoryRecords>,
    fail_writes: AtomicBool,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing records, as if read back from disk.
    #[must_use]
    pub fn with_records(
        active_section: Option<String>,
        transcripts: Option<TranscriptMap>,
    ) -> Self {
        Self {
            records: Mutex::new(MemoryRecords {
                active_section,
                transcripts,
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every following write fail, simulating an unwritable store.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("state store is not writable");
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read_active_section(&self) -> anyhow::Result<Option<String>> {
        Ok(self.records.lock().await.active_section.clone())
    }

    async fn write_active_section(&self, section_id: &str) -> anyhow::Result<()> {
        self.check_writable()?;
        self.records.lock().await.active_section = Some(section_id.to_string());
        Ok(())
    }

    async fn read_transcripts(&self) -> anyhow::Result<Option<TranscriptMap>> {
        Ok(self.records.lock().await.transcripts.clone())
    }

    async fn write_transcripts(&self, transcripts: &TranscriptMap) -> anyhow::Result<()> {
        self.check_writable()?;
        self.records.lock().await.transcripts = Some(transcripts.clone());
        Ok(())
    }
}
