//! Per-section transcripts with write-through persistence.

use std::sync::Arc;

use companion_core::{Message, SectionCatalog, StateStore, TranscriptMap};
use tracing::{debug, info, warn};

/// Ordered messages for every known section.
///
/// Each mutation persists the whole mapping before it returns. When the
/// backing store fails (on read or write) the store switches to memory-only
/// mode for the rest of its life and reports it through
/// [`TranscriptStore::persistence_degraded`].
pub struct TranscriptStore<S = Arc<dyn StateStore>>
where
    S: Send + Sync,
{
    catalog: Arc<SectionCatalog>,
    storage: S,
    transcripts: TranscriptMap,
    degraded: Option<String>,
}

impl<S> TranscriptStore<S>
where
    S: StateStore + Send + Sync,
{
    /// An empty store; call [`TranscriptStore::load`] to rehydrate.
    pub fn new(catalog: Arc<SectionCatalog>, storage: S) -> Self {
        Self {
            catalog,
            storage,
            transcripts: TranscriptMap::new(),
            degraded: None,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &SectionCatalog {
        &self.catalog
    }

    /// Read the persisted mapping, dropping sections the catalog no longer has.
    pub async fn load(&mut self) -> &TranscriptMap {
        match self.storage.read_transcripts().await {
            Ok(Some(stored)) => {
                let total = stored.len();
                self.transcripts = stored
                    .into_iter()
                    .filter(|(id, _)| self.catalog.contains(id))
                    .collect();
                let dropped = total - self.transcripts.len();
                if dropped > 0 {
                    info!("Dropped {dropped} transcript(s) for unknown sections");
                }
                info!("Loaded {} transcript(s)", self.transcripts.len());
            }
            Ok(None) => {
                debug!("No persisted transcripts");
                self.transcripts.clear();
            }
            Err(e) => {
                self.transcripts.clear();
                self.degrade(&e);
            }
        }
        &self.transcripts
    }

    /// Persisted active section, if it still names a known section.
    pub async fn load_active_section(&mut self) -> Option<String> {
        match self.storage.read_active_section().await {
            Ok(Some(id)) if self.catalog.contains(&id) => Some(id),
            Ok(Some(id)) => {
                info!("Ignoring persisted active section {id:?}: not in catalog");
                None
            }
            Ok(None) => None,
            Err(e) => {
                self.degrade(&e);
                None
            }
        }
    }

    pub async fn save_active_section(&mut self, section_id: &str) {
        if self.degraded.is_some() {
            return;
        }
        if let Err(e) = self.storage.write_active_section(section_id).await {
            self.degrade(&e);
        }
    }

    /// Append to the end of a section's transcript, returning its new length.
    ///
    /// Writes to unknown sections are ignored and return `None`. A timestamp
    /// older than the current last entry is raised to it so order and time
    /// agree.
    pub async fn append(&mut self, section_id: &str, mut message: Message) -> Option<usize> {
        if !self.catalog.contains(section_id) {
            warn!("Ignoring append to unknown section {section_id:?}");
            return None;
        }

        let transcript = self.transcripts.entry(section_id.to_string()).or_default();
        if let Some(last) = transcript.last() {
            message.timestamp = message.timestamp.max(last.timestamp);
        }
        transcript.push(message);
        let len = transcript.len();

        self.persist().await;
        Some(len)
    }

    /// Empty a section's transcript. The empty entry stays in the mapping.
    pub async fn clear(&mut self, section_id: &str) -> bool {
        self.replace(section_id, Vec::new()).await
    }

    /// Replace a section's transcript wholesale.
    pub async fn replace(&mut self, section_id: &str, messages: Vec<Message>) -> bool {
        if !self.catalog.contains(section_id) {
            warn!("Ignoring replace of unknown section {section_id:?}");
            return false;
        }
        self.transcripts.insert(section_id.to_string(), messages);
        self.persist().await;
        true
    }

    /// Copy of a section's messages; empty if it has none.
    #[must_use]
    pub fn snapshot(&self, section_id: &str) -> Vec<Message> {
        self.transcripts.get(section_id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self, section_id: &str) -> usize {
        self.transcripts.get(section_id).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn last(&self, section_id: &str) -> Option<&Message> {
        self.transcripts.get(section_id).and_then(|t| t.last())
    }

    /// Whether the section ever received a message (even if since cleared).
    #[must_use]
    pub fn has_transcript(&self, section_id: &str) -> bool {
        self.transcripts.contains_key(section_id)
    }

    /// Reason the store went memory-only, if it did.
    #[must_use]
    pub fn persistence_degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    async fn persist(&mut self) {
        if self.degraded.is_some() {
            return;
        }
        if let Err(e) = self.storage.write_transcripts(&self.transcripts).await {
            self.degrade(&e);
        }
    }

    fn degrade(&mut self, error: &anyhow::Error) {
        warn!("State store failed, continuing in memory only: {error:#}");
        self.degraded.get_or_insert_with(|| error.to_string());
    }
}
