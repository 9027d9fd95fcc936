//! Fixed topical sections a conversation can live in.

use serde::{Deserialize, Serialize};

/// Section a fresh session starts in.
pub const DEFAULT_SECTION_ID: &str = "general";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub example_queries: Vec<String>,
}

impl Section {
    fn builtin(id: &str, name: &str, examples: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            example_queries: examples.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Immutable lookup table of sections, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionCatalog {
    sections: Vec<Section>,
}

impl SectionCatalog {
    /// Build a catalog; later duplicates of an id are dropped.
    #[must_use]
    pub fn new(sections: Vec<Section>) -> Self {
        let mut unique: Vec<Section> = Vec::with_capacity(sections.len());
        for section in sections {
            if !unique.iter().any(|s| s.id == section.id) {
                unique.push(section);
            }
        }
        Self { sections: unique }
    }

    /// The sections the assistant service knows how to answer for.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![
            Section::builtin(
                "health",
                "Health",
                &[
                    "How much water should I drink every day?",
                    "What is a good stretching routine after running?",
                    "How can I improve my sleep quality?",
                ],
            ),
            Section::builtin(
                "banking",
                "Banking",
                &[
                    "What is the difference between a savings and a checking account?",
                    "How do I build an emergency budget?",
                    "How does compound interest work?",
                ],
            ),
            Section::builtin(
                "movies",
                "Movies",
                &[
                    "Recommend a sci-fi film with a great plot twist.",
                    "Who directed the best heist movies?",
                    "What makes a screenplay memorable?",
                ],
            ),
            Section::builtin(
                "music",
                "Music",
                &[
                    "Suggest a playlist for a focused study session.",
                    "What instrument is easiest to learn as an adult?",
                    "Which albums defined 90s rock?",
                ],
            ),
            Section::builtin(
                DEFAULT_SECTION_ID,
                "General",
                &[
                    "Explain mindfulness in two sentences.",
                    "What is trending on social media this week?",
                    "Give me a fun fact about octopuses.",
                ],
            ),
        ])
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Section used when nothing valid was restored: `general` when present,
    /// otherwise the first entry.
    #[must_use]
    pub fn default_section(&self) -> Option<&Section> {
        self.get(DEFAULT_SECTION_ID).or_else(|| self.sections.first())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.sections.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Default for SectionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
