//! Entity extraction.
//!
//! Pulling named concepts out of text is an external collaborator behind the
//! [`EntityExtractor`] trait; the engine only needs names and kinds.
//! [`KeywordExtractor`] is the in-process reference implementation: pattern
//! matching against a fixed vocabulary plus capitalized-phrase detection. It
//! is deliberately shallow — an LLM-backed extractor plugs into the same
//! trait without the engine noticing.

use crate::Result;
use crate::models::EntityKind;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Technology vocabulary for pattern-based extraction.
static TECH_PATTERNS: &[&str] = &[
    // Languages
    "Rust",
    "Python",
    "Java",
    "JavaScript",
    "TypeScript",
    "Go",
    "Ruby",
    "Kotlin",
    "Swift",
    // Databases
    "PostgreSQL",
    "MySQL",
    "SQLite",
    "Redis",
    "MongoDB",
    "Elasticsearch",
    "Neo4j",
    // Infrastructure
    "Docker",
    "Kubernetes",
    "Kafka",
    "AWS",
    "GCP",
    "Azure",
    // Frameworks
    "React",
    "Django",
    "Rails",
    "Tokio",
    "Axum",
];

static TECH_REGEX: Lazy<Regex> = Lazy::new(|| {
    let alternatives = TECH_PATTERNS
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    // The pattern is assembled from escaped literals; it always compiles.
    #[allow(clippy::unwrap_used)]
    let regex = Regex::new(&format!(r"(?i)\b({alternatives})\b")).unwrap();
    regex
});

/// Capitalized multi-word phrases ("Acme Corp", "Event Sourcing").
static PHRASE_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let regex = Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").unwrap();
    regex
});

/// File paths mentioned in content ("src/main.rs", "docs/setup.md").
static FILE_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let regex = Regex::new(r"\b[\w./-]+\.(?:rs|py|js|ts|go|java|md|toml|yaml|json)\b").unwrap();
    regex
});

/// A named concept found in text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractedEntity {
    /// Canonical name as it appeared (vocabulary casing for known terms).
    pub name: String,
    /// Best-effort category.
    pub kind: EntityKind,
}

/// Trait for entity extraction providers.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extracts named concepts from text.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction fails; callers degrade by skipping
    /// graph association for the request.
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedEntity>>;
}

/// Pattern-based reference extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    /// Creates a new keyword extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn canonical_tech(name: &str) -> Option<&'static str> {
        TECH_PATTERNS
            .iter()
            .find(|p| p.eq_ignore_ascii_case(name))
            .copied()
    }
}

#[async_trait]
impl EntityExtractor for KeywordExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedEntity>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for m in TECH_REGEX.find_iter(text) {
            let name = Self::canonical_tech(m.as_str()).unwrap_or(m.as_str());
            if seen.insert(name.to_lowercase()) {
                out.push(ExtractedEntity {
                    name: name.to_string(),
                    kind: EntityKind::Technology,
                });
            }
        }

        for m in FILE_REGEX.find_iter(text) {
            if seen.insert(m.as_str().to_lowercase()) {
                out.push(ExtractedEntity {
                    name: m.as_str().to_string(),
                    kind: EntityKind::File,
                });
            }
        }

        for m in PHRASE_REGEX.find_iter(text) {
            if seen.insert(m.as_str().to_lowercase()) {
                out.push(ExtractedEntity {
                    name: m.as_str().to_string(),
                    kind: EntityKind::Concept,
                });
            }
        }

        Ok(out)
    }
}
