//! Keyword-overlap context retriever over local reference documents.
//!
//! Documents are `.md` / `.txt` files with optional front matter:
//!
//! ```text
//! ---
//! title: Hospital EHR availability
//! industry: healthcare
//! ---
//! Body text...
//! ```
//!
//! Bodies are split into overlapping chunks; a chunk's score is the share of
//! distinct query terms it contains. When front matter names no industry,
//! one is inferred from the body.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::domain::consultation::detect_industries;
use crate::ports::{ContextRetriever, MetadataFilter, RetrievalError, RetrievedContext, SourceRef};

const CHUNK_CHARS: usize = 1000;
const CHUNK_OVERLAP: usize = 200;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "with", "this", "that", "have",
    "from", "what", "which", "will", "would", "should", "can", "our", "their", "about", "into",
    "been", "was", "were", "how", "when", "where", "who", "why", "does", "need", "want",
];

/// A reference document available for retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDocument {
    pub doc_id: String,
    pub title: String,
    pub body: String,
    pub metadata: BTreeMap<String, String>,
}

impl ReferenceDocument {
    pub fn new(doc_id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let mut metadata = BTreeMap::new();
        if let Some(industry) = detect_industries(&body).first() {
            metadata.insert("industry".to_string(), industry.as_str().to_string());
        }
        Self {
            doc_id: doc_id.into(),
            title: title.into(),
            body,
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn matches(&self, filter: Option<&MetadataFilter>) -> bool {
        filter.map_or(true, |f| {
            f.iter()
                .all(|(k, v)| self.metadata.get(k).is_some_and(|m| m.eq_ignore_ascii_case(v)))
        })
    }

    /// Parses a file's raw text, using `stem` when no title is given.
    fn parse(stem: &str, raw: &str) -> Self {
        let (meta, body) = split_front_matter(raw);
        let title = meta
            .get("title")
            .cloned()
            .or_else(|| {
                body.lines()
                    .find_map(|l| l.strip_prefix("# "))
                    .map(|h| h.trim().to_string())
            })
            .unwrap_or_else(|| stem.to_string());

        let mut doc = Self::new(stem, title, body.trim());
        for (k, v) in meta {
            if k != "title" {
                doc.metadata.insert(k, v);
            }
        }
        doc
    }
}

fn split_front_matter(raw: &str) -> (BTreeMap<String, String>, String) {
    let mut lines = raw.lines();
    if lines.next().map(str::trim) != Some("---") {
        return (BTreeMap::new(), raw.to_string());
    }

    let mut meta = BTreeMap::new();
    let mut body = Vec::new();
    let mut in_body = false;
    for line in lines {
        if !in_body && line.trim() == "---" {
            in_body = true;
            continue;
        }
        if in_body {
            body.push(line);
        } else if let Some((k, v)) = line.split_once(':') {
            meta.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    if in_body {
        (meta, body.join("\n"))
    } else {
        (BTreeMap::new(), raw.to_string())
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn chunks(body: &str) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() <= CHUNK_CHARS {
        return vec![body.to_string()];
    }

    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + CHUNK_CHARS).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end - CHUNK_OVERLAP;
    }
    out
}

struct Chunk {
    doc: usize,
    text: String,
    terms: HashSet<String>,
}

/// In-process retriever ranking document chunks by term overlap.
pub struct KeywordContextRetriever {
    documents: Vec<ReferenceDocument>,
    chunks: Vec<Chunk>,
}

impl KeywordContextRetriever {
    pub fn new(documents: Vec<ReferenceDocument>) -> Self {
        let chunks = documents
            .iter()
            .enumerate()
            .flat_map(|(doc, d)| {
                chunks(&d.body).into_iter().map(move |text| Chunk {
                    doc,
                    terms: terms(&text),
                    text,
                })
            })
            .collect();
        Self { documents, chunks }
    }

    /// Loads every `.md` / `.txt` file directly inside `dir`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the directory or a file cannot be read
    pub fn from_directory(dir: &Path) -> Result<Self, RetrievalError> {
        let entries = fs::read_dir(dir).map_err(|e| {
            RetrievalError::Unavailable(format!("cannot read {}: {}", dir.display(), e))
        })?;

        let mut paths: Vec<_> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("txt"))
            })
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = fs::read_to_string(&path).map_err(|e| {
                RetrievalError::Unavailable(format!("cannot read {}: {}", path.display(), e))
            })?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document");
            documents.push(ReferenceDocument::parse(stem, &raw));
        }

        tracing::info!(dir = %dir.display(), documents = documents.len(), "Loaded reference documents");
        Ok(Self::new(documents))
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[async_trait]
impl ContextRetriever for KeywordContextRetriever {
    async fn relevant_context(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievedContext, RetrievalError> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(RetrievedContext::empty());
        }

        let mut scored: Vec<(f32, &Chunk)> = self
            .chunks
            .iter()
            .filter(|c| self.documents[c.doc].matches(filter))
            .filter_map(|c| {
                let hits = query_terms.intersection(&c.terms).count();
                (hits > 0).then(|| (hits as f32 / query_terms.len() as f32, c))
            })
            .collect();
        // Stable sort keeps document order among equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        let mut text = Vec::with_capacity(scored.len());
        let mut sources = Vec::with_capacity(scored.len());
        for (n, (score, chunk)) in scored.into_iter().enumerate() {
            let doc = &self.documents[chunk.doc];
            text.push(format!("[Source {}: {}]\n{}", n + 1, doc.title, chunk.text.trim()));
            sources.push(SourceRef {
                doc_id: doc.doc_id.clone(),
                title: doc.title.clone(),
                score,
            });
        }

        Ok(RetrievedContext {
            text: text.join("\n\n"),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn retriever() -> KeywordContextRetriever {
        KeywordContextRetriever::new(vec![
            ReferenceDocument::new(
                "ehr",
                "EHR uptime",
                "Hospital EHR systems need 99.99% uptime and HIPAA audit trails.",
            ),
            ReferenceDocument::new(
                "bank",
                "Trading latency",
                "Banking trading platforms measure latency in milliseconds.",
            ),
        ])
    }

    #[tokio::test]
    async fn ranks_by_term_overlap() {
        let ctx = retriever()
            .relevant_context("What uptime should our EHR have?", 5, None)
            .await
            .unwrap();

        assert_eq!(ctx.sources.len(), 1);
        assert_eq!(ctx.sources[0].doc_id, "ehr");
        assert!(ctx.text.starts_with("[Source 1: EHR uptime]"));
    }

    #[tokio::test]
    async fn filter_restricts_to_matching_metadata() {
        let mut filter = MetadataFilter::new();
        filter.insert("industry".into(), "healthcare".into());

        let ctx = retriever()
            .relevant_context("latency uptime", 5, Some(&filter))
            .await
            .unwrap();

        assert!(ctx.sources.iter().all(|s| s.doc_id == "ehr"));
    }

    #[tokio::test]
    async fn no_match_is_empty_not_error() {
        let ctx = retriever()
            .relevant_context("volcano", 5, None)
            .await
            .unwrap();
        assert!(ctx.is_empty());
        assert!(ctx.sources.is_empty());
    }

    #[tokio::test]
    async fn respects_top_k() {
        let ctx = retriever()
            .relevant_context("uptime latency", 1, None)
            .await
            .unwrap();
        assert_eq!(ctx.sources.len(), 1);
    }

    #[test]
    fn long_bodies_are_chunked_with_overlap() {
        let body = "x".repeat(2500);
        let parts = chunks(&body);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.chars().count() <= CHUNK_CHARS));
    }

    #[test]
    fn front_matter_supplies_title_and_metadata() {
        let doc = ReferenceDocument::parse(
            "file",
            "---\ntitle: Retail SLA\nindustry: retail\n---\nCheckout availability targets.",
        );
        assert_eq!(doc.title, "Retail SLA");
        assert_eq!(doc.metadata.get("industry").map(String::as_str), Some("retail"));
        assert_eq!(doc.body, "Checkout availability targets.");
    }

    #[test]
    fn loads_directory_ignoring_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut md = std::fs::File::create(dir.path().join("guide.md")).unwrap();
        writeln!(md, "# Support tiers\nGold support responds within one hour.").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "Plain text notes").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let retriever = KeywordContextRetriever::from_directory(dir.path()).unwrap();
        assert_eq!(retriever.document_count(), 2);
        assert_eq!(retriever.documents[0].title, "Support tiers");
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let err = KeywordContextRetriever::from_directory(Path::new("/definitely/not/here"))
            .err()
            .unwrap();
        assert!(matches!(err, RetrievalError::Unavailable(_)));
    }
}
