//! Document store collaborator: reading and writing annotator documents.
//!
//! The engines themselves never touch storage; a caller reads snapshots
//! through a [`DocumentStore`], runs diff/merge, and writes the consensus
//! back. The store is where concurrent modification is detected: a write
//! carries the timestamp the caller observed when it read, and fails before
//! anything is persisted when the stored copy has changed since.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{ConcordError, Result};
use crate::model::AnnotatorDocument;

/// Storage for per-annotator documents, keyed by `(document, annotator)`.
pub trait DocumentStore {
    /// Read one annotator's document.
    fn read(&self, document: &str, annotator: &str) -> Result<AnnotatorDocument>;

    /// Write one annotator's document.
    ///
    /// `read_at` is the timestamp observed when the caller read the
    /// document; when the stored copy is newer the write fails with
    /// [`ConcordError::ConcurrentModification`] and nothing is persisted.
    /// `None` writes unconditionally. Returns the new timestamp.
    fn write(
        &mut self,
        document: &str,
        annotator: &str,
        doc: &AnnotatorDocument,
        read_at: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>>;

    /// True if a document exists for the pair.
    fn exists(&self, document: &str, annotator: &str) -> bool;

    /// Delete a document. Deleting a missing document is a no-op.
    fn delete(&mut self, document: &str, annotator: &str) -> Result<()>;

    /// Last-modified timestamp, if the document exists.
    fn timestamp(&self, document: &str, annotator: &str) -> Option<DateTime<Utc>>;
}

/// In-memory store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<(String, String), (AnnotatorDocument, DateTime<Utc>)>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(document: &str, annotator: &str) -> (String, String) {
        (document.to_string(), annotator.to_string())
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, document: &str, annotator: &str) -> Result<AnnotatorDocument> {
        self.entries
            .get(&Self::key(document, annotator))
            .map(|(doc, _)| doc.clone())
            .ok_or_else(|| ConcordError::NotFound {
                document: document.to_string(),
                annotator: annotator.to_string(),
            })
    }

    fn write(
        &mut self,
        document: &str,
        annotator: &str,
        doc: &AnnotatorDocument,
        read_at: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>> {
        if let (Some(read_at), Some((_, stored))) =
            (read_at, self.entries.get(&Self::key(document, annotator)))
        {
            if *stored > read_at {
                return Err(ConcordError::ConcurrentModification {
                    document: document.to_string(),
                    annotator: annotator.to_string(),
                });
            }
        }
        let now = Utc::now();
        self.entries
            .insert(Self::key(document, annotator), (doc.clone(), now));
        Ok(now)
    }

    fn exists(&self, document: &str, annotator: &str) -> bool {
        self.entries.contains_key(&Self::key(document, annotator))
    }

    fn delete(&mut self, document: &str, annotator: &str) -> Result<()> {
        self.entries.remove(&Self::key(document, annotator));
        Ok(())
    }

    fn timestamp(&self, document: &str, annotator: &str) -> Option<DateTime<Utc>> {
        self.entries
            .get(&Self::key(document, annotator))
            .map(|(_, ts)| *ts)
    }
}

/// File-backed store: one pretty-printed JSON file per `(document,
/// annotator)` under `root/<document>/<annotator>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirectoryStore {
    root: PathBuf,
}

impl JsonDirectoryStore {
    /// Create a store rooted at a directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, document: &str, annotator: &str) -> PathBuf {
        self.root.join(document).join(format!("{annotator}.json"))
    }

    fn modified(path: &Path) -> Option<DateTime<Utc>> {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}

impl DocumentStore for JsonDirectoryStore {
    fn read(&self, document: &str, annotator: &str) -> Result<AnnotatorDocument> {
        let path = self.path(document, annotator);
        let file = File::open(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConcordError::NotFound {
                    document: document.to_string(),
                    annotator: annotator.to_string(),
                }
            } else {
                ConcordError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    fn write(
        &mut self,
        document: &str,
        annotator: &str,
        doc: &AnnotatorDocument,
        read_at: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>> {
        let path = self.path(document, annotator);

        if let (Some(read_at), Some(stored)) = (read_at, Self::modified(&path)) {
            if stored > read_at {
                return Err(ConcordError::ConcurrentModification {
                    document: document.to_string(),
                    annotator: annotator.to_string(),
                });
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConcordError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(&path).map_err(|source| ConcordError::Io {
            path: path.clone(),
            source,
        })?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, doc)?;

        Self::modified(&path).ok_or_else(|| ConcordError::Io {
            path,
            source: std::io::Error::new(std::io::ErrorKind::Other, "no timestamp after write"),
        })
    }

    fn exists(&self, document: &str, annotator: &str) -> bool {
        self.path(document, annotator).exists()
    }

    fn delete(&mut self, document: &str, annotator: &str) -> Result<()> {
        let path = self.path(document, annotator);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ConcordError::Io { path, source }),
        }
    }

    fn timestamp(&self, document: &str, annotator: &str) -> Option<DateTime<Utc>> {
        Self::modified(&self.path(document, annotator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotationInstance;

    fn sample_doc(annotator: &str) -> AnnotatorDocument {
        let mut doc = AnnotatorDocument::new(annotator);
        doc.push(AnnotationInstance::span("ne", 3, 9).with_feature("value", "PER"));
        doc
    }

    #[test]
    fn memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert!(!store.exists("doc1", "anna"));

        store.write("doc1", "anna", &sample_doc("anna"), None).unwrap();
        assert!(store.exists("doc1", "anna"));

        let read = store.read("doc1", "anna").unwrap();
        assert_eq!(read.len(), 1);

        store.delete("doc1", "anna").unwrap();
        assert!(!store.exists("doc1", "anna"));
        assert!(matches!(
            store.read("doc1", "anna"),
            Err(ConcordError::NotFound { .. })
        ));
    }

    #[test]
    fn memory_store_detects_concurrent_modification() {
        let mut store = MemoryStore::new();
        store.write("doc1", "anna", &sample_doc("anna"), None).unwrap();
        let stale = store.timestamp("doc1", "anna").unwrap() - chrono::Duration::seconds(1);

        let result = store.write("doc1", "anna", &sample_doc("anna"), Some(stale));
        assert!(matches!(
            result,
            Err(ConcordError::ConcurrentModification { .. })
        ));
    }

    #[test]
    fn json_store_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = JsonDirectoryStore::new(dir.path());

        let ts = store.write("doc1", "anna", &sample_doc("anna"), None).unwrap();
        assert!(store.exists("doc1", "anna"));
        assert!(store.timestamp("doc1", "anna").is_some());

        let read = store.read("doc1", "anna").unwrap();
        assert_eq!(read.annotator_id, "anna");
        assert_eq!(read.len(), 1);

        // Writing with the timestamp we just got back succeeds.
        store
            .write("doc1", "anna", &sample_doc("anna"), Some(ts))
            .unwrap();

        store.delete("doc1", "anna").unwrap();
        assert!(!store.exists("doc1", "anna"));
        // Idempotent delete.
        store.delete("doc1", "anna").unwrap();
    }

    #[test]
    fn json_store_detects_concurrent_modification() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = JsonDirectoryStore::new(dir.path());

        store.write("doc1", "anna", &sample_doc("anna"), None).unwrap();
        let stale = store.timestamp("doc1", "anna").unwrap() - chrono::Duration::seconds(5);

        let result = store.write("doc1", "anna", &sample_doc("anna"), Some(stale));
        assert!(matches!(
            result,
            Err(ConcordError::ConcurrentModification { .. })
        ));
    }
}
