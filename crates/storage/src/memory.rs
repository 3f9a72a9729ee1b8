use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::CaseRecord;
use crate::traits::CaseStore;

/// A `CaseStore` backed by an in-memory map.
///
/// Populated once at startup (typically from a directory of case files)
/// and read-only afterwards, so concurrent readers need no locking.
#[derive(Debug, Clone, Default)]
pub struct MemoryCaseStore {
    cases: BTreeMap<String, CaseRecord>,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the record it replaced (if any).
    pub fn insert(&mut self, record: CaseRecord) -> Option<CaseRecord> {
        self.cases.insert(record.case_id.clone(), record)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Load every `*.json` file in `dir` as a single case record.
    ///
    /// Files are read in file-name order. A case identifier appearing in
    /// two files is an error rather than a silent overwrite.
    pub fn load_dir(dir: &Path) -> Result<Self, StorageError> {
        let mut store = Self::new();
        store.extend_from_dir(dir)?;
        Ok(store)
    }

    /// Load the case files of `dir` into an existing store.
    pub fn extend_from_dir(&mut self, dir: &Path) -> Result<usize, StorageError> {
        let entries = std::fs::read_dir(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let record = read_case_file(path)?;
            if self.cases.contains_key(&record.case_id) {
                return Err(StorageError::DuplicateCase {
                    case_id: record.case_id,
                    path: path.clone(),
                });
            }
            tracing::debug!(case_id = %record.case_id, path = %path.display(), "loaded case");
            self.insert(record);
        }

        Ok(paths.len())
    }
}

impl FromIterator<CaseRecord> for MemoryCaseStore {
    fn from_iter<I: IntoIterator<Item = CaseRecord>>(iter: I) -> Self {
        let mut store = Self::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

/// Read and decode one case file.
pub(crate) fn read_case_file(path: &Path) -> Result<CaseRecord, StorageError> {
    let content = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| StorageError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn get_case(&self, case_id: &str) -> Result<CaseRecord, StorageError> {
        self.cases
            .get(case_id)
            .cloned()
            .ok_or_else(|| StorageError::CaseNotFound {
                case_id: case_id.to_string(),
            })
    }

    async fn list_case_ids(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.cases.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn record(case_id: &str) -> CaseRecord {
        CaseRecord {
            case_id: case_id.to_string(),
            amount: Decimal::new(10000, 2),
            assigned_dca: "CollectCorp".to_string(),
            status: "open".to_string(),
            ledger: vec![],
        }
    }

    fn write_case(dir: &Path, file: &str, case_id: &str) {
        let json = serde_json::to_string(&record(case_id)).unwrap();
        std::fs::write(dir.join(file), json).unwrap();
    }

    #[tokio::test]
    async fn get_case_returns_stored_record() {
        let store: MemoryCaseStore = vec![record("A"), record("B")].into_iter().collect();
        let fetched = store.get_case("B").await.unwrap();
        assert_eq!(fetched.case_id, "B");
    }

    #[tokio::test]
    async fn missing_case_is_not_found() {
        let store = MemoryCaseStore::new();
        let err = store.get_case("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::CaseNotFound { case_id } if case_id == "nope"));
    }

    #[tokio::test]
    async fn list_case_ids_is_sorted() {
        let store: MemoryCaseStore = vec![record("Z"), record("A"), record("M")]
            .into_iter()
            .collect();
        assert_eq!(store.list_case_ids().await.unwrap(), vec!["A", "M", "Z"]);
    }

    #[test]
    fn insert_replaces_existing_record() {
        let mut store = MemoryCaseStore::new();
        assert!(store.insert(record("A")).is_none());
        assert!(store.insert(record("A")).is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn load_dir_reads_json_files_only() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path(), "a.json", "CASE-A");
        write_case(dir.path(), "b.json", "CASE-B");
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = MemoryCaseStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get_case("CASE-A").await.is_ok());
    }

    #[test]
    fn load_dir_rejects_duplicate_case_ids() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path(), "a.json", "SAME");
        write_case(dir.path(), "b.json", "SAME");

        let err = MemoryCaseStore::load_dir(dir.path()).unwrap_err();
        match err {
            StorageError::DuplicateCase { case_id, path } => {
                assert_eq!(case_id, "SAME");
                assert!(path.ends_with("b.json"));
            }
            other => panic!("expected DuplicateCase, got {other:?}"),
        }
    }

    #[test]
    fn load_dir_reports_decode_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let err = MemoryCaseStore::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, StorageError::Decode { .. }));
    }

    #[test]
    fn load_dir_missing_directory_is_io_error() {
        let err = MemoryCaseStore::load_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
