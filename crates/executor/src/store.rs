use models::{Submission, SubmissionStatus};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory submission records, kept for status queries after execution.
///
/// Writes go through the single executor that owns a submission; everyone
/// else gets cloned snapshots, so readers never observe a half-applied
/// transition.
pub struct SubmissionStore {
    records: RwLock<HashMap<Uuid, Submission>>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        SubmissionStore {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, submission: Submission) {
        if let Ok(mut records) = self.records.write() {
            records.insert(submission.id, submission);
        }
    }

    pub fn update(&self, id: Uuid, apply: impl FnOnce(&mut Submission)) {
        if let Ok(mut records) = self.records.write() {
            if let Some(submission) = records.get_mut(&id) {
                apply(submission);
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Submission> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.get(&id).cloned())
    }

    /// Page of submissions ordered by creation time (newest last).
    pub fn page(&self, page: usize, size: usize) -> Vec<Submission> {
        let mut all = self.all();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all.into_iter().skip(page * size).take(size).collect()
    }

    pub fn by_status(&self, status: SubmissionStatus) -> Vec<Submission> {
        self.all()
            .into_iter()
            .filter(|submission| submission.status == status)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn all(&self) -> Vec<Submission> {
        self.records
            .read()
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for SubmissionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::SubmissionRequest;
    use std::path::PathBuf;

    fn submission(language: &str) -> Submission {
        Submission::new(&SubmissionRequest {
            id: Uuid::new_v4(),
            language: language.to_string(),
            source_path: PathBuf::from("/tmp/sub/Main.cpp"),
            input_path: PathBuf::from("/tmp/sub/test.txt"),
        })
    }

    #[test]
    fn get_returns_snapshot_after_update() {
        let store = SubmissionStore::new();
        let record = submission("cpp");
        let id = record.id;
        store.insert(record);

        store.update(id, |s| s.transition(SubmissionStatus::Compiling));
        assert_eq!(store.get(id).unwrap().status, SubmissionStatus::Compiling);
    }

    #[test]
    fn paging_is_bounded_and_ordered() {
        let store = SubmissionStore::new();
        for _ in 0..5 {
            store.insert(submission("c"));
        }

        assert_eq!(store.page(0, 2).len(), 2);
        assert_eq!(store.page(2, 2).len(), 1);
        assert!(store.page(3, 2).is_empty());
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn filters_by_status() {
        let store = SubmissionStore::new();
        let record = submission("java");
        let id = record.id;
        store.insert(record);
        store.insert(submission("java"));

        store.update(id, |s| s.transition(SubmissionStatus::Completed));
        assert_eq!(store.by_status(SubmissionStatus::Completed).len(), 1);
        assert_eq!(store.by_status(SubmissionStatus::Pending).len(), 1);
    }
}
