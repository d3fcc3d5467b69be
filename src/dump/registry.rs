//! Job registry
//!
//! Process-wide presence tracking of in-flight jobs, keyed by operation kind
//! and request fingerprint. The registry only guards its own map: it is
//! never locked while an export is running.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fingerprint::Fingerprint;
use super::manifest::{ArtifactDescriptor, JobManifest};

/// Operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Export,
    Import,
}

impl OperationKind {
    /// Directory name under the cache root.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Export => "export",
            OperationKind::Import => "import",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed { archive: Option<PathBuf> },
    Failed(String),
}

/// Shared view of one job: its status and manifest.
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    fingerprint: Fingerprint,
    submitted_at: DateTime<Local>,
    status: Mutex<JobStatus>,
    manifest: Mutex<JobManifest>,
}

impl JobHandle {
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint,
            submitted_at: Local::now(),
            status: Mutex::new(JobStatus::Running),
            manifest: Mutex::new(JobManifest::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn submitted_at(&self) -> DateTime<Local> {
        self.submitted_at
    }

    pub fn status(&self) -> JobStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status(), JobStatus::Failed(_))
    }

    pub fn set_status(&self, status: JobStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Append an artifact entry in completion order.
    pub fn record(&self, entry: ArtifactDescriptor) {
        self.manifest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of the manifest.
    pub fn manifest(&self) -> JobManifest {
        self.manifest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub type ManifestHandle = Arc<JobHandle>;

/// At-most-one job per fingerprint, discoverable across callers.
///
/// Implementations must make `try_acquire` atomic.
pub trait JobRegistry: Send + Sync {
    /// Register a job unless one is already running.
    ///
    /// Returns the handle and `true` when an entry for the key was already
    /// present and still running. A failed entry is replaced, so a fresh
    /// submission retries it.
    fn try_acquire(&self, op: OperationKind, fingerprint: &Fingerprint) -> (ManifestHandle, bool);

    /// Remove the entry for `fingerprint` if it still belongs to job `id`.
    ///
    /// An absent key, or one already taken over by a newer job, is left
    /// untouched.
    fn release(&self, op: OperationKind, fingerprint: &Fingerprint, id: Uuid);

    fn get(&self, op: OperationKind, fingerprint: &Fingerprint) -> Option<ManifestHandle>;

    /// All entries of one operation kind, oldest first.
    fn list(&self, op: OperationKind) -> Vec<ManifestHandle>;
}

/// [`JobRegistry`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: Mutex<HashMap<OperationKind, HashMap<Fingerprint, ManifestHandle>>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn try_acquire(&self, op: OperationKind, fingerprint: &Fingerprint) -> (ManifestHandle, bool) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = jobs.entry(op).or_default();

        if let Some(existing) = entries.get(fingerprint)
            && !existing.is_failed()
        {
            return (existing.clone(), true);
        }

        let handle = Arc::new(JobHandle::new(fingerprint.clone()));
        entries.insert(fingerprint.clone(), handle.clone());
        (handle, false)
    }

    fn release(&self, op: OperationKind, fingerprint: &Fingerprint, id: Uuid) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = jobs.get_mut(&op)
            && entries.get(fingerprint).is_some_and(|h| h.id() == id)
        {
            entries.remove(fingerprint);
        }
    }

    fn get(&self, op: OperationKind, fingerprint: &Fingerprint) -> Option<ManifestHandle> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&op).and_then(|entries| entries.get(fingerprint).cloned())
    }

    fn list(&self, op: OperationKind) -> Vec<ManifestHandle> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut handles: Vec<ManifestHandle> = jobs
            .get(&op)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default();
        handles.sort_by_key(|h| h.submitted_at());
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::request::{ConnectionParams, DumpRequest};

    fn fp(table: &str) -> Fingerprint {
        let conn = ConnectionParams::from_address("localhost", "root", "", "utf8", "shop");
        Fingerprint::of(&DumpRequest::new(conn, vec![table.to_string()]))
    }

    #[test]
    fn test_acquire_then_duplicate() {
        let registry = InMemoryJobRegistry::new();
        let key = fp("users");

        let (first, running) = registry.try_acquire(OperationKind::Export, &key);
        assert!(!running);
        let (second, running) = registry.try_acquire(OperationKind::Export, &key);
        assert!(running);
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn test_operation_kinds_are_separate() {
        let registry = InMemoryJobRegistry::new();
        let key = fp("users");
        registry.try_acquire(OperationKind::Export, &key);
        let (_, running) = registry.try_acquire(OperationKind::Import, &key);
        assert!(!running);
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = InMemoryJobRegistry::new();
        let key = fp("users");
        registry.release(OperationKind::Export, &key, Uuid::new_v4());

        let (handle, _) = registry.try_acquire(OperationKind::Export, &key);
        registry.release(OperationKind::Export, &key, handle.id());
        registry.release(OperationKind::Export, &key, handle.id());
        assert!(registry.get(OperationKind::Export, &key).is_none());

        let (_, running) = registry.try_acquire(OperationKind::Export, &key);
        assert!(!running);
    }

    #[test]
    fn test_failed_entry_is_visible_then_replaced() {
        let registry = InMemoryJobRegistry::new();
        let key = fp("users");
        let (handle, _) = registry.try_acquire(OperationKind::Export, &key);
        handle.set_status(JobStatus::Failed("archive failed".into()));

        let polled = registry.get(OperationKind::Export, &key).unwrap();
        assert_eq!(polled.status(), JobStatus::Failed("archive failed".into()));

        let (retry, running) = registry.try_acquire(OperationKind::Export, &key);
        assert!(!running);
        assert_ne!(retry.id(), handle.id());
        assert_eq!(retry.status(), JobStatus::Running);
    }

    #[test]
    fn test_stale_release_keeps_newer_job() {
        let registry = InMemoryJobRegistry::new();
        let key = fp("users");

        let (first, _) = registry.try_acquire(OperationKind::Export, &key);
        first.set_status(JobStatus::Failed("client went away".into()));
        let (second, running) = registry.try_acquire(OperationKind::Export, &key);
        assert!(!running);

        // the first job's cleanup arrives after the takeover
        registry.release(OperationKind::Export, &key, first.id());

        let current = registry.get(OperationKind::Export, &key).unwrap();
        assert_eq!(current.id(), second.id());
        let (third, running) = registry.try_acquire(OperationKind::Export, &key);
        assert!(running);
        assert_eq!(third.id(), second.id());
    }

    #[test]
    fn test_list_by_operation() {
        let registry = InMemoryJobRegistry::new();
        registry.try_acquire(OperationKind::Export, &fp("users"));
        registry.try_acquire(OperationKind::Export, &fp("orders"));
        registry.try_acquire(OperationKind::Import, &fp("items"));
        assert_eq!(registry.list(OperationKind::Export).len(), 2);
        assert_eq!(registry.list(OperationKind::Import).len(), 1);
    }

    #[test]
    fn test_concurrent_acquire_admits_exactly_one() {
        let registry = Arc::new(InMemoryJobRegistry::new());
        let key = fp("users");

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let key = key.clone();
                std::thread::spawn(move || !registry.try_acquire(OperationKind::Export, &key).1)
            })
            .collect();

        let admitted = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 1);
    }
}
