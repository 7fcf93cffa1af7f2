//! The on-disk request journal: `requests.jsonl` plus its lock file.
//!
//! One request document per line. Every flush rewrites the whole file
//! through a same-directory temp file and a rename, so a crash never
//! leaves a half-written line behind. A sibling `.lock` file serializes
//! mutating processes on the same workspace; conditional checks (claim
//! CAS, version compare) run inside that scope.

use crate::memory::{RequestStore, RequestStoreError};
use chrono::Utc;
use docket_core::Request;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Handle on one requests journal path.
#[derive(Debug, Clone)]
pub struct RequestJournal {
    path: PathBuf,
}

impl RequestJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The lock file guarding this journal: `<path>.lock`.
    pub fn lock_path(&self) -> PathBuf {
        let mut raw: OsString = self.path.as_os_str().to_os_string();
        raw.push(".lock");
        PathBuf::from(raw)
    }

    /// Read every request document in file order.
    ///
    /// A missing journal is an empty one; workspaces start with no
    /// requests. The journal must be valid UTF-8 end to end — anything
    /// else is corruption and fails the whole read. Legacy status
    /// strings inside a line fold to `pending_review` through the
    /// document's lenient deserializer instead of poisoning the file.
    pub fn read(&self) -> Result<Vec<Request>, JournalError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(JournalError::io(&self.path, &err)),
        };
        let text = String::from_utf8(bytes).map_err(|_| JournalError::Encoding {
            path: self.path.display().to_string(),
        })?;

        let mut requests = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let request: Request =
                serde_json::from_str(line).map_err(|e| JournalError::Malformed {
                    line: index + 1,
                    message: e.to_string(),
                })?;
            requests.push(request);
        }
        Ok(requests)
    }

    /// Rewrite the journal to hold exactly `requests`.
    ///
    /// The new contents are serialized to a temp file next to the live
    /// one, fsynced, renamed over it, and the directory is fsynced, so
    /// readers only ever observe a complete journal.
    pub fn write(&self, requests: &[Request]) -> Result<(), JournalError> {
        let mut body = String::new();
        for request in requests {
            let line = serde_json::to_string(request)
                .map_err(|e| JournalError::Serialize(e.to_string()))?;
            body.push_str(&line);
            body.push('\n');
        }

        if let Some(parent) = self.parent_dir() {
            fs::create_dir_all(parent).map_err(|e| JournalError::io(parent, &e))?;
        }

        let tmp = self.tmp_path();
        let flushed = File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(body.as_bytes())?;
                file.sync_all()
            })
            .map_err(|e| JournalError::io(&tmp, &e));
        if let Err(err) = flushed {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(JournalError::io(&self.path, &err));
        }

        if let Some(parent) = self.parent_dir() {
            File::open(parent)
                .and_then(|dir| dir.sync_all())
                .map_err(|e| JournalError::io(parent, &e))?;
        }
        Ok(())
    }

    /// Run one lock-scoped mutation against the hydrated store.
    ///
    /// The mutator returns `(value, changed)`; the store is flushed
    /// back before the lock releases only when `changed` is set.
    pub fn mutate<T, E, F>(&self, mutator: F) -> Result<T, StoreMutationError<E>>
    where
        F: FnOnce(&mut RequestStore) -> Result<(T, bool), E>,
    {
        let _guard = JournalLock::acquire(self)?;

        let requests = self
            .read()
            .map_err(|e| StoreMutationError::Store(RequestStoreError::from(e)))?;
        let mut store = RequestStore::from_requests(requests);
        let (value, changed) = mutator(&mut store).map_err(StoreMutationError::Mutation)?;
        if changed {
            let snapshot: Vec<Request> = store.requests().cloned().collect();
            self.write(&snapshot)
                .map_err(|e| StoreMutationError::Store(RequestStoreError::from(e)))?;
        }
        Ok(value)
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
    }

    fn tmp_path(&self) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut raw: OsString = self.path.as_os_str().to_os_string();
        raw.push(format!(".tmp.{}.{unique}", std::process::id()));
        PathBuf::from(raw)
    }
}

/// Errors from journal reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal {path}: {message}")]
    Io { path: String, message: String },

    #[error("journal {path} is not valid UTF-8")]
    Encoding { path: String },

    #[error("journal line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("request does not serialize: {0}")]
    Serialize(String),
}

impl JournalError {
    fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Failure of one lock-scoped mutation. `Mutation` carries the caller's
/// own error through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreMutationError<E> {
    #[error("request journal lock busy: {lock_path}")]
    LockBusy { lock_path: String },

    #[error("failed to take journal lock {lock_path}: {message}")]
    LockIo { lock_path: String, message: String },

    #[error("{0}")]
    Store(RequestStoreError),

    #[error("{0}")]
    Mutation(E),
}

enum LockDenied {
    Busy { lock_path: String },
    Io { lock_path: String, message: String },
}

impl<E> From<LockDenied> for StoreMutationError<E> {
    fn from(denied: LockDenied) -> Self {
        match denied {
            LockDenied::Busy { lock_path } => Self::LockBusy { lock_path },
            LockDenied::Io { lock_path, message } => Self::LockIo { lock_path, message },
        }
    }
}

/// Exclusive hold on the journal's lock file; removed on drop.
struct JournalLock {
    lock_path: PathBuf,
    _file: File,
}

impl JournalLock {
    fn acquire(journal: &RequestJournal) -> Result<Self, LockDenied> {
        let lock_path = journal.lock_path();
        if let Some(parent) = journal.parent_dir() {
            fs::create_dir_all(parent).map_err(|e| LockDenied::Io {
                lock_path: lock_path.display().to_string(),
                message: e.to_string(),
            })?;
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                let _ = writeln!(
                    file,
                    "pid={}\nutc={}",
                    std::process::id(),
                    Utc::now().to_rfc3339()
                );
                Ok(Self {
                    lock_path,
                    _file: file,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Err(LockDenied::Busy {
                lock_path: lock_path.display().to_string(),
            }),
            Err(err) => Err(LockDenied::Io {
                lock_path: lock_path.display().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

impl Drop for JournalLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_request, temp_store_path};

    #[test]
    fn missing_journal_reads_empty() {
        let journal = RequestJournal::new(temp_store_path("journal-missing"));
        assert!(journal.read().expect("missing journal reads").is_empty());
    }

    #[test]
    fn write_replaces_previous_contents() {
        let journal = RequestJournal::new(temp_store_path("journal-replace"));
        journal
            .write(&[sample_request("req-1")])
            .expect("first write");
        journal
            .write(&[sample_request("req-2")])
            .expect("second write");

        let requests = journal.read().expect("journal reads");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "req-2");

        let _ = fs::remove_file(journal.path());
    }

    #[test]
    fn blank_lines_are_tolerated() {
        let journal = RequestJournal::new(temp_store_path("journal-blank"));
        let line =
            serde_json::to_string(&sample_request("req-1")).expect("request serializes");
        fs::write(journal.path(), format!("\n{line}\n\n")).expect("fixture writes");

        let requests = journal.read().expect("journal reads");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "req-1");

        let _ = fs::remove_file(journal.path());
    }

    #[test]
    fn non_utf8_journal_is_rejected() {
        let journal = RequestJournal::new(temp_store_path("journal-binary"));
        fs::write(journal.path(), b"{\"id\":\"req-1\"\xff\xfe}\n").expect("fixture writes");

        match journal.read() {
            Err(JournalError::Encoding { path }) => {
                assert!(path.ends_with("requests.jsonl"));
            }
            other => panic!("expected encoding rejection, got {other:?}"),
        }

        let _ = fs::remove_file(journal.path());
    }

    #[test]
    fn malformed_line_reports_its_position() {
        let journal = RequestJournal::new(temp_store_path("journal-malformed"));
        let line =
            serde_json::to_string(&sample_request("req-1")).expect("request serializes");
        fs::write(journal.path(), format!("{line}\nnot json\n")).expect("fixture writes");

        match journal.read() {
            Err(JournalError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed line error, got {other:?}"),
        }

        let _ = fs::remove_file(journal.path());
    }

    #[test]
    fn mutation_persists_only_when_changed() {
        let journal = RequestJournal::new(temp_store_path("journal-unchanged"));
        journal
            .write(&[sample_request("req-1")])
            .expect("journal seeds");
        let before = fs::read_to_string(journal.path()).expect("journal exists");

        let value: Result<usize, StoreMutationError<std::convert::Infallible>> =
            journal.mutate(|store| Ok((store.len(), false)));
        assert_eq!(value.expect("mutation succeeds"), 1);
        assert_eq!(
            fs::read_to_string(journal.path()).expect("journal exists"),
            before
        );

        let _ = fs::remove_file(journal.path());
    }

    #[test]
    fn busy_lock_rejects_the_mutation() {
        let journal = RequestJournal::new(temp_store_path("journal-lock"));
        journal
            .write(&[sample_request("req-1")])
            .expect("journal seeds");
        fs::write(journal.lock_path(), "busy\n").expect("lock should be created");

        let result: Result<(), StoreMutationError<std::convert::Infallible>> =
            journal.mutate(|_| Ok(((), false)));
        match result {
            Err(StoreMutationError::LockBusy { lock_path }) => {
                assert_eq!(lock_path, journal.lock_path().display().to_string());
            }
            other => panic!("expected lock busy error, got {other:?}"),
        }

        let _ = fs::remove_file(journal.lock_path());
        let _ = fs::remove_file(journal.path());
    }

    #[test]
    fn lock_is_released_after_mutation() {
        let journal = RequestJournal::new(temp_store_path("journal-release"));
        journal
            .write(&[sample_request("req-1")])
            .expect("journal seeds");

        let first: Result<(), StoreMutationError<std::convert::Infallible>> =
            journal.mutate(|_| Ok(((), false)));
        first.expect("first mutation succeeds");
        let second: Result<(), StoreMutationError<std::convert::Infallible>> =
            journal.mutate(|_| Ok(((), false)));
        second.expect("lock must be released between mutations");

        let _ = fs::remove_file(journal.path());
    }
}
