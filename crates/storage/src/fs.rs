//! File-backed store.
//!
//! Layout under the store root:
//!
//! ```text
//! {root}/{kind}/{id}.json   one pretty-printed record per file
//! {root}/{kind}/index       record ids of this kind, one per line, insertion order
//! {root}/events.jsonl       lifecycle journal, one sealed event per line
//! {root}/.lock              advisory lock held by writers
//! ```
//!
//! Record files are replaced with write-temp-then-rename, so a reader sees
//! either the old or the new document, never a partial one. The index line
//! is appended before the record file is first written: an index entry
//! without a file is skipped on listing, whereas a file without an index
//! entry would be invisible.
//!
//! Every write holds an exclusive `flock` on `{root}/.lock` from the read
//! of the current state to the last rename, so handles in different
//! processes serialise the same way tasks sharing one handle do. The
//! journal tail is re-read under that lock on each append.
//!
//! `commit` appends the journal line first and writes the record second.
//! If the record write fails the journal is truncated back to where it
//! was, so neither half of a failed commit is left behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::event::{LifecycleEvent, GENESIS_HASH};
use crate::id::is_valid_id;
use crate::record::{Record, RecordKind};
use crate::traits::{check_expected, RecordStore};

const JOURNAL_FILE: &str = "events.jsonl";
const INDEX_FILE: &str = "index";
const LOCK_FILE: &str = ".lock";

/// Seal of the last intact journal line and where that line ends.
struct JournalTail {
    seq: u64,
    hash: String,
    /// Byte length of the journal up to and including the last intact line.
    intact_len: u64,
    /// Byte length of the journal file; larger than `intact_len` after a
    /// torn append.
    file_len: u64,
}

/// Exclusive hold on the store. Dropping it closes the lock file, which
/// releases the `flock`.
struct StoreLock<'a> {
    _file: std::fs::File,
    _local: tokio::sync::MutexGuard<'a, ()>,
}

pub struct FileStore {
    root: PathBuf,
    /// Queues tasks of this handle so at most one thread blocks on the
    /// file lock at a time.
    local: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        for kind in RecordKind::ALL {
            let dir = root.join(kind.as_str());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::io(&dir, e))?;
        }
        tracing::debug!(root = %root.display(), "opened file store");
        Ok(FileStore {
            root,
            local: tokio::sync::Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document for `id` of `kind`.
    pub fn record_path(&self, kind: RecordKind, id: &str) -> PathBuf {
        self.root.join(kind.as_str()).join(format!("{}.json", id))
    }

    pub fn journal_path(&self) -> PathBuf {
        self.root.join(JOURNAL_FILE)
    }

    fn index_path(&self, kind: RecordKind) -> PathBuf {
        self.root.join(kind.as_str()).join(INDEX_FILE)
    }

    fn check_id(id: &str) -> Result<(), StorageError> {
        if is_valid_id(id) {
            Ok(())
        } else {
            Err(StorageError::InvalidId { id: id.to_string() })
        }
    }

    /// Take the store-wide write lock, waiting for other handles and
    /// processes to release it.
    async fn lock(&self) -> Result<StoreLock<'_>, StorageError> {
        let local = self.local.lock().await;
        let path = self.root.join(LOCK_FILE);
        let lock_path = path.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("store lock task failed: {}", e)))?
        .map_err(|e| StorageError::io(&path, e))?;
        Ok(StoreLock {
            _file: file,
            _local: local,
        })
    }

    /// Locate and read the record stored under `id`, if any.
    async fn read_any(&self, id: &str) -> Result<Option<Record>, StorageError> {
        for kind in RecordKind::ALL {
            let path = self.record_path(kind, id);
            if let Some(record) = read_record(&path).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn read_index(&self, kind: RecordKind) -> Result<Vec<String>, StorageError> {
        let path = self.index_path(kind);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        let mut seen = HashSet::new();
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && is_valid_id(l))
            .filter(|l| seen.insert(l.to_string()))
            .map(str::to_string)
            .collect())
    }

    /// Write a stamped record, indexing it first if it is new. Caller
    /// holds the store lock.
    async fn write(&self, record: &Record, is_new: bool) -> Result<(), StorageError> {
        if is_new {
            append_line(&self.index_path(record.kind()), &record.id).await?;
        }
        write_record_atomic(&self.record_path(record.kind(), &record.id), record).await?;
        tracing::debug!(
            id = %record.id,
            kind = %record.kind(),
            version = record.version,
            "record written"
        );
        Ok(())
    }

    /// Read-check-write for the plain record writes. `expected_version`
    /// is checked as in `commit`; `None` skips the check (upsert).
    async fn put(
        &self,
        record: Record,
        expected_version: Option<Option<u64>>,
    ) -> Result<Record, StorageError> {
        Self::check_id(&record.id)?;
        let _lock = self.lock().await?;
        let existing = self.read_any(&record.id).await?;
        if let Some(expected_version) = expected_version {
            check_expected(&record.id, existing.as_ref(), expected_version)?;
        }
        let stamped = record.stamped(existing.as_ref())?;
        self.write(&stamped, existing.is_none()).await?;
        Ok(stamped)
    }

    /// Seal `event` onto the journal tail and append it. Caller holds the
    /// store lock. A torn final line left by a crash is cut off first.
    async fn append_sealed(
        &self,
        event: LifecycleEvent,
    ) -> Result<(LifecycleEvent, JournalTail), StorageError> {
        let path = self.journal_path();
        let tail = read_tail(&path).await?;
        if tail.file_len > tail.intact_len {
            tracing::warn!(
                path = %path.display(),
                bytes = tail.file_len - tail.intact_len,
                "cutting torn journal line before append"
            );
            truncate(&path, tail.intact_len).await?;
        }
        let sealed = event.seal(tail.seq + 1, &tail.hash);
        let line = serde_json::to_string(&sealed)
            .map_err(|e| StorageError::Backend(format!("event serialization: {}", e)))?;
        if let Err(e) = append_line(&path, &line).await {
            self.roll_back_journal(&path, tail.intact_len).await;
            return Err(e);
        }
        Ok((sealed, tail))
    }

    async fn roll_back_journal(&self, path: &Path, len: u64) {
        if let Err(e) = truncate(path, len).await {
            tracing::warn!(path = %path.display(), error = %e, "journal roll-back failed");
        }
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn create(&self, record: Record) -> Result<Record, StorageError> {
        self.put(record, Some(None)).await
    }

    async fn upsert(&self, record: Record) -> Result<Record, StorageError> {
        self.put(record, None).await
    }

    async fn update(&self, record: Record, expected_version: u64) -> Result<Record, StorageError> {
        self.put(record, Some(Some(expected_version))).await
    }

    async fn commit(
        &self,
        record: Record,
        expected_version: Option<u64>,
        event: LifecycleEvent,
    ) -> Result<(Record, LifecycleEvent), StorageError> {
        Self::check_id(&record.id)?;
        let _lock = self.lock().await?;
        let existing = self.read_any(&record.id).await?;
        check_expected(&record.id, existing.as_ref(), expected_version)?;
        let stamped = record.stamped(existing.as_ref())?;

        let (sealed, tail) = self.append_sealed(event).await?;
        if let Err(e) = self.write(&stamped, existing.is_none()).await {
            self.roll_back_journal(&self.journal_path(), tail.intact_len)
                .await;
            return Err(e);
        }
        Ok((stamped, sealed))
    }

    async fn get(&self, id: &str) -> Result<Record, StorageError> {
        if !is_valid_id(id) {
            return Err(StorageError::NotFound { id: id.to_string() });
        }
        self.read_any(id)
            .await?
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn list(
        &self,
        kind: RecordKind,
        owner_app_id: Option<&str>,
    ) -> Result<Vec<Record>, StorageError> {
        let mut out = Vec::new();
        for id in self.read_index(kind).await? {
            let Some(record) = read_record(&self.record_path(kind, &id)).await? else {
                continue;
            };
            if owner_app_id.map_or(true, |app| record.owner_app_id == app) {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        if !is_valid_id(id) {
            return Ok(false);
        }
        for kind in RecordKind::ALL {
            if tokio::fs::try_exists(self.record_path(kind, id))
                .await
                .map_err(|e| StorageError::io(&self.record_path(kind, id), e))?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn append_event(&self, event: LifecycleEvent) -> Result<LifecycleEvent, StorageError> {
        let _lock = self.lock().await?;
        let (sealed, _) = self.append_sealed(event).await?;
        Ok(sealed)
    }

    async fn events(&self, record_id: Option<&str>) -> Result<Vec<LifecycleEvent>, StorageError> {
        // Commits in flight finish before the journal is read.
        let _lock = self.lock().await?;
        let path = self.journal_path();
        let (events, _) = parse_journal(&path, &read_journal_text(&path).await?)?;
        Ok(events
            .into_iter()
            .filter(|e| record_id.map_or(true, |id| e.record_id == id))
            .collect())
    }
}

// ── File helpers ─────────────────────────────────────────────────────────────

async fn read_record(path: &Path) -> Result<Option<Record>, StorageError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

/// Write `record` to a sibling temp file, fsync it, then rename over `path`.
async fn write_record_atomic(path: &Path, record: &Record) -> Result<(), StorageError> {
    let mut body = serde_json::to_vec_pretty(record)
        .map_err(|e| StorageError::Backend(format!("record serialization: {}", e)))?;
    body.push(b'\n');

    let tmp = path.with_extension("json.tmp");
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    file.write_all(&body)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    drop(file);
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::io(path, e))
}

async fn append_line(path: &Path, line: &str) -> Result<(), StorageError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    file.write_all(&buf)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.sync_data().await.map_err(|e| StorageError::io(path, e))
}

async fn truncate(path: &Path, len: u64) -> Result<(), StorageError> {
    let file = match tokio::fs::OpenOptions::new().write(true).open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && len == 0 => return Ok(()),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    file.set_len(len)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.sync_data().await.map_err(|e| StorageError::io(path, e))
}

async fn read_journal_text(path: &Path) -> Result<String, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(c) => Ok(c),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

async fn read_tail(path: &Path) -> Result<JournalTail, StorageError> {
    let content = read_journal_text(path).await?;
    let (events, intact_len) = parse_journal(path, &content)?;
    let (seq, hash) = match events.last() {
        Some(last) => (last.seq, last.hash.clone()),
        None => (0, GENESIS_HASH.to_string()),
    };
    Ok(JournalTail {
        seq,
        hash,
        intact_len,
        file_len: content.len() as u64,
    })
}

/// Parse journal text into events plus the byte length of its intact
/// prefix. Only newline-terminated lines count. A final line that is
/// unterminated or does not parse is a torn append from a crash and is
/// skipped; a bad line anywhere else is corruption.
fn parse_journal(path: &Path, content: &str) -> Result<(Vec<LifecycleEvent>, u64), StorageError> {
    let mut events = Vec::new();
    let mut intact = 0usize;
    let mut offset = 0usize;
    let mut torn: Option<(usize, String)> = None;
    for (i, line) in content.split_inclusive('\n').enumerate() {
        offset += line.len();
        if line.trim().is_empty() {
            if torn.is_none() {
                intact = offset;
            }
            continue;
        }
        if let Some((n, message)) = torn.take() {
            return Err(StorageError::Corrupt {
                path: path.display().to_string(),
                message: format!("line {}: {}", n, message),
            });
        }
        match serde_json::from_str::<LifecycleEvent>(line) {
            Ok(ev) if line.ends_with('\n') => {
                events.push(ev);
                intact = offset;
            }
            Ok(_) => torn = Some((i + 1, "missing line terminator".to_string())),
            Err(e) => torn = Some((i + 1, e.to_string())),
        }
    }
    if let Some((n, message)) = torn {
        tracing::warn!(path = %path.display(), line = n, error = %message, "skipping torn journal line");
    }
    Ok((events, intact as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Agreement, AgreementStatus, RecordBody};
    use std::collections::BTreeMap;

    fn agreement(id: &str) -> Record {
        Record::new(
            id,
            "app-1",
            RecordBody::Agreement(Agreement {
                status: AgreementStatus::Created,
                agreement_type: "standard".to_string(),
                network: "testnet".to_string(),
                rpc_endpoint: "http://127.0.0.1:8545".to_string(),
                blockchain_tx: None,
                verified: false,
                testnet_connected: false,
                meta: BTreeMap::new(),
            }),
        )
    }

    #[tokio::test]
    async fn record_lands_at_kind_and_id_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.create(agreement("abc123")).await.unwrap();

        let path = dir.path().join("agreement").join("abc123.json");
        let text = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["id"], "abc123");
        assert_eq!(v["kind"], "agreement");
        assert_eq!(v["status"], "created");
    }

    #[tokio::test]
    async fn no_temp_file_left_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let r = store.create(agreement("a1")).await.unwrap();
        store.update(r, 0).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("agreement"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn stray_temp_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.create(agreement("a1")).await.unwrap();
        // Simulates a crash between temp write and rename.
        std::fs::write(dir.path().join("agreement").join("a1.json.tmp"), b"{\"id\": \"a1\", \"ki").unwrap();

        let r = store.get("a1").await.unwrap();
        assert_eq!(r.version, 0);
        assert_eq!(store.list(RecordKind::Agreement, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn index_entry_without_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.create(agreement("a1")).await.unwrap();
        std::fs::write(dir.path().join("agreement").join("index"), "a1\nghost\na1\n").unwrap();

        let listed = store.list(RecordKind::Agreement, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "a1");
    }

    #[tokio::test]
    async fn reopened_store_sees_records_and_journal() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.create(agreement("a1")).await.unwrap();
            store
                .append_event(LifecycleEvent::new("a1", RecordKind::Agreement, "create", None, "created"))
                .await
                .unwrap();
        }
        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.exists("a1").await.unwrap());
        let next = store
            .append_event(LifecycleEvent::new("a1", RecordKind::Agreement, "deploy", Some("created"), "deployed"))
            .await
            .unwrap();
        assert_eq!(next.seq, 2);
        let all = store.events(None).await.unwrap();
        assert_eq!(crate::event::verify_chain(&all), Ok(()));
    }

    #[tokio::test]
    async fn torn_final_journal_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store
            .append_event(LifecycleEvent::new("a1", RecordKind::Agreement, "create", None, "created"))
            .await
            .unwrap();
        let path = store.journal_path();
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"seq\":2,\"record_");
        std::fs::write(&path, content).unwrap();

        let events = store.events(None).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn append_after_torn_line_keeps_chain_intact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store
            .append_event(LifecycleEvent::new("a1", RecordKind::Agreement, "create", None, "created"))
            .await
            .unwrap();
        let path = store.journal_path();
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"seq\":2,\"record_");
        std::fs::write(&path, content).unwrap();

        let next = store
            .append_event(LifecycleEvent::new("a1", RecordKind::Agreement, "deploy", Some("created"), "deployed"))
            .await
            .unwrap();
        assert_eq!(next.seq, 2);
        let all = store.events(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(crate::event::verify_chain(&all), Ok(()));
    }

    fn deploy_event(id: &str) -> LifecycleEvent {
        LifecycleEvent::new(id, RecordKind::Agreement, "deploy", Some("created"), "deployed")
    }

    fn deployed(mut record: Record) -> Record {
        if let RecordBody::Agreement(a) = &mut record.body {
            a.status = AgreementStatus::Deployed;
        }
        record
    }

    #[tokio::test]
    async fn commit_writes_record_and_event_together() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let created = LifecycleEvent::new("a1", RecordKind::Agreement, "create", None, "created");
        let (r, ev) = store.commit(agreement("a1"), None, created).await.unwrap();
        assert_eq!((r.version, ev.seq), (0, 1));

        let (r, ev) = store
            .commit(deployed(r), Some(0), deploy_event("a1"))
            .await
            .unwrap();
        assert_eq!((r.version, ev.seq), (1, 2));
        assert_eq!(store.get("a1").await.unwrap(), r);
        assert_eq!(store.events(Some("a1")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_record_write_rolls_back_journal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let r = store.create(agreement("a1")).await.unwrap();
        let journal_before = std::fs::read(store.journal_path()).unwrap_or_default();
        // A directory where the temp file goes makes the record write fail
        // after the journal line is in.
        let blocker = dir.path().join("agreement").join("a1.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        let err = store
            .commit(deployed(r.clone()), Some(0), deploy_event("a1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert_eq!(store.get("a1").await.unwrap(), r);
        assert_eq!(std::fs::read(store.journal_path()).unwrap_or_default(), journal_before);

        std::fs::remove_dir(&blocker).unwrap();
        let (stored, ev) = store
            .commit(deployed(r), Some(0), deploy_event("a1"))
            .await
            .unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(ev.seq, 1);
    }

    #[tokio::test]
    async fn failed_journal_append_leaves_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let r = store.create(agreement("a1")).await.unwrap();
        std::fs::create_dir(store.journal_path()).unwrap();

        let err = store
            .commit(deployed(r.clone()), Some(0), deploy_event("a1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert_eq!(store.get("a1").await.unwrap(), r);

        std::fs::remove_dir(store.journal_path()).unwrap();
        let (stored, _) = store
            .commit(deployed(r), Some(0), deploy_event("a1"))
            .await
            .unwrap();
        assert_eq!(stored.status(), "deployed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_handles_on_one_root_serialise_writes() {
        let dir = tempfile::tempdir().unwrap();
        let a = std::sync::Arc::new(FileStore::open(dir.path()).await.unwrap());
        let b = std::sync::Arc::new(FileStore::open(dir.path()).await.unwrap());

        for round in 0..20 {
            let id = format!("a{}", round);
            let r = a.create(agreement(&id)).await.unwrap();
            let mut tasks = Vec::new();
            for store in [a.clone(), b.clone(), a.clone(), b.clone()] {
                let next = deployed(r.clone());
                let event = deploy_event(&id);
                tasks.push(tokio::spawn(async move {
                    store.commit(next, Some(0), event).await
                }));
            }
            let mut wins = 0;
            for t in tasks {
                match t.await.unwrap() {
                    Ok(_) => wins += 1,
                    Err(StorageError::VersionConflict { .. }) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            assert_eq!(wins, 1, "round {round}");
        }

        let all = b.events(None).await.unwrap();
        assert_eq!(all.len(), 20);
        assert_eq!(crate::event::verify_chain(&all), Ok(()));
    }

    #[tokio::test]
    async fn kind_of_an_id_cannot_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.create(agreement("a1")).await.unwrap();
        let proof = Record::new(
            "a1",
            "app-1",
            RecordBody::VerificationProof(crate::record::VerificationProof {
                status: crate::record::ProofStatus::Created,
                provider: "local".to_string(),
                subject_record_id: "d1".to_string(),
                proof_hash: "00".repeat(32),
                verified_at: None,
            }),
        );
        let err = store.upsert(proof).await.unwrap_err();
        assert!(matches!(err, StorageError::KindMismatch { .. }));
        assert_eq!(store.get("a1").await.unwrap().kind(), RecordKind::Agreement);
    }

    #[tokio::test]
    async fn path_traversal_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let err = store.create(agreement("../escape")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidId { .. }));
        assert!(matches!(
            store.get("../escape").await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
