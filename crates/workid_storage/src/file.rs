//! Journaled file backend for persistent storage.

use crate::backend::KvBackend;
use crate::error::{StorageError, StorageResult};
use crate::journal::{decode_all, encode_frame};
use crate::keyspace::{Keyspace, Mutation};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// File names within the data directory.
const JOURNAL_FILE: &str = "journal.wjl";
const JOURNAL_TEMP: &str = "journal.wjl.tmp";
const LOCK_FILE: &str = "LOCK";

/// A journaled, file-based key-value backend.
///
/// All keys are served from memory. Every mutation is appended to a
/// journal file before it becomes visible, and the journal is replayed
/// when the backend is opened, so data survives process restarts.
///
/// ```text
/// <dir>/
/// ├─ LOCK              # Advisory lock for single-process access
/// └─ journal.wjl       # Append-only mutation journal
/// ```
///
/// # Durability
///
/// - With `sync_on_write` (the default) every mutation is fsynced before
///   the call returns.
/// - Without it, writes reach the OS on return and [`KvBackend::sync`]
///   makes them durable.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
/// A single lock orders journal appends with in-memory application.
///
/// # Example
///
/// ```no_run
/// use workid_storage::{FileBackend, KvBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("data")).unwrap();
/// backend.set("record:AB12", b"{}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    state: RwLock<FileState>,
    sync_on_write: bool,
    _lock_file: File,
}

#[derive(Debug)]
struct FileState {
    space: Keyspace,
    journal: File,
    journal_len: u64,
    /// Set when a failed append could not be cut back off the journal.
    wedged: bool,
}

/// What an append needs from the journal file.
trait JournalFile: Write {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync_data(&mut self) -> io::Result<()>;
}

impl JournalFile for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }
}

fn write_frame<J: JournalFile>(journal: &mut J, frame: &[u8], sync: bool) -> io::Result<()> {
    journal.write_all(frame)?;
    journal.flush()?;
    if sync {
        journal.sync_data()?;
    }
    Ok(())
}

/// Appends `frame` after the first `valid_len` bytes of `journal`.
///
/// On failure the journal is cut back to `valid_len`, so a mutation that
/// was reported as failed never reappears on replay. If the cut itself
/// fails the journal holds an unknown tail and `Corrupted` is returned.
fn append_frame<J: JournalFile>(
    journal: &mut J,
    valid_len: u64,
    frame: &[u8],
    sync: bool,
) -> StorageResult<()> {
    let Err(err) = write_frame(journal, frame, sync) else {
        return Ok(());
    };
    if let Err(cut) = journal.truncate_to(valid_len) {
        error!(valid_len, error = %err, truncate_error = %cut, "failed journal append could not be removed");
        return Err(StorageError::Corrupted(format!(
            "journal append failed ({err}) and could not be truncated back to {valid_len} bytes ({cut})"
        )));
    }
    warn!(valid_len, error = %err, "journal append failed, tail removed");
    Err(err.into())
}

impl FileBackend {
    /// Opens or creates a backend in the directory `dir`.
    ///
    /// The directory is created if needed, an exclusive lock is taken and
    /// the journal is replayed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process holds the lock (`Locked`)
    /// - The journal is corrupted (`Corrupted`)
    /// - I/O errors occur
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let journal_path = dir.join(JOURNAL_FILE);
        let mut journal = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&journal_path)?;

        let mut image = Vec::new();
        journal.read_to_end(&mut image)?;
        let replay = decode_all(&image)?;

        if replay.truncated_tail {
            warn!(
                path = %journal_path.display(),
                valid_len = replay.valid_len,
                file_len = image.len(),
                "dropping incomplete journal tail"
            );
            journal.set_len(replay.valid_len)?;
            journal.sync_all()?;
        }

        let mut space = Keyspace::default();
        let replayed = replay.mutations.len();
        for mutation in replay.mutations {
            space.apply(mutation);
        }
        info!(
            path = %dir.display(),
            entries = replayed,
            keys = space.len(),
            "opened file backend"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            state: RwLock::new(FileState {
                space,
                journal,
                journal_len: replay.valid_len,
                wedged: false,
            }),
            sync_on_write: true,
            _lock_file: lock_file,
        })
    }

    /// Sets whether every mutation is fsynced before returning.
    #[must_use]
    pub fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Returns the data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the current journal size in bytes.
    #[must_use]
    pub fn journal_len(&self) -> u64 {
        self.state.read().journal_len
    }

    /// Rewrites the journal as a minimal snapshot of the live keys.
    ///
    /// The snapshot is written to a temporary file, synced, and renamed
    /// over the journal, so a crash leaves either the old or the new file.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or renaming the snapshot fails.
    pub fn compact(&self) -> StorageResult<()> {
        let mut state = self.state.write();
        let before = state.journal_len;

        let temp_path = self.dir.join(JOURNAL_TEMP);
        let mut image = Vec::new();
        for mutation in state.space.snapshot() {
            image.extend(encode_frame(&mutation)?);
        }
        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(&image)?;
            temp.sync_all()?;
        }

        let journal_path = self.dir.join(JOURNAL_FILE);
        fs::rename(&temp_path, &journal_path)?;
        state.journal = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&journal_path)?;
        state.journal_len = image.len() as u64;
        state.wedged = false;

        info!(
            path = %self.dir.display(),
            before,
            after = state.journal_len,
            "compacted journal"
        );
        Ok(())
    }

    /// Journals `mutation` and applies it to the key space.
    ///
    /// Once an append has left an unremovable tail, every later mutation
    /// is refused until [`FileBackend::compact`] rewrites the journal.
    fn commit(&self, state: &mut FileState, mutation: Mutation) -> StorageResult<()> {
        if state.wedged {
            return Err(StorageError::Corrupted(
                "journal has an unremovable tail from a failed append; compact or reopen".to_string(),
            ));
        }
        let frame = encode_frame(&mutation)?;
        let valid_len = state.journal_len;
        if let Err(err) = append_frame(&mut state.journal, valid_len, &frame, self.sync_on_write) {
            state.wedged = matches!(err, StorageError::Corrupted(_));
            return Err(err);
        }
        state.journal_len += frame.len() as u64;
        debug!(bytes = frame.len(), "journaled mutation");
        state.space.apply(mutation);
        Ok(())
    }

    fn commit_planned(&self, state: &mut FileState, planned: Option<Mutation>) -> StorageResult<bool> {
        match planned {
            Some(mutation) => {
                self.commit(state, mutation)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.state.read().space.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let mut state = self.state.write();
        let mutation = state.space.plan_set(key, value)?;
        self.commit(&mut state, mutation)
    }

    fn set_if_absent(&self, key: &str, value: &[u8]) -> StorageResult<bool> {
        let mut state = self.state.write();
        let planned = state.space.plan_set_if_absent(key, value);
        self.commit_planned(&mut state, planned)
    }

    fn compare_and_set(&self, key: &str, expected: &[u8], value: &[u8]) -> StorageResult<bool> {
        let mut state = self.state.write();
        let planned = state.space.plan_compare_and_set(key, expected, value)?;
        self.commit_planned(&mut state, planned)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut state = self.state.write();
        let planned = state.space.plan_delete(key);
        self.commit_planned(&mut state, planned)
    }

    fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self.state.read().space.scan_prefix(prefix))
    }

    fn set_add(&self, key: &str, member: &str) -> StorageResult<bool> {
        let mut state = self.state.write();
        let planned = state.space.plan_set_add(key, member)?;
        self.commit_planned(&mut state, planned)
    }

    fn set_remove(&self, key: &str, member: &str) -> StorageResult<bool> {
        let mut state = self.state.write();
        let planned = state.space.plan_set_remove(key, member)?;
        self.commit_planned(&mut state, planned)
    }

    fn set_members(&self, key: &str) -> StorageResult<Vec<String>> {
        self.state.read().space.members(key)
    }

    fn incr(&self, key: &str) -> StorageResult<i64> {
        let mut state = self.state.write();
        let (mutation, next) = state.space.plan_incr(key)?;
        self.commit(&mut state, mutation)?;
        Ok(next)
    }

    fn sync(&self) -> StorageResult<()> {
        let state = self.state.write();
        state.journal.sync_all()?;
        Ok(())
    }
}
