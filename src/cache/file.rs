//! File Store Module
//!
//! Disk-persisted cache engine. Each entry lives in its own file named by a
//! SHA-256 of the key; writes go through a temp file and an atomic rename.
//! A small `_metadata.json` records aggregate size so stats are available
//! without enumerating the directory.
//!
//! Tag deletion and key listing read every entry file, so they cost O(n) in
//! the number of stored entries.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::cache::backend::{compile_pattern, filter_keys};
use crate::cache::{
    CacheBackend, CacheEntry, CacheEvent, CacheStats, CacheValue, Clock, EventCallback,
    EventHooks, Expiry, PendingEvents, StoreOptions, TagSet,
};
use crate::error::{CacheError, Result};
use crate::tasks::{Sweep, Sweeper};

const BACKEND_NAME: &str = "file";
const ENTRY_EXTENSION: &str = "entry";

/// Name of the aggregate metadata file inside the cache directory.
pub const METADATA_FILE: &str = "_metadata.json";

// == On-disk Records ==
/// Contents of one entry file. The key is kept alongside the entry because
/// file names are hashes.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    entry: CacheEntry,
}

#[derive(Debug, Serialize, Deserialize)]
struct DirectoryMetadata {
    current_size: usize,
    total_bytes: u64,
    last_updated: DateTime<Utc>,
}

/// Result of reading one entry file. Corrupt and missing stay distinct here
/// even though both surface as a miss.
enum ReadOutcome {
    Missing,
    Corrupt(CacheError),
    Found(StoredEntry),
}

// == File State ==
#[derive(Debug)]
struct FileState {
    /// `current_size` is the entry file count
    stats: CacheStats,
    total_bytes: u64,
    seq: u64,
}

impl FileState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn set_totals(&mut self, files: usize, bytes: u64) {
        self.total_bytes = bytes;
        self.stats.set_current_size(files, bytes as usize);
    }

    fn track_added(&mut self, bytes: u64) {
        let files = self.stats.current_size + 1;
        self.set_totals(files, self.total_bytes + bytes);
    }

    fn track_removed(&mut self, bytes: u64) {
        let files = self.stats.current_size.saturating_sub(1);
        self.set_totals(files, self.total_bytes.saturating_sub(bytes));
    }

    fn track_resized(&mut self, old: u64, new: u64) {
        let files = self.stats.current_size;
        self.set_totals(files, self.total_bytes.saturating_sub(old) + new);
    }
}

// == File Core ==
struct FileCore {
    dir: PathBuf,
    state: Mutex<FileState>,
    max_files: usize,
    default_ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    hooks: EventHooks,
}

impl FileCore {
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{digest:x}.{ENTRY_EXTENSION}"))
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    fn read_entry(path: &Path) -> ReadOutcome {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<StoredEntry>(&bytes) {
                Ok(stored) => ReadOutcome::Found(stored),
                Err(err) => ReadOutcome::Corrupt(err.into()),
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => ReadOutcome::Missing,
            Err(err) => ReadOutcome::Corrupt(err.into()),
        }
    }

    /// Serializes and atomically writes an entry; returns the bytes written.
    fn write_entry(&self, path: &Path, stored: &StoredEntry) -> Result<u64> {
        let bytes = serde_json::to_vec(stored)?;
        atomic_write(&self.dir, path, &bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Deletes one entry file and updates the totals. I/O failures are
    /// logged and reported as `false`.
    fn remove_file(&self, state: &mut FileState, path: &Path) -> bool {
        let len = file_len(path);
        match fs::remove_file(path) {
            Ok(()) => {
                state.track_removed(len);
                true
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to remove cache entry file");
                false
            }
        }
    }

    fn discard_corrupt(&self, state: &mut FileState, path: &Path, err: &CacheError) {
        warn!(path = %path.display(), error = %err, "Discarding unreadable cache entry");
        self.remove_file(state, path);
    }

    fn entry_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for item in fs::read_dir(&self.dir)? {
            let path = item?.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) && path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Every entry file with its decoded contents.
    fn scan(&self) -> Vec<(PathBuf, ReadOutcome)> {
        match self.entry_files() {
            Ok(files) => files
                .into_iter()
                .map(|path| {
                    let outcome = Self::read_entry(&path);
                    (path, outcome)
                })
                .collect(),
            Err(err) => {
                warn!(dir = %self.dir.display(), error = %err, "Failed to list cache directory");
                Vec::new()
            }
        }
    }

    fn read_metadata(&self) -> Option<DirectoryMetadata> {
        let bytes = fs::read(self.metadata_path()).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(meta) => Some(meta),
            Err(err) => {
                warn!(error = %err, "Ignoring unreadable cache metadata file");
                None
            }
        }
    }

    fn write_metadata(&self, state: &FileState) {
        let meta = DirectoryMetadata {
            current_size: state.stats.current_size,
            total_bytes: state.total_bytes,
            last_updated: self.clock.now(),
        };
        let result = serde_json::to_vec_pretty(&meta)
            .map_err(CacheError::from)
            .and_then(|bytes| Ok(atomic_write(&self.dir, &self.metadata_path(), &bytes)?));
        if let Err(err) = result {
            warn!(error = %err, "Failed to write cache metadata file");
        }
    }

    /// Counts entry files and their sizes on disk.
    fn measure(&self) -> io::Result<(usize, u64)> {
        let files = self.entry_files()?;
        let bytes = files.iter().map(|path| file_len(path)).sum();
        Ok((files.len(), bytes))
    }

    /// Deletes the oldest entry files (by modification time) beyond
    /// `max_files`, never touching `keep`.
    fn enforce_max_files(&self, state: &mut FileState, keep: &Path, events: &mut PendingEvents) {
        if state.stats.current_size <= self.max_files {
            return;
        }

        let files = match self.entry_files() {
            Ok(files) => files,
            Err(err) => {
                warn!(error = %err, "Failed to list cache directory for capacity check");
                return;
            }
        };

        let on_disk: u64 = files.iter().map(|path| file_len(path)).sum();
        state.set_totals(files.len(), on_disk);
        if files.len() <= self.max_files {
            return;
        }

        let excess = files.len() - self.max_files;
        let mut candidates: Vec<(PathBuf, SystemTime)> = files
            .into_iter()
            .filter(|path| path != keep)
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (path, modified)
            })
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        for (path, _) in candidates.into_iter().take(excess) {
            let key = match Self::read_entry(&path) {
                ReadOutcome::Found(stored) => stored.key,
                _ => file_stem(&path),
            };
            if self.remove_file(state, &path) {
                state.stats.record_eviction();
                debug!(key = %key, "Evicted oldest cache file");
                events.push(CacheEvent::Evict, key);
            }
        }
    }
}

impl Sweep for FileCore {
    fn label(&self) -> &'static str {
        BACKEND_NAME
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut events = PendingEvents::new();

        let removed = {
            let mut state = self.state.lock();
            let mut removed = 0;
            for (path, outcome) in self.scan() {
                match outcome {
                    ReadOutcome::Found(stored) if stored.entry.is_expired(now) => {
                        if self.remove_file(&mut state, &path) {
                            state.stats.record_expiration();
                            events.push(CacheEvent::Expire, stored.key);
                            removed += 1;
                        }
                    }
                    ReadOutcome::Corrupt(err) => self.discard_corrupt(&mut state, &path, &err),
                    _ => {}
                }
            }
            if removed > 0 {
                self.write_metadata(&state);
            }
            removed
        };

        self.hooks.dispatch(events);
        removed
    }
}

// == File Store ==
/// Disk-persisted cache storage with the same contract as
/// [`MemoryStore`](crate::cache::MemoryStore).
///
/// I/O is synchronous and may block on disk.
pub struct FileStore {
    core: Arc<FileCore>,
    sweeper: Option<Sweeper>,
}

impl FileStore {
    // == Constructor ==
    /// Opens (creating if needed) a cache directory.
    ///
    /// `options.max_size` caps the number of entry files; the eviction
    /// policy is not used, the oldest files are pruned instead.
    pub fn open(dir: impl Into<PathBuf>, options: StoreOptions) -> Result<Self> {
        let dir = dir.into();
        if dir.exists() && !dir.is_dir() {
            return Err(CacheError::InvalidConfig(format!(
                "cache path {} is not a directory",
                dir.display()
            )));
        }
        fs::create_dir_all(&dir)?;

        let mut core = FileCore {
            dir,
            state: Mutex::new(FileState {
                stats: CacheStats::new(options.max_size),
                total_bytes: 0,
                seq: 0,
            }),
            max_files: options.max_size,
            default_ttl: options.default_ttl,
            clock: options.clock,
            hooks: EventHooks::new(BACKEND_NAME),
        };

        // The metadata file is only trusted when its count matches the
        // directory; a crash between an entry write and a metadata write
        // leaves it behind.
        let listed = core.entry_files()?.len();
        let (files, bytes) = match core.read_metadata() {
            Some(meta) if meta.current_size == listed => (meta.current_size, meta.total_bytes),
            Some(meta) => {
                warn!(
                    recorded = meta.current_size,
                    listed,
                    "Cache metadata out of date, rescanning directory"
                );
                core.measure()?
            }
            None => core.measure()?,
        };
        core.state.get_mut().set_totals(files, bytes);

        let core = Arc::new(core);
        core.write_metadata(&core.state.lock());
        let sweeper = Sweeper::spawn(core.clone(), options.cleanup_interval);

        info!(
            dir = %core.dir.display(),
            entries = files,
            max_files = core.max_files,
            "File cache store opened"
        );

        Ok(Self { core, sweeper })
    }

    pub fn dir(&self) -> &Path {
        &self.core.dir
    }

    /// Path of the file that holds (or would hold) `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.core.entry_path(key)
    }

    pub fn len(&self) -> usize {
        self.core.state.lock().stats.current_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops the background sweep and waits for it; idempotent.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.shutdown().await;
        }
    }
}

impl CacheBackend for FileStore {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        let core = &self.core;
        let now = core.clock.now();
        let path = core.entry_path(key);
        let mut events = PendingEvents::new();

        let value = {
            let mut state = core.state.lock();
            match FileCore::read_entry(&path) {
                ReadOutcome::Found(mut stored) if stored.key == key => {
                    if stored.entry.is_expired(now) {
                        state.stats.record_miss();
                        events.push(CacheEvent::Miss, key);
                        if core.remove_file(&mut state, &path) {
                            state.stats.record_expiration();
                            events.push(CacheEvent::Expire, key);
                        }
                        core.write_metadata(&state);
                        None
                    } else {
                        let seq = state.next_seq();
                        let value = stored.entry.touch(now, seq).clone();
                        let old_len = file_len(&path);
                        match core.write_entry(&path, &stored) {
                            Ok(new_len) => {
                                state.track_resized(old_len, new_len);
                                if new_len != old_len {
                                    core.write_metadata(&state);
                                }
                            }
                            Err(err) => {
                                warn!(key, error = %err, "Failed to persist access metadata")
                            }
                        }
                        state.stats.record_hit();
                        events.push(CacheEvent::Hit, key);
                        Some(value)
                    }
                }
                ReadOutcome::Corrupt(err) => {
                    core.discard_corrupt(&mut state, &path, &err);
                    core.write_metadata(&state);
                    state.stats.record_miss();
                    events.push(CacheEvent::Miss, key);
                    None
                }
                ReadOutcome::Found(_) | ReadOutcome::Missing => {
                    state.stats.record_miss();
                    events.push(CacheEvent::Miss, key);
                    None
                }
            }
        };

        core.hooks.dispatch(events);
        value
    }

    fn set(&self, key: &str, value: CacheValue, expiry: Expiry, tags: TagSet) -> Result<()> {
        let core = &self.core;
        if core.max_files == 0 {
            return Err(CacheError::CacheFull(format!(
                "file store has no capacity for '{key}'"
            )));
        }

        let now = core.clock.now();
        let ttl = expiry.resolve(core.default_ttl);
        let path = core.entry_path(key);
        let mut events = PendingEvents::new();

        {
            let mut state = core.state.lock();
            let existed = path.exists();
            let old_len = file_len(&path);
            if let ReadOutcome::Found(old) = FileCore::read_entry(&path) {
                if old.key == key && old.entry.is_expired(now) {
                    state.stats.record_expiration();
                    events.push(CacheEvent::Expire, key);
                }
            }

            let seq = state.next_seq();
            let stored = StoredEntry {
                key: key.to_string(),
                entry: CacheEntry::new(value, ttl, tags, now, seq),
            };
            let new_len = core.write_entry(&path, &stored)?;

            state.stats.record_set();
            events.push(CacheEvent::Set, key);

            if existed {
                state.track_resized(old_len, new_len);
            } else {
                state.track_added(new_len);
                core.enforce_max_files(&mut state, &path, &mut events);
            }
            core.write_metadata(&state);
        }

        core.hooks.dispatch(events);
        Ok(())
    }

    fn delete(&self, key: &str) -> bool {
        let core = &self.core;
        let path = core.entry_path(key);
        let mut events = PendingEvents::new();

        let removed = {
            let mut state = core.state.lock();
            let removed = core.remove_file(&mut state, &path);
            if removed {
                state.stats.record_delete();
                events.push(CacheEvent::Delete, key);
                core.write_metadata(&state);
            }
            removed
        };

        core.hooks.dispatch(events);
        removed
    }

    fn clear(&self) {
        let core = &self.core;
        {
            let mut state = core.state.lock();
            let files = core.entry_files().unwrap_or_else(|err| {
                warn!(error = %err, "Failed to list cache directory for clear");
                Vec::new()
            });
            for path in files {
                core.remove_file(&mut state, &path);
            }
            match core.measure() {
                Ok((files, bytes)) => state.set_totals(files, bytes),
                Err(_) => state.set_totals(0, 0),
            }
            core.write_metadata(&state);
        }
        debug!(dir = %core.dir.display(), "File cache cleared");

        let mut events = PendingEvents::new();
        events.push_keyless(CacheEvent::Clear);
        core.hooks.dispatch(events);
    }

    fn exists(&self, key: &str) -> bool {
        let core = &self.core;
        let now = core.clock.now();
        let path = core.entry_path(key);
        let mut events = PendingEvents::new();

        let live = {
            let mut state = core.state.lock();
            match FileCore::read_entry(&path) {
                ReadOutcome::Found(stored) if stored.key == key => {
                    if stored.entry.is_expired(now) {
                        if core.remove_file(&mut state, &path) {
                            state.stats.record_expiration();
                            events.push(CacheEvent::Expire, key);
                            core.write_metadata(&state);
                        }
                        false
                    } else {
                        true
                    }
                }
                ReadOutcome::Corrupt(err) => {
                    core.discard_corrupt(&mut state, &path, &err);
                    core.write_metadata(&state);
                    false
                }
                ReadOutcome::Found(_) | ReadOutcome::Missing => false,
            }
        };

        core.hooks.dispatch(events);
        live
    }

    fn delete_by_tags(&self, tags: &TagSet) -> usize {
        let core = &self.core;
        let mut events = PendingEvents::new();

        let removed = {
            let mut state = core.state.lock();
            let mut removed = 0;
            for (path, outcome) in core.scan() {
                match outcome {
                    ReadOutcome::Found(stored) if stored.entry.has_any_tag(tags) => {
                        if core.remove_file(&mut state, &path) {
                            state.stats.record_delete();
                            events.push(CacheEvent::Delete, stored.key);
                            removed += 1;
                        }
                    }
                    ReadOutcome::Corrupt(err) => core.discard_corrupt(&mut state, &path, &err),
                    _ => {}
                }
            }
            core.write_metadata(&state);
            removed
        };

        debug!(?tags, removed, "Deleted file entries by tag");
        core.hooks.dispatch(events);
        removed
    }

    fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let pattern = compile_pattern(pattern)?;
        let now = self.core.clock.now();

        let live: Vec<String> = {
            let _state = self.core.state.lock();
            self.core
                .scan()
                .into_iter()
                .filter_map(|(_, outcome)| match outcome {
                    ReadOutcome::Found(stored) if !stored.entry.is_expired(now) => Some(stored.key),
                    _ => None,
                })
                .collect()
        };

        Ok(filter_keys(live, pattern.as_ref()))
    }

    fn stats(&self) -> CacheStats {
        self.core.state.lock().stats.clone()
    }

    fn reset_stats(&self) {
        self.core.state.lock().stats.reset();
    }

    fn discount_stats(&self, counted: &CacheStats) {
        self.core.state.lock().stats.discount(counted);
    }

    fn purge_expired(&self) -> usize {
        self.core.purge_expired()
    }

    fn on(&self, event: CacheEvent, callback: EventCallback) {
        self.core.hooks.register(event, callback);
    }

    fn sweeper(&self) -> Option<&Sweeper> {
        self.sweeper.as_ref()
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.core.dir)
            .field("max_files", &self.core.max_files)
            .field("default_ttl", &self.core.default_ttl)
            .field("sweeper", &self.sweeper)
            .finish()
    }
}

// == Utility Functions ==
/// Writes `bytes` to a temp file in `dir`, then renames it over `target`, so
/// a crash mid-write never leaves a partial live file.
fn atomic_write(dir: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|err| err.error)?;
    Ok(())
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
