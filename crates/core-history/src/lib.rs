//! Command history core: a readers-writer-locked dynamic array plus an
//! optional id-indexed hashtable, with crash-safe newline-delimited-JSON
//! on-disk persistence.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("command length exceeds maximum")]
    BufferOverflow,
    #[error("invalid parameter: empty command")]
    InvalidParameter,
    #[error("history store is at capacity")]
    MaxEntries,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, HistoryError>;

/// Soft-delete lifecycle state. `Deleted` entries stay in the backing `Vec`
/// (ids and positional indices remain stable) but are unlinked from the
/// active doubly-linked traversal order and excluded from `iter_active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEntryState {
    Active,
    Deleted,
    Corrupted,
}

impl Default for HistoryEntryState {
    fn default() -> Self {
        HistoryEntryState::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    #[serde(rename = "cmd")]
    pub command: String,
    #[serde(rename = "ts")]
    pub timestamp: u64,
    #[serde(rename = "exit")]
    pub exit_code: i32,
    /// Soft-delete state. Not persisted: a reload always starts every entry
    /// `Active` and re-threads the list in file order.
    #[serde(skip)]
    pub state: HistoryEntryState,
    /// Index of the previous entry in insertion order, `None` at the head.
    #[serde(skip)]
    pub prev: Option<usize>,
    /// Index of the next entry in insertion order, `None` at the tail.
    #[serde(skip)]
    pub next: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryConfig {
    pub max_entries: usize,
    pub max_command_len: usize,
    pub ignore_space_prefix: bool,
    pub enable_id_index: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
            max_command_len: 64 * 1024,
            ignore_space_prefix: true,
            enable_id_index: true,
        }
    }
}

/// Plain snapshot of the lock-free telemetry counters, returned by `stats()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryStats {
    pub add_count: u64,
    pub add_micros: u64,
    pub retrieve_count: u64,
    pub retrieve_micros: u64,
}

/// `AtomicU64`-backed counters, incremented under only the reader lock (or
/// no lock at all) so read operations never contend with each other.
#[derive(Debug, Default)]
struct AtomicStats {
    add_count: AtomicU64,
    add_micros: AtomicU64,
    retrieve_count: AtomicU64,
    retrieve_micros: AtomicU64,
}

impl AtomicStats {
    fn snapshot(&self) -> HistoryStats {
        HistoryStats {
            add_count: self.add_count.load(Ordering::Relaxed),
            add_micros: self.add_micros.load(Ordering::Relaxed),
            retrieve_count: self.retrieve_count.load(Ordering::Relaxed),
            retrieve_micros: self.retrieve_micros.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    entries: Vec<HistoryEntry>,
    id_index: Option<HashMap<u64, usize>>,
    capacity_cap: usize,
    next_id: u64,
    head: Option<usize>,
    tail: Option<usize>,
}

/// Readers-writer-locked history store. Mutating operations hold the writer
/// lock for the full duration of the mutation; reads hold the reader lock
/// for their entire visit and bump only lock-free atomic counters.
pub struct HistoryCore {
    config: HistoryConfig,
    inner: RwLock<Inner>,
    stats: AtomicStats,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl HistoryCore {
    pub fn new(config: HistoryConfig) -> Self {
        let id_index = if config.enable_id_index {
            Some(HashMap::new())
        } else {
            None
        };
        Self {
            config,
            inner: RwLock::new(Inner {
                entries: Vec::new(),
                id_index,
                capacity_cap: 64.min(config.max_entries.max(1)),
                next_id: 1,
                head: None,
                tail: None,
            }),
            stats: AtomicStats::default(),
        }
    }

    /// Append a new entry. Returns `Ok(None)` on a silent no-op (space-prefix
    /// suppression), `Ok(Some(id))` on success.
    pub fn add(&self, command: &str, exit_code: i32) -> Result<Option<u64>> {
        let start = Instant::now();
        if self.config.ignore_space_prefix && command.starts_with(' ') {
            return Ok(None);
        }
        if command.is_empty() {
            return Err(HistoryError::InvalidParameter);
        }
        if command.len() > self.config.max_command_len {
            return Err(HistoryError::BufferOverflow);
        }

        let mut inner = self.inner.write();
        if inner.entries.len() >= inner.capacity_cap {
            if inner.capacity_cap >= self.config.max_entries {
                return Err(HistoryError::MaxEntries);
            }
            inner.capacity_cap = (inner.capacity_cap * 2).min(self.config.max_entries);
        }
        if inner.entries.len() >= self.config.max_entries {
            return Err(HistoryError::MaxEntries);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let index = inner.entries.len();
        let prev = inner.tail;
        let entry = HistoryEntry {
            id,
            command: command.to_string(),
            timestamp: now_secs(),
            exit_code,
            state: HistoryEntryState::Active,
            prev,
            next: None,
        };
        if let Some(p) = prev {
            inner.entries[p].next = Some(index);
        }
        inner.entries.push(entry);
        inner.tail = Some(index);
        if inner.head.is_none() {
            inner.head = Some(index);
        }
        if let Some(idx) = &mut inner.id_index {
            idx.insert(id, index);
        }
        self.stats.add_count.fetch_add(1, Ordering::Relaxed);
        self.stats
            .add_micros
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        Ok(Some(id))
    }

    /// O(1) positional lookup.
    pub fn get_by_index(&self, index: usize) -> Option<HistoryEntry> {
        let start = Instant::now();
        let inner_r = self.inner.read();
        let result = inner_r.entries.get(index).cloned();
        drop(inner_r);
        self.stats.retrieve_count.fetch_add(1, Ordering::Relaxed);
        self.stats
            .retrieve_micros
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        result
    }

    /// O(1) when the id hashtable is enabled, else an O(N) linear scan.
    pub fn get_by_id(&self, id: u64) -> Option<HistoryEntry> {
        let start = Instant::now();
        let inner_r = self.inner.read();
        let result = if let Some(idx) = &inner_r.id_index {
            idx.get(&id).and_then(|&i| inner_r.entries.get(i)).cloned()
        } else {
            inner_r.entries.iter().find(|e| e.id == id).cloned()
        };
        drop(inner_r);
        self.stats.retrieve_count.fetch_add(1, Ordering::Relaxed);
        self.stats
            .retrieve_micros
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        result
    }

    /// Soft-delete: marks the entry `Deleted` and unlinks it from the active
    /// doubly-linked traversal order. The entry keeps its id and position so
    /// `get_by_id`/`get_by_index` can still return it for inspection. A
    /// missing or already-deleted id is a silent no-op.
    pub fn delete(&self, id: u64) -> Result<()> {
        let mut inner = self.inner.write();
        let index = match &inner.id_index {
            Some(idx) => idx.get(&id).copied(),
            None => inner.entries.iter().position(|e| e.id == id),
        };
        let Some(index) = index else {
            return Ok(());
        };
        if inner.entries[index].state != HistoryEntryState::Active {
            return Ok(());
        }
        let prev = inner.entries[index].prev;
        let next = inner.entries[index].next;
        match prev {
            Some(p) => inner.entries[p].next = next,
            None => inner.head = next,
        }
        match next {
            Some(n) => inner.entries[n].prev = prev,
            None => inner.tail = prev,
        }
        inner.entries[index].state = HistoryEntryState::Deleted;
        Ok(())
    }

    /// Walk the active doubly-linked list from head to tail, skipping
    /// soft-deleted entries.
    pub fn iter_active(&self) -> Vec<HistoryEntry> {
        let inner = self.inner.read();
        let mut out = Vec::new();
        let mut cursor = inner.head;
        while let Some(i) = cursor {
            let entry = &inner.entries[i];
            if entry.state == HistoryEntryState::Active {
                out.push(entry.clone());
            }
            cursor = entry.next;
        }
        out
    }

    pub fn count(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        if let Some(idx) = &mut inner.id_index {
            idx.clear();
        }
        inner.capacity_cap = 64.min(self.config.max_entries.max(1));
        inner.head = None;
        inner.tail = None;
    }

    pub fn stats(&self) -> HistoryStats {
        self.stats.snapshot()
    }

    /// Crash-safe append-only newline-delimited-JSON persistence. Opens with
    /// `append(true)` so a crash mid-write corrupts at most the trailing
    /// line.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let inner = self.inner.read();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        for entry in &inner.entries {
            let line = serde_json::to_string(entry).expect("HistoryEntry always serializes");
            writeln!(file, "{line}")?;
        }
        file.flush()?;
        Ok(())
    }

    pub fn append_entry_to_file(&self, path: impl AsRef<Path>, entry: &HistoryEntry) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let line = serde_json::to_string(entry).expect("HistoryEntry always serializes");
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// Load entries from a newline-delimited-JSON file. A line that fails to
    /// parse is logged and skipped (treated as a truncated trailing write)
    /// rather than aborting the whole load.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut inner = self.inner.write();
        inner.entries.clear();
        if let Some(idx) = &mut inner.id_index {
            idx.clear();
        }
        let mut max_id = 1u64;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(mut entry) => {
                    max_id = max_id.max(entry.id + 1);
                    let index = inner.entries.len();
                    entry.state = HistoryEntryState::Active;
                    entry.prev = if index == 0 { None } else { Some(index - 1) };
                    entry.next = None;
                    if let Some(p) = entry.prev {
                        inner.entries[p].next = Some(index);
                    }
                    if let Some(idx) = &mut inner.id_index {
                        idx.insert(entry.id, index);
                    }
                    inner.entries.push(entry);
                }
                Err(err) => {
                    tracing::warn!(target: "lle.history", %err, "skipping corrupt history line");
                }
            }
        }
        inner.next_id = max_id;
        inner.capacity_cap = inner
            .entries
            .len()
            .next_power_of_two()
            .max(64)
            .min(self.config.max_entries.max(1));
        inner.head = if inner.entries.is_empty() { None } else { Some(0) };
        inner.tail = if inner.entries.is_empty() {
            None
        } else {
            Some(inner.entries.len() - 1)
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> HistoryConfig {
        HistoryConfig {
            max_entries: 4,
            max_command_len: 16,
            ignore_space_prefix: true,
            enable_id_index: true,
        }
    }

    #[test]
    fn add_and_retrieve() {
        let hc = HistoryCore::new(HistoryConfig::default());
        let id = hc.add("ls -la", 0).unwrap().unwrap();
        assert_eq!(hc.count(), 1);
        let entry = hc.get_by_id(id).unwrap();
        assert_eq!(entry.command, "ls -la");
        let by_index = hc.get_by_index(0).unwrap();
        assert_eq!(by_index.id, id);
    }

    #[test]
    fn space_prefix_is_silent_noop() {
        let hc = HistoryCore::new(HistoryConfig::default());
        let result = hc.add(" secret", 0).unwrap();
        assert_eq!(result, None);
        assert_eq!(hc.count(), 0);
    }

    #[test]
    fn empty_command_is_invalid() {
        let hc = HistoryCore::new(HistoryConfig::default());
        assert!(matches!(hc.add("", 0), Err(HistoryError::InvalidParameter)));
    }

    #[test]
    fn oversized_command_overflows() {
        let hc = HistoryCore::new(small_config());
        let long = "x".repeat(32);
        assert!(matches!(
            hc.add(&long, 0),
            Err(HistoryError::BufferOverflow)
        ));
    }

    #[test]
    fn capacity_cap_enforced() {
        let hc = HistoryCore::new(small_config());
        for i in 0..4 {
            hc.add(&format!("cmd{i}"), 0).unwrap();
        }
        assert!(matches!(hc.add("cmd4", 0), Err(HistoryError::MaxEntries)));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let hc = HistoryCore::new(HistoryConfig::default());
        hc.add("git status", 0).unwrap();
        hc.add("cargo build", 1).unwrap();
        hc.save_file(&path).unwrap();

        let hc2 = HistoryCore::new(HistoryConfig::default());
        hc2.load_file(&path).unwrap();
        assert_eq!(hc2.count(), 2);
        assert_eq!(hc2.get_by_index(0).unwrap().command, "git status");
        assert_eq!(hc2.get_by_index(1).unwrap().exit_code, 1);
    }

    #[test]
    fn load_skips_corrupt_trailing_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        std::fs::write(
            &path,
            "{\"id\":0,\"cmd\":\"ok\",\"ts\":1,\"exit\":0}\n{\"id\":1,\"cmd\":\"broke", // truncated
        )
        .unwrap();
        let hc = HistoryCore::new(HistoryConfig::default());
        hc.load_file(&path).unwrap();
        assert_eq!(hc.count(), 1);
        assert_eq!(hc.get_by_index(0).unwrap().command, "ok");
    }

    #[test]
    fn clear_resets_store() {
        let hc = HistoryCore::new(HistoryConfig::default());
        hc.add("a", 0).unwrap();
        hc.clear();
        assert_eq!(hc.count(), 0);
    }

    #[test]
    fn soft_delete_unlinks_from_active_traversal() {
        let hc = HistoryCore::new(HistoryConfig::default());
        let id_a = hc.add("a", 0).unwrap().unwrap();
        let id_b = hc.add("b", 0).unwrap().unwrap();
        let id_c = hc.add("c", 0).unwrap().unwrap();
        hc.delete(id_b).unwrap();

        let active: Vec<String> = hc.iter_active().into_iter().map(|e| e.command).collect();
        assert_eq!(active, vec!["a".to_string(), "c".to_string()]);
        // count() reflects total successful adds regardless of soft-deletes.
        assert_eq!(hc.count(), 3);
        assert_eq!(hc.get_by_id(id_b).unwrap().state, HistoryEntryState::Deleted);
        assert_eq!(hc.get_by_id(id_a).unwrap().state, HistoryEntryState::Active);
        assert_eq!(hc.get_by_id(id_c).unwrap().state, HistoryEntryState::Active);
    }

    #[test]
    fn deleting_unknown_id_is_a_noop() {
        let hc = HistoryCore::new(HistoryConfig::default());
        hc.add("a", 0).unwrap();
        assert!(hc.delete(9999).is_ok());
        assert_eq!(hc.iter_active().len(), 1);
    }

    #[test]
    fn stats_track_adds_and_retrieves() {
        let hc = HistoryCore::new(HistoryConfig::default());
        hc.add("a", 0).unwrap();
        hc.get_by_index(0);
        hc.get_by_id(1);
        let stats = hc.stats();
        assert_eq!(stats.add_count, 1);
        assert_eq!(stats.retrieve_count, 2);
    }
}
