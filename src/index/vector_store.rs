//! Vector Index (C3): persistent `(id, CommandEntry, vector)` storage with
//! top-k cosine search.
//!
//! Storage is a JSON snapshot file (see DESIGN.md, Open Question 1) loaded
//! fully into memory on open and rewritten atomically — write to a sibling
//! temp file, then rename — on every mutating call, so persistence survives
//! process restart without requiring a background flush thread.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::index::embedding::normalize_l2;
use crate::types::CommandEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedEntry {
    entry: CommandEntry,
    /// L2-normalized copy of `entry.embedding`, cached so search doesn't
    /// renormalize on every call.
    normalized: Vec<f32>,
}

/// One scored hit. Orders by score descending, then entry name ascending,
/// so repeated queries over an unchanged index are byte-identical.
#[derive(Debug, Clone)]
struct ScoredHit {
    score: f32,
    name: String,
    index: usize,
}

impl PartialEq for ScoredHit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for ScoredHit {}

impl PartialOrd for ScoredHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredHit {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.score.partial_cmp(&self.score).unwrap_or(Ordering::Equal) {
            Ordering::Equal => self.name.cmp(&other.name),
            ord => ord,
        }
    }
}

pub struct VectorIndex {
    path: PathBuf,
    entries: Vec<IndexedEntry>,
}

impl VectorIndex {
    /// Opens (or creates, if absent) the snapshot at `path`.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            serde_json::from_str(&text)?
        } else {
            Vec::new()
        };
        Ok(Self { path, entries })
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Inserts or replaces entries by `name`; idempotent for identical
    /// content (re-embedding stable text yields the same vector, so an
    /// unchanged entry serializes to the same bytes on disk).
    pub fn upsert(&mut self, entries: Vec<CommandEntry>) -> anyhow::Result<()> {
        for entry in entries {
            let normalized = normalize_l2(&entry.embedding);
            if let Some(existing) = self.entries.iter_mut().find(|e| e.entry.name == entry.name) {
                existing.entry = entry;
                existing.normalized = normalized;
            } else {
                self.entries.push(IndexedEntry {
                    entry,
                    normalized,
                });
            }
        }
        self.flush()
    }

    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.entries.clear();
        self.flush()
    }

    /// Top-k cosine search above `threshold`, optionally restricted by a
    /// predicate over the candidate entry (used by semantic search to
    /// exclude `section = "org"` entries).
    pub fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        threshold: f32,
        filter: impl Fn(&CommandEntry) -> bool,
    ) -> Vec<(CommandEntry, f32)> {
        let query = normalize_l2(query_vector);
        let mut hits: Vec<ScoredHit> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| filter(&e.entry))
            .map(|(index, e)| ScoredHit {
                score: dot(&query, &e.normalized),
                name: e.entry.name.clone(),
                index,
            })
            .filter(|hit| hit.score >= threshold)
            .collect();
        hits.sort();
        hits.into_iter()
            .take(k)
            .map(|hit| (self.entries[hit.index].entry.clone(), hit.score))
            .collect()
    }

    fn flush(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
