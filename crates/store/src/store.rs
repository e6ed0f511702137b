use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::lines::{Document, KrLine, Line, render_goal};
use crate::model::{Goal, KeyResult, KrPatch, now_hhmm, rebalance_weights, today_key, validate_new};

/// File-backed store for the day's goal.
///
/// One markdown file per day under `<root>/todos/`; the lexicographically
/// greatest filename is the authoritative current goal.  Every mutation is
/// a whole-file read-modify-write, so callers must serialize mutations —
/// the runtime funnels them all through one controller task.
#[derive(Debug, Clone)]
pub struct GoalStore {
    dir: PathBuf,
}

impl GoalStore {
    /// `root` is the workspace directory; goal files live in `root/todos`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join("todos"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the most recent goal file: the greatest `*.md` filename in
    /// the todos directory.  Recomputed from the directory on every call so
    /// it is always consistent with the file system.
    pub fn find_current(&self) -> Result<Option<PathBuf>> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".md") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names.pop().map(|name| self.dir.join(name)))
    }

    /// Load the current goal.  Pure read: the file is not rewritten and
    /// weights are returned as stored.  A file with an objective but no
    /// checklist entries counts as no goal.
    pub fn load(&self) -> Result<Goal> {
        let path = self.current_or_not_found()?;
        let doc = self.read_document(&path)?;
        let goal = doc.goal(date_of(&path));
        if goal.key_results.is_empty() {
            return Err(StoreError::NotFound(self.dir.clone()));
        }
        Ok(goal)
    }

    /// Validate and write a brand-new goal for today, replacing any existing
    /// file for the same day.  Weights that already sum to 100 are kept;
    /// anything else is rebalanced.
    pub fn create(&self, objective: &str, mut key_results: Vec<KeyResult>) -> Result<Goal> {
        validate_new(objective, &key_results)?;
        let total: u32 = key_results.iter().map(|kr| u32::from(kr.weight)).sum();
        if total != 100 {
            rebalance_weights(&mut key_results);
        }
        let goal = Goal {
            date: today_key(),
            objective: objective.trim().to_string(),
            key_results,
        };
        let path = self.dir.join(format!("{}.md", goal.date));
        self.write_text(&path, &render_goal(&goal))?;
        tracing::info!(path = %path.display(), krs = goal.key_results.len(), "goal file created");
        Ok(goal)
    }

    /// Append a new key result after the last checklist line (or at end of
    /// file when none exist), then renumber and rebalance everything.
    pub fn add_kr(&self, content: &str) -> Result<Goal> {
        let path = self.current_or_not_found()?;
        let mut doc = self.read_document(&path)?;
        let insert_at = doc
            .lines
            .iter()
            .rposition(|line| matches!(line, Line::Kr(_)))
            .map(|idx| idx + 1)
            .unwrap_or(doc.lines.len());
        doc.lines.insert(insert_at, Line::Kr(KrLine::unchecked(content)));
        doc.renumber_and_rebalance();
        self.write_text(&path, &doc.render())?;
        Ok(doc.goal(date_of(&path)))
    }

    /// Overwrite the fields of the key result at `index` (0-based sequence
    /// position).  The one mutation that does not rebalance: the patch's
    /// weight is written as-is.  Completing without a stamp records the
    /// current time; un-completing clears it.
    pub fn update_kr(&self, index: usize, patch: KrPatch) -> Result<Goal> {
        let path = self.current_or_not_found()?;
        let mut doc = self.read_document(&path)?;
        let positions = doc.kr_positions();
        let pos = *positions
            .get(index)
            .ok_or(StoreError::OutOfRange { index, len: positions.len() })?;
        let completion_time = if patch.completed {
            patch.completion_time.or_else(|| Some(now_hhmm()))
        } else {
            None
        };
        if let Line::Kr(kr) = &mut doc.lines[pos] {
            kr.ordinal = index + 1;
            kr.content = patch.content;
            kr.weight = patch.weight;
            kr.completed = patch.completed;
            kr.completion_time = completion_time;
        }
        self.write_text(&path, &doc.render())?;
        Ok(doc.goal(date_of(&path)))
    }

    /// Remove the key result at `index`, then renumber and rebalance the
    /// remainder.  Removing the last entry leaves a valid file with the
    /// objective heading and no checklist lines.
    pub fn delete_kr(&self, index: usize) -> Result<Goal> {
        let path = self.current_or_not_found()?;
        let mut doc = self.read_document(&path)?;
        let positions = doc.kr_positions();
        let pos = *positions
            .get(index)
            .ok_or(StoreError::OutOfRange { index, len: positions.len() })?;
        doc.lines.remove(pos);
        doc.renumber_and_rebalance();
        self.write_text(&path, &doc.render())?;
        Ok(doc.goal(date_of(&path)))
    }

    /// Move the key result at `from` to position `to`.  Only which entry
    /// occupies which checklist slot changes; every non-checklist line keeps
    /// its exact position.  Renumbers and rebalances afterwards.
    pub fn reorder_kr(&self, from: usize, to: usize) -> Result<Goal> {
        let path = self.current_or_not_found()?;
        let mut doc = self.read_document(&path)?;
        let positions = doc.kr_positions();
        let len = positions.len();
        if from >= len {
            return Err(StoreError::OutOfRange { index: from, len });
        }
        if to >= len {
            return Err(StoreError::OutOfRange { index: to, len });
        }

        let mut entries: Vec<KrLine> = doc
            .lines
            .iter()
            .filter_map(|line| match line {
                Line::Kr(kr) => Some(kr.clone()),
                _ => None,
            })
            .collect();
        let moved = entries.remove(from);
        entries.insert(to, moved);
        for (slot, entry) in positions.iter().zip(entries) {
            doc.lines[*slot] = Line::Kr(entry);
        }

        doc.renumber_and_rebalance();
        self.write_text(&path, &doc.render())?;
        Ok(doc.goal(date_of(&path)))
    }

    /// Delete every goal file except the current one.  Best-effort: files
    /// that refuse to go are logged and skipped.  Returns how many were
    /// removed.
    pub fn prune_old(&self) -> Result<usize> {
        let Some(current) = self.find_current()? else {
            return Ok(0);
        };
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            if path == current || path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not prune old goal file");
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, kept = %current.display(), "pruned superseded goal files");
        }
        Ok(removed)
    }

    fn current_or_not_found(&self) -> Result<PathBuf> {
        self.find_current()?
            .ok_or_else(|| StoreError::NotFound(self.dir.clone()))
    }

    fn read_document(&self, path: &Path) -> Result<Document> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        Ok(Document::parse(&text))
    }

    /// Whole-file write through a `.tmp` sibling plus rename, so a crash
    /// mid-write never leaves a torn goal file.  The temp file is cleaned up
    /// on any error path.
    fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        use std::io::Write as _;

        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let tmp = path.with_extension("md.tmp");
        let write_result = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(text.as_bytes())?;
            // Sync before rename so the rename never exposes a short file.
            file.sync_all()
        });
        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(&tmp, err));
        }
        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(path, err));
        }
        Ok(())
    }
}

fn date_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(today_key)
}
