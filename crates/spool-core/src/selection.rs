//! File selection over a torrent manifest with directory grouping.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::FileEntry;

/// Tri-state rendering of a checkbox that covers several files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    /// Every covered file is selected.
    Checked,
    /// No covered file is selected.
    Unchecked,
    /// Some, but not all, covered files are selected.
    Indeterminate,
}

impl CheckState {
    const fn from_counts(selected: usize, total: usize) -> Self {
        if total > 0 && selected == total {
            Self::Checked
        } else if selected == 0 {
            Self::Unchecked
        } else {
            Self::Indeterminate
        }
    }
}

/// Files sharing the same directory path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryGroup {
    /// Directory path; empty for the torrent root.
    pub path: String,
    /// Files in manifest order.
    pub files: Vec<FileEntry>,
    /// Number of selected files in the group.
    pub selected: usize,
    /// Group checkbox state.
    pub state: CheckState,
    /// Whether the group is expanded in the file list.
    pub expanded: bool,
}

/// Set of manifest files the user wants materialised.
///
/// The selection is always a subset of the manifest ids and starts with every
/// file selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSelection {
    manifest: Vec<FileEntry>,
    ids: BTreeSet<u32>,
    selected: BTreeSet<u32>,
    expansion: BTreeMap<String, bool>,
}

impl FileSelection {
    /// Selection over `manifest` with every file selected.
    #[must_use]
    pub fn new(manifest: Vec<FileEntry>) -> Self {
        let ids: BTreeSet<u32> = manifest.iter().map(|file| file.id).collect();
        Self {
            selected: ids.clone(),
            ids,
            manifest,
            expansion: BTreeMap::new(),
        }
    }

    /// Replace the manifest and select everything again.
    pub fn reset(&mut self, manifest: Vec<FileEntry>) {
        *self = Self::new(manifest);
    }

    /// Whether `manifest` has the same ids as the current one.
    #[must_use]
    pub fn same_manifest(&self, manifest: &[FileEntry]) -> bool {
        manifest.len() == self.manifest.len()
            && manifest.iter().all(|file| self.ids.contains(&file.id))
    }

    /// Files of the current manifest.
    #[must_use]
    pub fn manifest(&self) -> &[FileEntry] {
        &self.manifest
    }

    /// Flip a single file; ids outside the manifest are ignored.
    pub fn toggle_file(&mut self, id: u32) {
        if !self.ids.contains(&id) {
            return;
        }
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    /// Add or remove every file of one directory, leaving other files alone.
    pub fn toggle_directory(&mut self, path: &str, selected: bool) {
        let members = self
            .manifest
            .iter()
            .filter(|file| file.directory() == path)
            .map(|file| file.id);
        if selected {
            self.selected.extend(members);
        } else {
            for id in members {
                self.selected.remove(&id);
            }
        }
    }

    /// Select or clear every file.
    pub fn toggle_all(&mut self, selected: bool) {
        if selected {
            self.selected.clone_from(&self.ids);
        } else {
            self.selected.clear();
        }
    }

    /// State of the "select all" checkbox.
    #[must_use]
    pub fn select_all_state(&self) -> CheckState {
        CheckState::from_counts(self.selected.len(), self.manifest.len())
    }

    /// Directory groups sorted by path, files kept in manifest order.
    #[must_use]
    pub fn groups(&self) -> Vec<DirectoryGroup> {
        let mut grouped: BTreeMap<&str, Vec<FileEntry>> = BTreeMap::new();
        for file in &self.manifest {
            grouped
                .entry(file.directory())
                .or_default()
                .push(file.clone());
        }
        grouped
            .into_iter()
            .map(|(path, files)| {
                let selected = files
                    .iter()
                    .filter(|file| self.selected.contains(&file.id))
                    .count();
                DirectoryGroup {
                    path: path.to_string(),
                    state: CheckState::from_counts(selected, files.len()),
                    expanded: self.is_expanded(path),
                    selected,
                    files,
                }
            })
            .collect()
    }

    /// Whether a directory is expanded; directories start expanded.
    #[must_use]
    pub fn is_expanded(&self, path: &str) -> bool {
        self.expansion.get(path).copied().unwrap_or(true)
    }

    /// Collapse an expanded directory or expand a collapsed one.
    pub fn toggle_expansion(&mut self, path: &str) {
        let next = !self.is_expanded(path);
        self.expansion.insert(path.to_string(), next);
    }

    /// Whether `id` is selected.
    #[must_use]
    pub fn is_selected(&self, id: u32) -> bool {
        self.selected.contains(&id)
    }

    /// Selected ids in ascending order.
    #[must_use]
    pub const fn selected_ids(&self) -> &BTreeSet<u32> {
        &self.selected
    }

    /// Number of selected files.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Number of files in the manifest.
    #[must_use]
    pub fn total(&self) -> usize {
        self.manifest.len()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Ids to send to the engine, or `None` when the selection means "all files".
    ///
    /// Only a narrowed, non-empty selection is explicit.
    #[must_use]
    pub fn explicit_selection(&self) -> Option<Vec<u32>> {
        let count = self.selected.len();
        (count > 0 && count < self.manifest.len()).then(|| self.selected.iter().copied().collect())
    }

    /// `"{selected} / {total}"` label for the file list header.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} / {}", self.selected.len(), self.manifest.len())
    }
}
