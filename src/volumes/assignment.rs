//! Final volume numbers for a batch of detected folders

use super::duplicates::{DuplicateResolver, RejectedCandidate, VolumeCandidate};
use super::number::extract_volume_number_with_ancestors;
use crate::tree::{DirNode, EntryFilter};
use crate::types::VolumeAssignment;
use crate::utils::file_name_lossy;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Everything decided about one batch of volume folders
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssignmentPlan {
    /// Folders to import, sorted by volume number, numbers unique
    pub assignments: Vec<VolumeAssignment>,
    /// Resolved folders whose number is already in the library
    pub already_present: Vec<VolumeAssignment>,
    /// Folders without a number that could not be given one safely
    pub ambiguous: Vec<PathBuf>,
    /// Duplicate candidates that lost against another folder
    pub rejected: Vec<RejectedCandidate>,
}

/// Assigns volume numbers to detected folders
#[derive(Clone, Debug)]
pub struct VolumeAssigner {
    resolver: DuplicateResolver,
    filter: EntryFilter,
}

impl VolumeAssigner {
    /// Create an assigner
    pub fn new(resolver: DuplicateResolver, filter: EntryFilter) -> Self {
        Self { resolver, filter }
    }

    /// Decide the volume number of every folder in `folders`
    ///
    /// `tree` is the snapshot the folders were detected in; its root bounds the
    /// ancestor search. `existing` holds numbers already present in the library.
    ///
    /// Folders without a recognizable number are handled as follows: when no
    /// folder has one, all are numbered sequentially in name order; a single
    /// unnumbered folder next to numbered ones gets the smallest free number;
    /// several unnumbered folders next to numbered ones are left out as
    /// ambiguous.
    pub fn assign(
        &self,
        tree: &DirNode,
        folders: &[PathBuf],
        existing: &BTreeSet<u32>,
    ) -> AssignmentPlan {
        let root = tree.path.as_path();
        let folder_set: HashSet<&Path> = folders.iter().map(PathBuf::as_path).collect();

        let mut groups: BTreeMap<u32, Vec<VolumeCandidate>> = BTreeMap::new();
        let mut unresolved: Vec<PathBuf> = Vec::new();

        for folder in folders {
            match extract_volume_number_with_ancestors(folder, root) {
                Some(found) => {
                    tracing::debug!(
                        ?folder,
                        volume = found.number,
                        pattern = %found.pattern,
                        "Resolved volume number"
                    );
                    groups.entry(found.number).or_default().push(VolumeCandidate {
                        volume_number: found.number,
                        path: folder.clone(),
                        pattern: found.pattern,
                        page_count: self.page_count(tree, folder, &folder_set),
                    });
                }
                None => unresolved.push(folder.clone()),
            }
        }

        let mut plan = AssignmentPlan::default();
        let mut resolved: Vec<VolumeAssignment> = Vec::new();

        for (volume_number, candidates) in groups {
            if candidates.len() > 1 {
                tracing::info!(
                    volume = volume_number,
                    candidates = candidates.len(),
                    "Several folders claim the same volume"
                );
            }
            let Some(resolution) = self.resolver.resolve(candidates, root) else {
                continue;
            };
            for rejected in &resolution.rejected {
                tracing::info!(
                    volume = volume_number,
                    path = ?rejected.candidate.path,
                    winner = ?resolution.winner.path,
                    reason = %rejected.reason,
                    "Rejected duplicate volume folder"
                );
            }
            plan.rejected.extend(resolution.rejected);
            resolved.push(VolumeAssignment {
                volume_number,
                path: resolution.winner.path,
            });
        }

        let used: BTreeSet<u32> = resolved.iter().map(|a| a.volume_number).collect();

        if resolved.is_empty() {
            unresolved.sort_by(|a, b| {
                file_name_lossy(a)
                    .cmp(&file_name_lossy(b))
                    .then_with(|| a.cmp(b))
            });
            let mut next = 1u32;
            for folder in unresolved {
                while existing.contains(&next) {
                    next += 1;
                }
                tracing::debug!(?folder, volume = next, "Assigned sequential volume number");
                plan.assignments.push(VolumeAssignment {
                    volume_number: next,
                    path: folder,
                });
                next += 1;
            }
        } else if unresolved.len() == 1 {
            let number = (1u32..)
                .find(|n| !used.contains(n) && !existing.contains(n))
                .unwrap_or(1);
            let folder = unresolved.remove(0);
            tracing::debug!(?folder, volume = number, "Assigned smallest free volume number");
            plan.assignments.push(VolumeAssignment {
                volume_number: number,
                path: folder,
            });
        } else if !unresolved.is_empty() {
            tracing::warn!(
                count = unresolved.len(),
                folders = ?unresolved,
                "Skipping folders without a recognizable volume number"
            );
            plan.ambiguous = unresolved;
        }

        for assignment in resolved {
            if existing.contains(&assignment.volume_number) {
                plan.already_present.push(assignment);
            } else {
                plan.assignments.push(assignment);
            }
        }

        plan.assignments.sort_by_key(|a| a.volume_number);
        plan
    }

    /// Images a folder would contribute, not counting nested volume folders
    fn page_count(&self, tree: &DirNode, folder: &Path, folders: &HashSet<&Path>) -> usize {
        match tree.find(folder) {
            Some(node) => count_pages(node, &self.filter, folders),
            None => 0,
        }
    }
}

fn count_pages(node: &DirNode, filter: &EntryFilter, folders: &HashSet<&Path>) -> usize {
    node.direct_images(filter).count()
        + node
            .dirs
            .iter()
            .filter(|d| !filter.skips_dir(&d.name) && !folders.contains(d.path.as_path()))
            .map(|d| count_pages(d, filter, folders))
            .sum::<usize>()
}
