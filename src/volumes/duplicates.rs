//! Choosing one folder when several claim the same volume number

use super::number::VolumePattern;
use crate::utils::file_name_lossy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static BATCH_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)v([0-9]+)\s*-\s*v?([0-9]+)").expect("batch range pattern is valid")
});

/// Number of ancestor folders searched for a batch range such as `v01-10`
const BATCH_RANGE_DEPTH: usize = 3;

/// One folder claiming a volume number
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeCandidate {
    /// Claimed volume number
    pub volume_number: u32,
    /// The volume folder
    pub path: PathBuf,
    /// Pattern the number came from
    pub pattern: VolumePattern,
    /// Images that would be imported from this folder
    pub page_count: usize,
}

/// Why a candidate lost against the winner of its volume number
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Clearly fewer pages than the winner
    FewerPages {
        /// This candidate's page count
        pages: usize,
        /// The winner's page count
        winner_pages: usize,
    },
    /// Comparable size, but from a narrower batch range
    NarrowerBatchRange {
        /// This candidate's range width (0 if none)
        width: u32,
        /// The winner's range width
        winner_width: u32,
    },
    /// Comparable size and range, but the winner used `第N巻` naming
    NotKanjiVolume,
    /// Indistinguishable; the winner's path sorts first
    PathOrder,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::FewerPages {
                pages,
                winner_pages,
            } => write!(f, "{pages} pages against {winner_pages}"),
            RejectionReason::NarrowerBatchRange {
                width,
                winner_width,
            } => write!(f, "batch range of {width} against {winner_width}"),
            RejectionReason::NotKanjiVolume => f.write_str("winner uses 第N巻 naming"),
            RejectionReason::PathOrder => f.write_str("path sorts after winner"),
        }
    }
}

/// A candidate that was discarded, with the reason
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    /// The discarded candidate
    pub candidate: VolumeCandidate,
    /// Why it lost
    pub reason: RejectionReason,
}

/// Outcome of resolving one group of candidates
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// The candidate kept for the volume number
    pub winner: VolumeCandidate,
    /// Every other candidate
    pub rejected: Vec<RejectedCandidate>,
}

/// Deterministically picks one candidate per volume number
///
/// Candidates whose page count is within `tie_ratio` of the largest count in
/// the group are tied on size; among those the widest batch range wins, then
/// `第N巻` naming, then the lexicographically smallest path. Everything
/// outside the tie band is rejected for having fewer pages.
#[derive(Clone, Copy, Debug)]
pub struct DuplicateResolver {
    tie_ratio: f64,
}

impl DuplicateResolver {
    /// Create a resolver treating page counts within `tie_ratio` of the largest as equal
    pub fn new(tie_ratio: f64) -> Self {
        Self { tie_ratio }
    }

    /// Resolve a group of candidates sharing one volume number
    ///
    /// Returns `None` for an empty group.
    pub fn resolve(&self, candidates: Vec<VolumeCandidate>, root: &Path) -> Option<Resolution> {
        let max_pages = candidates.iter().map(|c| c.page_count).max()?;
        let band = self.tie_ratio * max_pages as f64;

        let (mut tied, outside): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .map(|c| {
                let width = batch_range_width(&c.path, root);
                (c, width)
            })
            .partition(|(c, _)| (max_pages - c.page_count) as f64 <= band);

        tied.sort_by(|(a, a_width), (b, b_width)| {
            b_width
                .cmp(a_width)
                .then_with(|| kanji_rank(a).cmp(&kanji_rank(b)))
                .then_with(|| a.path.cmp(&b.path))
        });

        let mut tied = tied.into_iter();
        let (winner, winner_width) = tied.next()?;

        let mut rejected: Vec<RejectedCandidate> = tied
            .map(|(candidate, width)| {
                let reason = if width < winner_width {
                    RejectionReason::NarrowerBatchRange {
                        width,
                        winner_width,
                    }
                } else if kanji_rank(&candidate) > kanji_rank(&winner) {
                    RejectionReason::NotKanjiVolume
                } else {
                    RejectionReason::PathOrder
                };
                RejectedCandidate { candidate, reason }
            })
            .collect();

        rejected.extend(outside.into_iter().map(|(candidate, _)| RejectedCandidate {
            reason: RejectionReason::FewerPages {
                pages: candidate.page_count,
                winner_pages: winner.page_count,
            },
            candidate,
        }));

        Some(Resolution { winner, rejected })
    }
}

fn kanji_rank(candidate: &VolumeCandidate) -> u8 {
    if candidate.pattern == VolumePattern::KanjiVolume {
        0
    } else {
        1
    }
}

/// Width of the widest `vN-M` batch range named by one of the folder's ancestors
///
/// Up to three ancestors are searched, never above `root`. Returns 0 when no
/// ancestor names a range.
pub fn batch_range_width(path: &Path, root: &Path) -> u32 {
    path.ancestors()
        .skip(1)
        .take(BATCH_RANGE_DEPTH)
        .take_while(|ancestor| ancestor.starts_with(root))
        .find_map(|ancestor| {
            let name = super::number::normalize_folder_name(&file_name_lossy(ancestor));
            let caps = BATCH_RANGE.captures(&name)?;
            let start = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let end = caps.get(2)?.as_str().parse::<u32>().ok()?;
            Some(match end.cmp(&start) {
                Ordering::Less => 0,
                _ => (end - start).saturating_add(1),
            })
        })
        .unwrap_or(0)
}
