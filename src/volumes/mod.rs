//! Volume detection and numbering
//!
//! This module turns a snapshot of an extracted download into a list of
//! `(volume number, folder)` pairs:
//! - [`find_volume_folders`] picks the folders that directly hold pages
//! - [`extract_volume_number`] reads a number from scene-group folder names
//! - [`DuplicateResolver`] keeps one folder when several claim one number
//! - [`VolumeAssigner`] combines the three and numbers the leftovers

mod assignment;
mod detector;
mod duplicates;
mod number;

pub use assignment::{AssignmentPlan, VolumeAssigner};
pub use detector::find_volume_folders;
pub use duplicates::{
    DuplicateResolver, RejectedCandidate, RejectionReason, Resolution, VolumeCandidate,
    batch_range_width,
};
pub use number::{
    VolumeMatch, VolumePattern, extract_volume_number, extract_volume_number_with_ancestors,
    normalize_folder_name,
};
