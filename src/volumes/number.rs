//! Volume numbers from folder names

use crate::utils::file_name_lossy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Folder-name pattern that produced a volume number, in matching order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumePattern {
    /// `第3巻`
    KanjiVolume,
    /// `3巻`
    KanjiSuffix,
    /// `（3）`
    FullwidthParens,
    /// `(3)`
    Parens,
    /// `Vol.3`, `Volume 3`
    VolKeyword,
    /// `v03` not preceded by a letter
    VPrefix,
    /// `Title_03`
    TrailingUnderscore,
    /// A CJK character directly followed by digits near the end
    CjkAdjacent,
    /// `[03]`, `[v03]`
    Bracketed,
    /// Trailing digits
    TrailingNumber,
}

impl VolumePattern {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            VolumePattern::KanjiVolume => "kanji_volume",
            VolumePattern::KanjiSuffix => "kanji_suffix",
            VolumePattern::FullwidthParens => "fullwidth_parens",
            VolumePattern::Parens => "parens",
            VolumePattern::VolKeyword => "vol_keyword",
            VolumePattern::VPrefix => "v_prefix",
            VolumePattern::TrailingUnderscore => "trailing_underscore",
            VolumePattern::CjkAdjacent => "cjk_adjacent",
            VolumePattern::Bracketed => "bracketed",
            VolumePattern::TrailingNumber => "trailing_number",
        }
    }
}

impl std::fmt::Display for VolumePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A volume number together with the pattern that found it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMatch {
    /// Parsed volume number, always > 0
    pub number: u32,
    /// Pattern that matched
    pub pattern: VolumePattern,
}

#[allow(clippy::expect_used)]
static PATTERNS: LazyLock<Vec<(VolumePattern, Regex)>> = LazyLock::new(|| {
    [
        (VolumePattern::KanjiVolume, r"第([0-9]+)巻"),
        (VolumePattern::KanjiSuffix, r"([0-9]+)巻"),
        (VolumePattern::FullwidthParens, r"（\s*([0-9]+)\s*）"),
        (VolumePattern::Parens, r"\(\s*([0-9]+)\s*\)"),
        (VolumePattern::VolKeyword, r"(?i)vol(?:ume)?\.?\s*([0-9]+)"),
        (VolumePattern::VPrefix, r"(?:^|[^a-zA-Z])[vV]([0-9]+)"),
        (VolumePattern::TrailingUnderscore, r"_([0-9]+)$"),
        (
            VolumePattern::CjkAdjacent,
            r"[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]([0-9]+)[^0-9]{0,3}$",
        ),
        (VolumePattern::Bracketed, r"(?i)\[v?([0-9]+)\]"),
        (VolumePattern::TrailingNumber, r"([0-9]+)\s*$"),
    ]
    .into_iter()
    .map(|(pattern, re)| (pattern, Regex::new(re).expect("volume pattern is valid")))
    .collect()
});

/// Normalize a folder name before pattern matching
///
/// Applies Unicode NFC, maps fullwidth digits and Latin letters to ASCII,
/// maps the ideographic space to an ASCII space and trims.
pub fn normalize_folder_name(name: &str) -> String {
    let normalized: String = name
        .nfc()
        .map(|c| match c {
            '\u{FF10}'..='\u{FF19}' => shift(c, 0xFF10, '0'),
            '\u{FF21}'..='\u{FF3A}' => shift(c, 0xFF21, 'A'),
            '\u{FF41}'..='\u{FF5A}' => shift(c, 0xFF41, 'a'),
            '\u{3000}' => ' ',
            other => other,
        })
        .collect();
    normalized.trim().to_string()
}

fn shift(c: char, from: u32, to: char) -> char {
    char::from_u32(c as u32 - from + to as u32).unwrap_or(c)
}

/// Extract a volume number from a single folder name
///
/// Patterns are tried in [`VolumePattern`] order; the first one whose captured
/// number is greater than zero wins.
pub fn extract_volume_number(name: &str) -> Option<VolumeMatch> {
    let name = normalize_folder_name(name);
    PATTERNS.iter().find_map(|(pattern, re)| {
        let caps = re.captures(&name)?;
        let number = caps.get(1)?.as_str().parse::<u32>().ok()?;
        (number > 0).then_some(VolumeMatch {
            number,
            pattern: *pattern,
        })
    })
}

/// Extract a volume number from a folder, falling back to its ancestors
///
/// The folder's own name is always tried. The parent and then the grandparent
/// are tried only while they lie strictly inside `root`, so the names of
/// temporary or download directories never produce a number.
pub fn extract_volume_number_with_ancestors(path: &Path, root: &Path) -> Option<VolumeMatch> {
    if let Some(found) = extract_volume_number(&file_name_lossy(path)) {
        return Some(found);
    }
    path.ancestors()
        .skip(1)
        .take(2)
        .take_while(|ancestor| *ancestor != root && ancestor.starts_with(root))
        .find_map(|ancestor| extract_volume_number(&file_name_lossy(ancestor)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(name: &str) -> Option<u32> {
        extract_volume_number(name).map(|m| m.number)
    }

    fn pattern(name: &str) -> Option<VolumePattern> {
        extract_volume_number(name).map(|m| m.pattern)
    }

    #[test]
    fn documented_examples() {
        assert_eq!(number("第3巻"), Some(3));
        assert_eq!(number("Vol.12"), Some(12));
        assert_eq!(number("Some Manga (05)"), Some(5));
        assert_eq!(number("Some Manga_12"), Some(12));
        assert_eq!(number("Some Manga"), None);
    }

    #[test]
    fn kanji_markers_take_precedence() {
        assert_eq!(pattern("ワンピース 第03巻 (2001)"), Some(VolumePattern::KanjiVolume));
        assert_eq!(number("ワンピース 第03巻 (2001)"), Some(3));
        assert_eq!(pattern("進撃の巨人 12巻"), Some(VolumePattern::KanjiSuffix));
    }

    #[test]
    fn fullwidth_input_is_normalized() {
        assert_eq!(normalize_folder_name("\u{3000}ＶＯＬ．０７\u{3000}"), "VOL．07");
        assert_eq!(number("第１２巻"), Some(12));
        assert_eq!(number("ｖｏｌ　４"), Some(4));
        assert_eq!(pattern("タイトル（１５）"), Some(VolumePattern::FullwidthParens));
        assert_eq!(number("タイトル（１５）"), Some(15));
    }

    #[test]
    fn v_prefix_requires_a_non_letter_before_it() {
        assert_eq!(number("Berserk v07"), Some(7));
        assert_eq!(number("v3"), Some(3));
        assert_eq!(pattern("Rev12 Special"), None);
        assert_eq!(number("Title-V10 [Group]"), Some(10));
    }

    #[test]
    fn volume_keyword_variants() {
        assert_eq!(number("Manga Volume 21"), Some(21));
        assert_eq!(number("manga vol 3 (digital)"), Some(3));
        assert_eq!(pattern("manga VOL.3"), Some(VolumePattern::VolKeyword));
    }

    #[test]
    fn cjk_bracket_and_trailing_fallbacks() {
        assert_eq!(pattern("鬼滅の刃5"), Some(VolumePattern::CjkAdjacent));
        assert_eq!(number("鬼滅の刃5"), Some(5));
        assert_eq!(pattern("Some Manga [08]"), Some(VolumePattern::Bracketed));
        assert_eq!(number("Some Manga [v08]"), Some(8));
        assert_eq!(pattern("Some Manga 08 "), Some(VolumePattern::TrailingNumber));
    }

    #[test]
    fn zero_is_never_a_volume() {
        assert_eq!(number("Vol.00"), None);
        assert_eq!(number("Prologue (0)"), None);
        // a zero match falls through to later patterns
        assert_eq!(number("Vol.0 Part_2"), Some(2));
    }

    #[test]
    fn ancestors_are_used_inside_root_only() {
        let root = Path::new("/tmp/extract");
        assert_eq!(
            extract_volume_number_with_ancestors(
                Path::new("/tmp/extract/Manga v04/images"),
                root
            )
            .map(|m| m.number),
            Some(4)
        );
        assert_eq!(
            extract_volume_number_with_ancestors(
                Path::new("/tmp/extract/Manga v04/scans/hq"),
                root
            )
            .map(|m| m.number),
            Some(4)
        );
        assert_eq!(
            extract_volume_number_with_ancestors(Path::new("/tmp/extract/pages"), root),
            None
        );
        let numbered_root = Path::new("/downloads/batch 2");
        assert_eq!(
            extract_volume_number_with_ancestors(Path::new("/downloads/batch 2/pages"), numbered_root),
            None
        );
        assert_eq!(
            extract_volume_number_with_ancestors(numbered_root, numbered_root)
                .map(|m| m.number),
            Some(2)
        );
    }

    #[test]
    fn ancestor_search_stops_at_grandparent() {
        let root = Path::new("/x");
        assert_eq!(
            extract_volume_number_with_ancestors(Path::new("/x/Vol 9/a/b/c"), root),
            None
        );
    }
}
