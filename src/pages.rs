//! Reading order of page images
//!
//! Page files arrive with watermark prefixes, single-letter markers, spread
//! pages (`004-005`), sub-pages (`012a`, `010-1`) and inconsistent padding.
//! Each name is reduced to a [`SortKey`]; names that cannot be parsed sort
//! last, and a volume made mostly of such names is ordered by file name alone.

use crate::utils::file_stem_lossy;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static NUMBER_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)-?([A-Za-z])$").expect("valid regex"));
#[allow(clippy::expect_used)]
static NUMBER_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)-([0-9]+)$").expect("valid regex"));
#[allow(clippy::expect_used)]
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)$").expect("valid regex"));
#[allow(clippy::expect_used)]
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid regex"));

const SEPARATORS: [char; 4] = ['_', '-', '.', ' '];

/// Position of one page within a volume
#[derive(Clone, Copy, Debug)]
pub enum SortKey {
    /// Plain page number, or the first page of a spread
    Number(u64),
    /// Primary and secondary number (`010-1`)
    NumberPair(u64, u64),
    /// Page number with a sub-page letter (`012a`), letter lowercased
    NumberLetter(u64, char),
    /// No digits at all; sorts after every numbered page
    Unparseable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Secondary {
    Numeric(u64),
    Letter(char),
}

impl SortKey {
    fn primary(&self) -> Option<u64> {
        match self {
            SortKey::Number(n) | SortKey::NumberPair(n, _) | SortKey::NumberLetter(n, _) => {
                Some(*n)
            }
            SortKey::Unparseable => None,
        }
    }

    fn secondary(&self) -> Secondary {
        match self {
            SortKey::NumberPair(_, m) => Secondary::Numeric(*m),
            SortKey::NumberLetter(_, c) => Secondary::Letter(*c),
            SortKey::Number(_) | SortKey::Unparseable => Secondary::Numeric(0),
        }
    }

    /// Whether the name carried no digits at all
    pub fn is_unparseable(&self) -> bool {
        matches!(self, SortKey::Unparseable)
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let primary = match (self.primary(), other.primary()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        primary.then_with(|| self.secondary().cmp(&other.secondary()))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

/// Prefix shared by every page name that should be ignored when parsing
///
/// `names` are file names without extension. A shared prefix ending in a
/// separator (`_`, `-`, `.`, space) is returned whole. Otherwise its trailing
/// digits are dropped and the rest is used only if longer than one character,
/// which leaves single-letter markers such as `p0001` alone.
pub fn detect_common_prefix<S: AsRef<str>>(names: &[S]) -> String {
    let Some((first, rest)) = names.split_first() else {
        return String::new();
    };

    let mut prefix: Vec<char> = first.as_ref().chars().collect();
    for name in rest {
        let common = prefix
            .iter()
            .zip(name.as_ref().chars())
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(common);
    }

    match prefix.last() {
        None => String::new(),
        Some(c) if SEPARATORS.contains(c) => prefix.into_iter().collect(),
        Some(_) => {
            while prefix.last().is_some_and(|c| c.is_ascii_digit()) {
                prefix.pop();
            }
            if prefix.len() > 1 {
                prefix.into_iter().collect()
            } else {
                String::new()
            }
        }
    }
}

/// Sort key of one page name (without extension)
///
/// Two numbers `N-M` with `M > N` and `M - N <= spread_max_gap` are a spread
/// and sort as `N`; any other pair is sub-numbering.
pub fn parse_page_sort_key(name: &str, common_prefix: &str, spread_max_gap: u64) -> SortKey {
    let stripped = strip_prefix_ignore_case(name, common_prefix).unwrap_or(name);
    let stripped = strip_page_marker(stripped);

    let token = stripped
        .split(['_', ' '])
        .rfind(|segment| !segment.is_empty())
        .unwrap_or(stripped);

    if let Some(caps) = NUMBER_LETTER.captures(token) {
        let letter = caps[2].chars().next().map(|c| c.to_ascii_lowercase());
        if let (Ok(n), Some(letter)) = (caps[1].parse::<u64>(), letter) {
            return SortKey::NumberLetter(n, letter);
        }
    }

    if let Some(caps) = NUMBER_PAIR.captures(token)
        && let (Ok(first), Ok(second)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>())
    {
        return if second > first && second - first <= spread_max_gap {
            SortKey::Number(first)
        } else {
            SortKey::NumberPair(first, second)
        };
    }

    if let Some(caps) = NUMBER.captures(token)
        && let Ok(n) = caps[1].parse::<u64>()
    {
        return SortKey::Number(n);
    }

    DIGITS
        .find(token)
        .or_else(|| DIGITS.find(stripped))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map_or(SortKey::Unparseable, SortKey::Number)
}

fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let mut chars = name.char_indices();
    for p in prefix.chars() {
        let (_, c) = chars.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    Some(chars.next().map_or("", |(idx, _)| &name[idx..]))
}

/// Drop a single leading letter directly followed by a digit (`p0001` -> `0001`)
fn strip_page_marker(name: &str) -> &str {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(digit)) if letter.is_ascii_alphabetic() && digit.is_ascii_digit() => {
            &name[1..]
        }
        _ => name,
    }
}

/// Orders the page images of one volume
#[derive(Clone, Copy, Debug)]
pub struct PageSorter {
    spread_max_gap: u64,
    fallback_ratio: f64,
}

impl Default for PageSorter {
    fn default() -> Self {
        Self::new(2, 0.5)
    }
}

impl PageSorter {
    /// Create a sorter
    ///
    /// `fallback_ratio` is the share of unparseable names above which the
    /// whole volume is ordered by file name.
    pub fn new(spread_max_gap: u64, fallback_ratio: f64) -> Self {
        Self {
            spread_max_gap,
            fallback_ratio,
        }
    }

    /// Sort file names into reading order
    pub fn sort_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let paths: Vec<PathBuf> = names.iter().map(|n| PathBuf::from(n.as_ref())).collect();
        self.sort_paths(paths)
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    /// Sort image paths into reading order, keyed by their file names
    pub fn sort_paths(&self, mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
        let stems: Vec<String> = paths.iter().map(|p| file_stem_lossy(p)).collect();
        let prefix = detect_common_prefix(&stems);

        let keys: Vec<SortKey> = stems
            .iter()
            .map(|stem| parse_page_sort_key(stem, &prefix, self.spread_max_gap))
            .collect();
        let unparseable = keys.iter().filter(|k| k.is_unparseable()).count();

        if !paths.is_empty() && unparseable as f64 > self.fallback_ratio * paths.len() as f64 {
            tracing::debug!(
                pages = paths.len(),
                unparseable,
                "Most page names carry no number, ordering by file name"
            );
            paths.sort_by(|a, b| by_file_name(a, b));
            return paths;
        }

        let mut keyed: Vec<(SortKey, PathBuf)> = keys.into_iter().zip(paths).collect();
        keyed.sort_by(|(ka, a), (kb, b)| ka.cmp(kb).then_with(|| by_file_name(a, b)));
        keyed.into_iter().map(|(_, path)| path).collect()
    }
}

fn by_file_name(a: &Path, b: &Path) -> Ordering {
    a.file_name()
        .cmp(&b.file_name())
        .then_with(|| a.cmp(b))
}
