//! Assertions on the canonical library layout

use std::path::Path;

/// Sorted entry names of a directory
pub fn entry_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", dir.display(), e))
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Assert that a volume folder holds exactly `count` sequentially named pages
pub fn assert_page_count(volume_dir: &Path, count: usize) {
    let names = entry_names(volume_dir);
    assert_eq!(
        names.len(),
        count,
        "unexpected page count in {}: {:?}",
        volume_dir.display(),
        names
    );
    for (index, name) in names.iter().enumerate() {
        let stem = name.split('.').next().unwrap();
        assert_eq!(
            stem.parse::<usize>().unwrap(),
            index + 1,
            "pages in {} are not numbered sequentially: {:?}",
            volume_dir.display(),
            names
        );
    }
}

/// Original page names in the order they were copied into `volume_dir`
///
/// Fixture pages carry their own name as content.
pub fn copied_page_order(volume_dir: &Path) -> Vec<String> {
    entry_names(volume_dir)
        .into_iter()
        .map(|name| std::fs::read_to_string(volume_dir.join(name)).unwrap())
        .collect()
}
