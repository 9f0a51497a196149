//! Download fixtures: page folders and archives

use std::io::Write;
use std::path::{Path, PathBuf};

/// Write one file per page name; each file's content is its own name
pub fn write_pages(dir: &Path, names: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for name in names {
        std::fs::write(dir.join(name), name.as_bytes()).unwrap();
    }
}

/// Write `count` pages named `001.jpg`, `002.jpg`, ...
pub fn write_numbered_pages(dir: &Path, count: usize) {
    let names: Vec<String> = (1..=count).map(|i| format!("{:03}.jpg", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    write_pages(dir, &refs);
}

/// Build a stored (uncompressed) zip archive, entry content = entry name
pub fn create_zip(archive: &Path, entries: &[&str]) -> PathBuf {
    std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
    let file = std::fs::File::create(archive).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for name in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(name.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    archive.to_path_buf()
}

/// Build a 7z archive holding the given page names
pub fn create_7z(archive: &Path, pages: &[&str]) -> PathBuf {
    let staging = tempfile::TempDir::new().unwrap();
    let source = staging.path().join("pages");
    write_pages(&source, pages);
    std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
    sevenz_rust::compress_to_path(&source, archive).unwrap();
    archive.to_path_buf()
}
