use super::*;
use std::io::Write;
use tempfile::TempDir;

fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

fn create_zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inner.zip");
    create_zip_archive(&path, files);
    std::fs::read(path).unwrap()
}

fn extractor(extract_root: &Path) -> ArchiveExtractor {
    extractor_with(extract_root, ArchiverTools::none(), Duration::from_secs(30))
}

fn relative_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[test]
fn archive_types_follow_extensions() {
    assert_eq!(detect_archive_type(Path::new("a.cbz")), Some(ArchiveType::Zip));
    assert_eq!(detect_archive_type(Path::new("a.ZIP")), Some(ArchiveType::Zip));
    assert_eq!(detect_archive_type(Path::new("a.cbr")), Some(ArchiveType::Rar));
    assert_eq!(detect_archive_type(Path::new("a.rar")), Some(ArchiveType::Rar));
    assert_eq!(detect_archive_type(Path::new("a.7z")), Some(ArchiveType::SevenZip));
    assert_eq!(detect_archive_type(Path::new("a.tar")), None);

    let extensions = vec!["cbz".to_string()];
    assert!(is_archive(Path::new("Vol 1.CBZ"), &extensions));
    assert!(!is_archive(Path::new("Vol 1.cbr"), &extensions));
}

#[test]
fn extraction_targets_never_collide() {
    let dir = TempDir::new().unwrap();
    let first = extraction_target(dir.path(), Path::new("/dl/Manga v01.cbz"));
    assert_eq!(first, dir.path().join("Manga v01"));
    std::fs::create_dir(&first).unwrap();

    let second = extraction_target(dir.path(), Path::new("/dl/Manga v01.zip"));
    assert_eq!(second, dir.path().join("Manga v01 [zip]"));
    std::fs::create_dir(&second).unwrap();

    let third = extraction_target(dir.path(), Path::new("/other/Manga v01.zip"));
    assert_eq!(third, dir.path().join("Manga v01 [zip #2]"));
}

#[tokio::test]
async fn single_archive_is_extracted_into_named_subdirectory() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    let archive = downloads.path().join("Manga v03.cbz");
    create_zip_archive(&archive, &[("002.jpg", b"b"), ("001.jpg", b"a")]);

    let prepared = extractor(extract_root.path()).prepare(&archive).await.unwrap();
    assert!(prepared.is_extracted());
    assert_eq!(
        relative_files(&prepared.import_path),
        vec!["Manga v03/001.jpg", "Manga v03/002.jpg"]
    );

    let temp_path = prepared.import_path.clone();
    prepared.close().unwrap();
    assert!(!temp_path.exists());
    assert!(archive.exists(), "source archive must be left alone");
}

#[tokio::test]
async fn directory_of_archives_shares_one_temp_directory() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    create_zip_archive(&downloads.path().join("Vol 1.zip"), &[("1.png", b"x")]);
    create_zip_archive(&downloads.path().join("Vol 2.cbz"), &[("1.png", b"y")]);
    std::fs::write(downloads.path().join("info.nfo"), b"release notes").unwrap();

    let prepared = extractor(extract_root.path())
        .prepare(downloads.path())
        .await
        .unwrap();
    assert_eq!(
        relative_files(&prepared.import_path),
        vec!["Vol 1/1.png", "Vol 2/1.png"]
    );
    prepared.close().unwrap();
    assert!(dir_is_empty(extract_root.path()));
}

#[tokio::test]
async fn plain_directory_passes_through() {
    let downloads = TempDir::new().unwrap();
    std::fs::write(downloads.path().join("001.jpg"), b"x").unwrap();

    let prepared = extractor(Path::new("/nonexistent-extract-root"))
        .prepare(downloads.path())
        .await
        .unwrap();
    assert!(!prepared.is_extracted());
    assert_eq!(prepared.import_path, downloads.path());
    prepared.close().unwrap();
    assert!(downloads.path().join("001.jpg").exists());
}

#[tokio::test]
async fn nested_archives_are_extracted_in_place_and_removed() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    let inner_v1 = create_zip_bytes(&[("001.jpg", b"a"), ("002.jpg", b"b")]);
    let inner_v2 = create_zip_bytes(&[("001.jpg", b"c")]);
    let archive = downloads.path().join("Manga v01-02.zip");
    create_zip_archive(
        &archive,
        &[
            ("Manga v01.cbz", inner_v1.as_slice()),
            ("Manga v02.cbz", inner_v2.as_slice()),
        ],
    );

    let prepared = extractor(extract_root.path()).prepare(&archive).await.unwrap();
    assert_eq!(
        relative_files(&prepared.import_path),
        vec![
            "Manga v01-02/Manga v01/001.jpg",
            "Manga v01-02/Manga v01/002.jpg",
            "Manga v01-02/Manga v02/001.jpg",
        ]
    );
    prepared.close().unwrap();
}

#[tokio::test]
async fn junk_entries_are_removed() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    let archive = downloads.path().join("Vol 4.zip");
    create_zip_archive(
        &archive,
        &[
            ("Vol 4/001.jpg", b"a"),
            ("Vol 4/Thumbs.db", b"junk"),
            ("Vol 4/.DS_Store", b"junk"),
            ("__MACOSX/Vol 4/._001.jpg", b"junk"),
            ("Vol 4/DESKTOP.INI", b"junk"),
        ],
    );

    let prepared = extractor(extract_root.path()).prepare(&archive).await.unwrap();
    assert_eq!(
        relative_files(&prepared.import_path),
        vec!["Vol 4/Vol 4/001.jpg"]
    );
    prepared.close().unwrap();
}

#[tokio::test]
async fn entries_escaping_the_destination_are_skipped() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    let archive = downloads.path().join("evil.zip");
    create_zip_archive(&archive, &[("../escaped.jpg", b"x"), ("ok.jpg", b"y")]);

    let prepared = extractor(extract_root.path()).prepare(&archive).await.unwrap();
    assert_eq!(relative_files(&prepared.import_path), vec!["evil/ok.jpg"]);
    assert!(!prepared.import_path.join("escaped.jpg").exists());
    prepared.close().unwrap();
}

#[tokio::test]
async fn corrupt_archive_fails_and_leaves_no_temp_directory() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    let archive = downloads.path().join("broken.cbz");
    std::fs::write(&archive, b"this is not a zip file").unwrap();

    let err = extractor(extract_root.path())
        .prepare(&archive)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Import(ImportError::ExtractionFailed { .. })
    ));
    assert!(dir_is_empty(extract_root.path()));
}

#[tokio::test]
async fn single_non_archive_file_is_unsupported() {
    let downloads = TempDir::new().unwrap();
    let file = downloads.path().join("volume.pdf");
    std::fs::write(&file, b"%PDF").unwrap();

    let err = extractor(downloads.path()).prepare(&file).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Import(ImportError::UnsupportedFormat { .. })
    ));
}

#[tokio::test]
async fn missing_source_is_an_io_error() {
    let extract_root = TempDir::new().unwrap();
    let err = extractor(extract_root.path())
        .prepare(Path::new("/definitely/not/here"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[tokio::test]
async fn seven_zip_falls_back_to_in_process_decoder() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("001.png"), b"page one").unwrap();
    std::fs::write(source.path().join("002.png"), b"page two").unwrap();
    let archive = downloads.path().join("Manga 第2巻.7z");
    sevenz_rust::compress_to_path(source.path(), &archive).unwrap();

    let prepared = extractor(extract_root.path()).prepare(&archive).await.unwrap();
    let files = relative_files(&prepared.import_path);
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.starts_with("Manga 第2巻/")));
    prepared.close().unwrap();
}

#[tokio::test]
async fn dropping_an_extraction_dir_removes_it() {
    let extract_root = TempDir::new().unwrap();
    let path = {
        let dir = ExtractionDir::create_in(&extract_root.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("page.jpg"), b"x").unwrap();
        dir.path().to_path_buf()
    };
    assert!(!path.exists());
}

#[tokio::test]
#[ignore] // requires a 7z binary on PATH
async fn seven_zip_binary_extracts_archives() {
    let Ok(binary) = which::which("7z") else {
        return;
    };
    let downloads = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("001.jpg"), b"x").unwrap();
    let archive = downloads.path().join("Vol 7.7z");
    sevenz_rust::compress_to_path(source.path(), &archive).unwrap();

    let dest = downloads.path().join("out");
    extract_with_7z(&binary, &archive, &dest, Duration::from_secs(60))
        .await
        .unwrap();
    assert!(dest.join("001.jpg").exists());
}

fn extractor_with(
    extract_root: &Path,
    tools: ArchiverTools,
    timeout: Duration,
) -> ArchiveExtractor {
    ArchiveExtractor::with_tools(EntryFilter::default(), tools, timeout, extract_root.to_path_buf())
}

/// A stand-in archiver that never finishes on its own
#[cfg(unix)]
fn stalled_archiver(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("stalled-archiver");
    std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn timed_out_decoder_finishes_before_temp_dir_is_removed() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    for i in 0..3000 {
        std::fs::write(source.path().join(format!("{i:04}.jpg")), b"page").unwrap();
    }
    let archive = downloads.path().join("Big v01.7z");
    sevenz_rust::compress_to_path(source.path(), &archive).unwrap();

    let extractor =
        extractor_with(extract_root.path(), ArchiverTools::none(), Duration::from_millis(1));
    let err = extractor.prepare(&archive).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Import(ImportError::ArchiverTimeout { .. })
    ));
    assert!(dir_is_empty(extract_root.path()));

    // nothing keeps writing after the error was returned
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(dir_is_empty(extract_root.path()));
}

#[tokio::test]
async fn zip_extraction_is_not_bounded_by_archiver_timeout() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    let archive = downloads.path().join("Big v02.cbz");
    let names: Vec<String> = (0..500).map(|i| format!("{i:03}.jpg")).collect();
    let entries: Vec<(&str, &[u8])> =
        names.iter().map(|n| (n.as_str(), &b"page"[..])).collect();
    create_zip_archive(&archive, &entries);

    let extractor =
        extractor_with(extract_root.path(), ArchiverTools::none(), Duration::from_nanos(1));
    let prepared = extractor.prepare(&archive).await.unwrap();
    assert_eq!(relative_files(&prepared.import_path).len(), 500);
    prepared.close().unwrap();
    assert!(dir_is_empty(extract_root.path()));
}

#[cfg(unix)]
#[tokio::test]
async fn stalled_external_archiver_times_out_and_leaves_no_temp_dir() {
    let downloads = TempDir::new().unwrap();
    let extract_root = TempDir::new().unwrap();
    let tools_dir = TempDir::new().unwrap();
    let archive = downloads.path().join("Manga v05.cbr");
    std::fs::write(&archive, b"Rar!\x1a\x07\x00").unwrap();

    let tools = ArchiverTools {
        bsdtar: Some(stalled_archiver(tools_dir.path())),
        sevenzip: None,
    };
    let started = std::time::Instant::now();
    let err = extractor_with(extract_root.path(), tools, Duration::from_millis(300))
        .prepare(&archive)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    match err {
        Error::Import(ImportError::ArchiverTimeout { archive: failed, timeout }) => {
            assert_eq!(failed, archive);
            assert_eq!(timeout, Duration::from_millis(300));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert!(dir_is_empty(extract_root.path()));
}

#[test]
fn nested_archive_search_skips_junk_directories() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("__MACOSX/Batch")).unwrap();
    std::fs::create_dir_all(root.path().join("Batch")).unwrap();
    std::fs::write(root.path().join("__MACOSX/Batch/._Vol 1.cbz"), b"xattr").unwrap();
    std::fs::write(root.path().join("Batch/Vol 1.cbz"), b"zip").unwrap();

    let found = find_archives_recursive(root.path(), &EntryFilter::default());
    assert_eq!(found, vec![root.path().join("Batch/Vol 1.cbz")]);
}
