use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tvbackground::{
    BackgroundError, BackgroundType, DirectoryMediaIndex, IndexMediaType, MediaIndex,
    MediaStoreScanner,
};

mod common;
use common::{FakeMediaIndex, index_entry};

#[tokio::test]
async fn test_scan_keeps_images_and_videos_newest_first() {
    let index = FakeMediaIndex::new(vec![
        index_entry("old-photo", IndexMediaType::Image, 100),
        index_entry("song", IndexMediaType::Audio, 500),
        index_entry("new-clip", IndexMediaType::Video, 300),
        index_entry("doc", IndexMediaType::Other, 400),
        index_entry("mid-photo", IndexMediaType::Image, 200),
    ]);
    let scanner = MediaStoreScanner::new(index.clone());

    let items = scanner.scan().await.unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.path.as_str()).collect();
    assert_eq!(
        ids,
        vec!["/storage/new-clip", "/storage/mid-photo", "/storage/old-photo"]
    );
    assert_eq!(items[0].kind, BackgroundType::Video);
    assert_eq!(items[0].locator, "content://media/new-clip");
    assert_eq!(items[1].kind, BackgroundType::Image);

    assert_eq!(
        index.queries(),
        vec![vec![IndexMediaType::Image, IndexMediaType::Video]]
    );
}

#[tokio::test]
async fn test_scan_of_empty_index() {
    let scanner = MediaStoreScanner::new(FakeMediaIndex::new(Vec::new()));
    assert!(scanner.scan().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scan_failure_is_reported() {
    let scanner = MediaStoreScanner::new(FakeMediaIndex::failing());

    let err = scanner.scan().await.unwrap_err();
    assert!(matches!(err, BackgroundError::Scan(_)));
}

fn touch(path: PathBuf, modified_secs: u64) {
    fs::write(&path, b"x").unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(modified_secs))
        .unwrap();
}

#[tokio::test]
async fn test_directory_index_walks_roots() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("holidays");
    fs::create_dir(&nested).unwrap();

    touch(root.path().join("beach.JPG"), 1_000);
    touch(nested.join("waves.mp4"), 2_000);
    touch(root.path().join("track.mp3"), 3_000);
    touch(root.path().join("readme.txt"), 4_000);
    touch(root.path().join(".hidden.jpg"), 5_000);

    let index = DirectoryMediaIndex::new(vec![root.path().to_path_buf()]);

    let entries = index
        .query(&[IndexMediaType::Image, IndexMediaType::Video])
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].path.ends_with("waves.mp4"));
    assert_eq!(entries[0].media_type, IndexMediaType::Video);
    assert!(entries[1].path.ends_with("beach.JPG"));
    assert_eq!(entries[1].media_type, IndexMediaType::Image);

    let audio = index.query(&[IndexMediaType::Audio]).await.unwrap();
    assert_eq!(audio.len(), 1);

    let items = MediaStoreScanner::new(Arc::new(index)).scan().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].kind, BackgroundType::Video);
}

#[tokio::test]
async fn test_missing_root_is_skipped() {
    let root = tempfile::tempdir().unwrap();
    touch(root.path().join("a.png"), 10);

    let index = DirectoryMediaIndex::new(vec![
        root.path().join("gone"),
        root.path().to_path_buf(),
    ]);

    let entries = index.query(&[IndexMediaType::Image]).await.unwrap();
    assert_eq!(entries.len(), 1);
}
