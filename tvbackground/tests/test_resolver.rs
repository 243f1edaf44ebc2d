use tvbackground::resolver::{
    extract_file_id, is_sharing_link, resolve, resolve_locator, resolve_thumbnail,
};
use tvbackground::{BackgroundSourceType, BackgroundType, LinkVariant};

mod common;
use common::setting;

fn resolve_url(locator: &str) -> String {
    resolve_locator(BackgroundSourceType::Url, locator, LinkVariant::DirectView)
}

#[test]
fn test_local_paths_are_verbatim_and_idempotent() {
    for path in [
        "/data/backgrounds/beach.jpg",
        "asset://backgrounds/ocean_waves.mp4",
        "content://media/external/video/42",
        // A sharing link stored as local stays untouched
        "https://drive.example.com/file/d/ABC123/view",
    ] {
        let local = setting(BackgroundType::Image, BackgroundSourceType::Local, path, "x");
        let once = resolve(&local);
        assert_eq!(once, path);

        let again = setting(BackgroundType::Image, BackgroundSourceType::Local, &once, "x");
        assert_eq!(resolve(&again), once);
    }
}

#[test]
fn test_file_link_is_rewritten() {
    assert_eq!(
        resolve_url("https://drive.example.com/file/d/ABC123/view?usp=sharing"),
        "https://drive.example.com/uc?export=view&id=ABC123"
    );
}

#[test]
fn test_open_link_is_rewritten() {
    assert_eq!(
        resolve_url("https://drive.example.com/open?id=XYZ789"),
        "https://drive.example.com/uc?export=view&id=XYZ789"
    );
}

#[test]
fn test_any_id_query_is_rewritten() {
    assert_eq!(
        resolve_url("https://drive.example.com/uc?export=download&id=Q1"),
        "https://drive.example.com/uc?export=view&id=Q1"
    );
    assert_eq!(
        resolve_url("https://docs.google.com/presentation/view?id=Q2&x=1"),
        "https://docs.google.com/uc?export=view&id=Q2"
    );
}

#[test]
fn test_unrecognized_host_is_unchanged() {
    let url = "https://example.com/video.mp4";
    assert_eq!(resolve_url(url), url);
    assert!(!is_sharing_link(url));

    let with_id = "https://cdn.example.com/file/d/ABC/view?id=1";
    assert_eq!(resolve_url(with_id), with_id);
}

#[test]
fn test_sharing_link_without_identifier_is_unchanged() {
    let url = "https://drive.example.com/drive/my-drive";
    assert_eq!(resolve_url(url), url);
    assert_eq!(extract_file_id(url), None);
}

#[test]
fn test_garbage_is_unchanged() {
    for input in ["not a url", "", "ftp://drive.example.com/open?id=A"] {
        assert_eq!(resolve_url(input), input);
    }
}

#[test]
fn test_thumbnail_variant() {
    let link = setting(
        BackgroundType::Video,
        BackgroundSourceType::Url,
        "https://drive.example.com/file/d/ABC123/view",
        "Clip",
    );
    assert_eq!(
        resolve_thumbnail(&link),
        "https://drive.example.com/thumbnail?id=ABC123&sz=s500"
    );
    assert_eq!(link.direct_url(), "https://drive.example.com/uc?export=view&id=ABC123");

    let local = setting(
        BackgroundType::Image,
        BackgroundSourceType::Local,
        "/data/a.jpg",
        "A",
    );
    assert_eq!(resolve_thumbnail(&local), "/data/a.jpg");
}

#[test]
fn test_sharing_link_detection() {
    assert!(is_sharing_link("https://drive.example.com/file/d/ABC123/view"));
    assert!(is_sharing_link("http://drive.example.org/open?id=1"));
    assert!(is_sharing_link("https://docs.google.com/uc?id=1"));
    assert!(!is_sharing_link("/storage/emulated/0/Movies/a.mp4"));
    assert!(!is_sharing_link("https://example.com/drive/a.mp4"));
}

#[test]
fn test_extract_file_id() {
    assert_eq!(
        extract_file_id("https://drive.example.com/file/d/ABC123/view?usp=sharing").as_deref(),
        Some("ABC123")
    );
    assert_eq!(
        extract_file_id("https://drive.example.com/open?id=XYZ789").as_deref(),
        Some("XYZ789")
    );
    assert_eq!(
        extract_file_id("https://drive.example.com/a/example.org/d/GEN1/edit").as_deref(),
        Some("GEN1")
    );
}

#[test]
fn test_identifier_is_emitted_decoded() {
    assert_eq!(
        resolve_url("https://drive.example.com/file/d/AB%20C/view"),
        "https://drive.example.com/uc?export=view&id=AB C"
    );
    assert_eq!(
        resolve_url("https://drive.example.com/open?id=AB%20C"),
        "https://drive.example.com/uc?export=view&id=AB C"
    );
}
