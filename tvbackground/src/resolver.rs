//! Background descriptor → renderable locator.
//!
//! Local paths are used verbatim. Links from a recognized file-sharing
//! service are rewritten to their direct-view (or thumbnail) form:
//!
//! | input                                   | output                               |
//! |-----------------------------------------|--------------------------------------|
//! | `https://drive.x/file/d/{id}/view?...`  | `https://drive.x/uc?export=view&id={id}` |
//! | `https://drive.x/open?id={id}`          | `https://drive.x/uc?export=view&id={id}` |
//! | any link with an `id` query parameter   | `https://drive.x/uc?export=view&id={id}` |
//!
//! Resolution never fails: anything that cannot be rewritten is returned
//! unchanged.

use percent_encoding::percent_decode_str;
use tracing::trace;
use url::Url;

use crate::model::{BackgroundSetting, BackgroundSourceType};

const THUMBNAIL_SIZE: &str = "s500";

/// Which rewrite of a sharing link is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkVariant {
    /// Directly fetchable / playable resource
    DirectView,
    /// Small preview image served by the sharing service
    Thumbnail,
}

type IdExtractor = fn(&Url, &[String]) -> Option<String>;

// Ordered: the first extractor returning an id wins.
const ID_EXTRACTORS: [IdExtractor; 4] = [
    id_from_file_path,
    id_from_open_query,
    id_from_any_query,
    id_from_generic_path,
];

/// Renderable locator for `setting`.
pub fn resolve(setting: &BackgroundSetting) -> String {
    resolve_locator(
        setting.source_type(),
        setting.resource_path(),
        LinkVariant::DirectView,
    )
}

/// Preview locator for `setting`: the thumbnail endpoint for sharing links,
/// the plain resource path otherwise.
pub fn resolve_thumbnail(setting: &BackgroundSetting) -> String {
    resolve_locator(
        setting.source_type(),
        setting.resource_path(),
        LinkVariant::Thumbnail,
    )
}

pub fn resolve_locator(
    source_type: BackgroundSourceType,
    locator: &str,
    variant: LinkVariant,
) -> String {
    if source_type == BackgroundSourceType::Local {
        return locator.to_string();
    }

    let Some(url) = parse_sharing_link(locator) else {
        return locator.to_string();
    };

    match file_id(&url) {
        Some(id) => build_link(&url, &id, variant),
        None => {
            trace!(locator, "No file identifier in sharing link, using it verbatim");
            locator.to_string()
        }
    }
}

/// True when `locator` points at a recognized file-sharing service.
pub fn is_sharing_link(locator: &str) -> bool {
    parse_sharing_link(locator).is_some()
}

/// File identifier embedded in a sharing link, percent-decoded.
pub fn extract_file_id(locator: &str) -> Option<String> {
    parse_sharing_link(locator).and_then(|url| file_id(&url))
}

fn parse_sharing_link(locator: &str) -> Option<Url> {
    let url = Url::parse(locator.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    is_sharing_host(host).then_some(url)
}

fn is_sharing_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    if host == "docs.google.com" {
        return true;
    }
    match host.split_once('.') {
        Some((first, rest)) => first == "drive" && !rest.is_empty(),
        None => false,
    }
}

fn file_id(url: &Url) -> Option<String> {
    let segments: Vec<String> = url
        .path_segments()
        .map(|segs| segs.map(str::to_string).collect())
        .unwrap_or_default();

    ID_EXTRACTORS
        .iter()
        .find_map(|extract| extract(url, &segments))
        .filter(|id| !id.trim().is_empty())
}

/// `/file/d/{id}/...`
fn id_from_file_path(_url: &Url, segments: &[String]) -> Option<String> {
    segments
        .windows(3)
        .find(|w| w[0] == "file" && w[1] == "d" && !w[2].is_empty())
        .and_then(|w| decode_segment(&w[2]))
}

/// `/open?id={id}`
fn id_from_open_query(url: &Url, segments: &[String]) -> Option<String> {
    if segments.last().map(String::as_str) != Some("open") {
        return None;
    }
    query_id(url)
}

/// `...?id={id}` on any path
fn id_from_any_query(url: &Url, _segments: &[String]) -> Option<String> {
    query_id(url)
}

/// `/{parent}/d/{id}` anywhere in the path
fn id_from_generic_path(_url: &Url, segments: &[String]) -> Option<String> {
    segments
        .windows(3)
        .find(|w| !w[0].is_empty() && w[1] == "d" && !w[2].is_empty())
        .and_then(|w| decode_segment(&w[2]))
}

fn query_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

fn build_link(url: &Url, id: &str, variant: LinkVariant) -> String {
    let origin = url.origin().ascii_serialization();
    match variant {
        LinkVariant::DirectView => format!("{origin}/uc?export=view&id={id}"),
        LinkVariant::Thumbnail => format!("{origin}/thumbnail?id={id}&sz={THUMBNAIL_SIZE}"),
    }
}
