//! Storage paths and public URLs for uploaded files.

use crate::constants::folders;

/// Folder a post attachment is uploaded to
pub fn media_folder(is_image: bool) -> &'static str {
    if is_image {
        folders::POST_IMAGES
    } else {
        folders::POST_VIDEOS
    }
}

/// `/<folder>/<unix-millis>.<ext>`; images are stored as png, videos as mp4
pub fn storage_path(folder: &str, is_image: bool, timestamp_ms: u64) -> String {
    let ext = if is_image { "png" } else { "mp4" };
    format!("/{}/{}.{}", folder, timestamp_ms, ext)
}

/// Public URL of a stored file. Empty paths resolve to nothing so the UI can
/// fall back to its default avatar.
pub fn public_url(base_url: &str, bucket: &str, path: &str) -> Option<String> {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return None;
    }
    Some(format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        path
    ))
}
