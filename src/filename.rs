//! Filename derivation for downloaded media
//!
//! Names come from the last URL path segment when it is usable, otherwise
//! they are synthesized from the response content type. Either way the
//! result is stripped of characters that are unsafe in filenames on common
//! platforms or inside a quoted `Content-Disposition` parameter.

use url::Url;

/// Extension used when the content type is unknown
pub const FALLBACK_EXTENSION: &str = "bin";

/// Stem used when the URL carries no usable filename
pub const FALLBACK_STEM: &str = "download";

/// Substring needles checked against a lowercased content type, in order
const MIME_EXTENSIONS: &[(&[&str], &str)] = &[
    (&["mp4"], "mp4"),
    (&["webm"], "webm"),
    (&["avi", "msvideo"], "avi"),
    (&["mov", "quicktime"], "mov"),
    (&["mkv", "matroska"], "mkv"),
    (&["jpeg", "jpg"], "jpg"),
    (&["png"], "png"),
    (&["gif"], "gif"),
    (&["webp"], "webp"),
    (&["svg"], "svg"),
];

const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Map a content type to a file extension, if recognized
pub fn extension_for_content_type(content_type: Option<&str>) -> Option<&'static str> {
    let ct = content_type?.to_ascii_lowercase();
    MIME_EXTENSIONS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| ct.contains(n)))
        .map(|(_, ext)| *ext)
}

/// Map a file extension back to a content type
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Replace filesystem-unsafe and control characters with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if UNSAFE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Derive a safe download filename from a URL and optional content type
pub fn derive_filename(url: &str, content_type: Option<&str>) -> String {
    let ext = extension_for_content_type(content_type).unwrap_or(FALLBACK_EXTENSION);

    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return format!("{}.{}", FALLBACK_STEM, ext),
    };

    let candidate = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let name = if candidate.is_empty() || candidate.starts_with('.') {
        format!("{}.{}", FALLBACK_STEM, ext)
    } else {
        candidate.to_string()
    };

    let mut name = sanitize_filename(&name);
    if !name.contains('.') {
        name.push('.');
        name.push_str(ext);
    }
    name
}
