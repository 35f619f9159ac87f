//! Best-effort mime type detection from leading bytes and extension.

use std::path::Path;

const EXTENSIONS: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("gif", "image/gif"),
    ("gz", "application/x-gzip"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("pgm", "image/x-portable-graymap"),
    ("png", "image/png"),
    ("ppm", "image/x-portable-pixmap"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("txt", "text/plain"),
    ("xml", "text/xml"),
    ("zip", "application/zip"),
];

/// Guesses the mime type of a file from its first bytes, falling back to the
/// extension and finally to a text/binary split.
pub fn mime_type(path: &Path, head: &[u8]) -> &'static str {
    if let Some(sniffed) = sniff(head) {
        return sniffed;
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if let Some(ext) = extension
        && let Some((_, mime)) = EXTENSIONS.iter().find(|(e, _)| *e == ext)
    {
        return mime;
    }

    if std::str::from_utf8(head).is_ok() {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

fn sniff(head: &[u8]) -> Option<&'static str> {
    match head {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'P', b'5', ..] => Some("image/x-portable-graymap"),
        [b'P', b'6', ..] => Some("image/x-portable-pixmap"),
        [b'%', b'P', b'D', b'F', ..] => Some("application/pdf"),
        [b'P', b'K', 0x03, 0x04, ..] => Some("application/zip"),
        [0x1F, 0x8B, ..] => Some("application/x-gzip"),
        _ => None,
    }
}
