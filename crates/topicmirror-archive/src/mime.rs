//! Content-type sniffing.

use std::io::{self, Read, Seek};

/// Bytes inspected to detect a content type.
const SNIFF_LEN: u64 = 8 * 1024;

/// Type of unrecognized binary content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Type of unrecognized UTF-8 content.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Detect the content type of the head of a file.
pub fn detect(head: &[u8]) -> String {
    if let Some(kind) = infer::get(head) {
        return kind.mime_type().to_string();
    }

    match std::str::from_utf8(head) {
        Ok(_) => TEXT_PLAIN.to_string(),
        // A multi-byte character cut by the sniff window is still text
        Err(e) if e.error_len().is_none() => TEXT_PLAIN.to_string(),
        Err(_) => OCTET_STREAM.to_string(),
    }
}

/// Detect the content type of an open handle and rewind it.
pub fn sniff<R: Read + Seek>(reader: &mut R) -> io::Result<String> {
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    reader.by_ref().take(SNIFF_LEN).read_to_end(&mut head)?;
    reader.rewind()?;
    Ok(detect(&head))
}

/// Check if a content type is an image.
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}
