//! Display titles and placeholders for new conversations.

/// Maximum title length in characters before truncation.
pub const MAX_TITLE_CHARS: usize = 48;

/// Appended to a truncated title.
pub const ELLIPSIS: char = '…';

/// Title used when there is neither text nor uploads.
pub const DEFAULT_TITLE: &str = "New conversation";

/// Derive a display title from the submitted text and uploads.
///
/// Non-empty text wins and is cut to [`MAX_TITLE_CHARS`] characters plus
/// [`ELLIPSIS`]. Otherwise the upload count is described, and with neither
/// the [`DEFAULT_TITLE`] is returned.
pub fn derive_title<T>(content: &str, uploads: &[T]) -> String {
    let content = content.trim();
    if !content.is_empty() {
        return truncate_chars(content, MAX_TITLE_CHARS);
    }
    if !uploads.is_empty() {
        return upload_placeholder(uploads.len());
    }
    DEFAULT_TITLE.to_string()
}

/// `"Uploaded 1 file"` / `"Uploaded {n} files"`.
pub fn upload_placeholder(count: usize) -> String {
    if count == 1 {
        "Uploaded 1 file".to_string()
    } else {
        format!("Uploaded {count} files")
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => {
            let mut out = text[..byte_idx].to_string();
            out.push(ELLIPSIS);
            out
        }
        None => text.to_string(),
    }
}
