//! File name helpers for outbound messages.

use crate::types::DEFAULT_CONTENT_TYPE;

/// Return the extension of a file name (without the dot).
///
/// Returns `None` for a missing name, a name without a dot, or a name ending
/// in a dot.
pub fn file_extension(file_name: Option<&str>) -> Option<&str> {
    let name = file_name?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Infer a content type from a file name's extension.
///
/// The extension is matched case-insensitively; unknown or missing
/// extensions map to [`DEFAULT_CONTENT_TYPE`].
pub fn content_type_for(file_name: Option<&str>) -> String {
    file_extension(file_name)
        .and_then(|ext| mime_guess::from_ext(&ext.to_lowercase()).first_raw())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension(Some("report.pdf")), Some("pdf"));
        assert_eq!(file_extension(Some("archive.tar.gz")), Some("gz"));
        assert_eq!(file_extension(Some(".profile")), Some("profile"));
        assert_eq!(file_extension(Some("README")), None);
        assert_eq!(file_extension(Some("trailing.")), None);
        assert_eq!(file_extension(Some("")), None);
        assert_eq!(file_extension(None), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Some("notes.txt")), "text/plain");
        assert_eq!(content_type_for(Some("SCAN.PDF")), "application/pdf");
        assert_eq!(content_type_for(Some("photo.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Some("blob.zzzunknown")), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for(Some("README")), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for(None), DEFAULT_CONTENT_TYPE);
    }
}
