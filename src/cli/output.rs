//! Output helpers for the command-line front end.

use std::path::Path;

use serde::Serialize;

use crate::error::MantisError;

/// Fallback MIME type for unknown extensions.
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Renders a value as JSON indented by two spaces.
///
/// # Errors
///
/// Returns `MantisError::Serialization` if the value cannot be serialized.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String, MantisError> {
    serde_json::to_string_pretty(value).map_err(MantisError::Serialization)
}

/// Prints a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), MantisError> {
    println!("{}", render_json(value)?);
    Ok(())
}

/// Guesses a MIME type from a file's extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("txt" | "log" | "md") => "text/plain",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz" | "tgz") => "application/gzip",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => DEFAULT_MIME_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type(Path::new("report.PDF")), "application/pdf");
        assert_eq!(guess_mime_type(Path::new("/tmp/trace.log")), "text/plain");
        assert_eq!(guess_mime_type(Path::new("shot.jpeg")), "image/jpeg");
    }

    #[test]
    fn test_guess_mime_type_fallback() {
        assert_eq!(guess_mime_type(Path::new("core")), DEFAULT_MIME_TYPE);
        assert_eq!(guess_mime_type(Path::new("data.unknownext")), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_render_json_indents_two_spaces() {
        let rendered = render_json(&serde_json::json!({"id": 1})).unwrap();
        assert_eq!(rendered, "{\n  \"id\": 1\n}");
    }
}
