//! Extension to MIME type mapping for upload coercion.

/// MIME type the remote store uses for folders.
pub const DRIVE_FOLDER_MIME: &str = "application/vnd.google-apps.folder";

const EXT_MIME_TABLE: &[(&[&str], &str)] = &[
    (&["csv"], "text/csv"),
    (&["html", "htm"], "text/html"),
    (&["txt", "text"], "text/plain"),
    (&["gif"], "image/gif"),
    (&["png"], "image/png"),
    (&["svg"], "image/svg+xml"),
    (&["jpg", "jpeg"], "image/jpeg"),
    (&["odt"], "application/vnd.oasis.opendocument.text"),
    (&["rtf"], "application/rtf"),
    (&["pdf"], "application/pdf"),
    (&["apk"], "application/vnd.android.package-archive"),
    (&["bin"], "application/octet-stream"),
    (
        &["doc", "docx"],
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        &["ppt", "pptx"],
        "application/vnd.openxmlformats-officedocument.wordprocessingml.presentation",
    ),
    (
        &["xls", "xlsx"],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
];

/// Resolves a bare extension (no dot) to a MIME type.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let lowered = ext.to_ascii_lowercase();
    EXT_MIME_TABLE
        .iter()
        .find(|(exts, _)| exts.contains(&lowered.as_str()))
        .map(|(_, mime)| *mime)
}
