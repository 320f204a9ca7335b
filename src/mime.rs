//! MIME type lookup for common static-site file extensions.

/// Look up the MIME type registered for a file extension.
///
/// Extensions are matched without their leading dot and case-insensitively.
/// `None` means the extension is unknown; callers treat such files as HTML,
/// which is also why `html`/`htm` themselves are absent from the table.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "bin" => "application/octet-stream",
        "bmp" => "image/bmp",
        "bz" => "application/x-bzip",
        "bz2" => "application/x-bzip2",
        "pdf" => "application/pdf",
        "css" => "text/css",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "eot" => "application/vnd.ms-fontobject",
        "epub" => "application/epub+zip",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "ics" => "text/calendar",
        "jar" => "application/java-archive",
        "js" => "application/javascript",
        "json" => "application/json",
        "mid" | "midi" => "audio/midi",
        "mpeg" => "video/mpeg",
        "mp4" => "video/mp4",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "odt" => "application/vnd.oasis.opendocument.text",
        "otf" => "font/otf",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "rar" => "application/x-rar-compressed",
        "scss" => "text/x-scss",
        "sh" => "application/x-sh",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "xml" => "application/xml",
        "tif" => "image/tiff",
        "txt" => "text/plain",
        "ts" => "application/typescript",
        "ttf" => "font/ttf",
        "wav" => "audio/x-wav",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime)
}
