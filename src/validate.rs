//! Validation and sanitization of archive metadata values.

/// Characters that are rejected in archive names.
const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Validate an ISO 639-3 language code: exactly three ASCII letters.
pub fn is_valid_language_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Validate an archive name for use as a filesystem entry.
pub fn is_valid_archive_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(INVALID_NAME_CHARS)
}

/// Sanitize an archive name: spaces become hyphens, invalid characters are dropped.
pub fn sanitize_archive_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| !INVALID_NAME_CHARS.contains(c))
        .collect()
}
