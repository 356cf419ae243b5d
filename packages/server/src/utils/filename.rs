use thiserror::Error;

/// Longest accepted upload filename, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Why an uploaded document name was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("Filename cannot be empty")]
    Empty,
    #[error("Filename exceeds {MAX_FILENAME_LEN} bytes")]
    TooLong,
    #[error("Invalid filename: path separators are not allowed")]
    PathSeparator,
    #[error("Invalid filename: '..' is not allowed")]
    Traversal,
    #[error("Invalid filename: control characters are not allowed")]
    ControlCharacter,
    #[error("Invalid filename: hidden files (starting with '.') are not allowed")]
    Hidden,
}

/// Validate a client-supplied document name, returning it trimmed.
///
/// Control characters are rejected because the name is echoed back in a
/// `Content-Disposition` header.
pub fn validate_document_filename(filename: &str) -> Result<&str, FilenameError> {
    let name = filename.trim();

    if name.is_empty() {
        return Err(FilenameError::Empty);
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(FilenameError::TooLong);
    }
    if name.chars().any(char::is_control) {
        return Err(FilenameError::ControlCharacter);
    }
    if name.contains(['/', '\\']) {
        return Err(FilenameError::PathSeparator);
    }
    if name == ".." {
        return Err(FilenameError::Traversal);
    }
    if name.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    Ok(name)
}

/// Content type for a stored document: the client's declaration when it is
/// specific, otherwise a guess from the extension.
pub fn resolve_content_type(filename: &str, declared: Option<&str>) -> String {
    match declared {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// `Content-Disposition` value for downloading a validated filename.
///
/// Non-ASCII names get an ASCII fallback plus an RFC 5987 `filename*`.
pub fn attachment_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            ' ' => ' ',
            '"' | ';' | '\\' => '_',
            c if c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();

    if fallback == filename {
        return format!("attachment; filename=\"{fallback}\"");
    }

    let mut encoded = String::with_capacity(filename.len() * 3);
    for b in filename.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{b:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
