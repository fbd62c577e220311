//! Upload validation for file-bearing endpoints.
//!
//! Files are checked locally (existence, readability, size ceiling, format allow-list) but never
//! buffered: the transport streams them from disk when the request is sent.

use crate::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Per-capability upload constraints.
#[derive(Debug, Clone, Copy)]
pub struct FileRules {
    pub label: &'static str,
    pub max_bytes: u64,
    /// Accepted lowercase file extensions.
    pub extensions: &'static [&'static str],
    /// Accepted MIME types when the format is detected from content.
    pub mime_types: &'static [&'static str],
    /// Reject files whose detected content contradicts the allow-list.
    pub strict_content: bool,
}

pub const AUDIO_UPLOAD: FileRules = FileRules {
    label: "audio",
    max_bytes: 25 * 1024 * 1024,
    extensions: &[
        "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
    ],
    mime_types: &[
        "audio/x-flac",
        "audio/flac",
        "audio/m4a",
        "audio/x-m4a",
        "audio/mp4",
        "audio/mpeg",
        "audio/ogg",
        "audio/x-wav",
        "audio/wav",
        "audio/webm",
        "video/mp4",
        "video/mpeg",
        "video/webm",
    ],
    strict_content: false,
};

pub const PNG_UPLOAD: FileRules = FileRules {
    label: "PNG image",
    max_bytes: 4 * 1024 * 1024,
    extensions: &["png"],
    mime_types: &["image/png"],
    strict_content: true,
};

/// A validated upload, ready to be streamed as one multipart part.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// Multipart field name (`file`, `image`, `mask`).
    pub field: String,
    pub path: PathBuf,
    /// File name sent to the remote side; carries a canonical extension.
    pub file_name: String,
    pub mime: Option<String>,
    pub size: u64,
}

const SNIFF_LEN: usize = 64;

/// Validate `path` against `rules` and describe it as a multipart part named `field`.
pub fn validate_upload(field: &str, path: &Path, rules: &FileRules) -> Result<FilePart> {
    let display = path.display().to_string();
    let meta = std::fs::metadata(path)
        .map_err(|e| Error::file_validation(&display, format!("file is not accessible: {}", e)))?;
    if !meta.is_file() {
        return Err(Error::file_validation(&display, "path is not a regular file"));
    }
    let size = meta.len();
    if size == 0 {
        return Err(Error::file_validation(&display, "file is empty"));
    }
    if size > rules.max_bytes {
        return Err(Error::file_validation(
            &display,
            format!(
                "{} files must be at most {} bytes, got {}",
                rules.label, rules.max_bytes, size
            ),
        ));
    }

    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)
        .and_then(|f| f.take(SNIFF_LEN as u64).read_to_end(&mut head))
        .map_err(|e| Error::file_validation(&display, format!("file is not readable: {}", e)))?;
    let sniffed = infer::get(&head);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let mut file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(field)
        .to_string();

    let mime = match extension.as_deref() {
        Some(ext) if rules.extensions.contains(&ext) => {
            if rules.strict_content {
                if let Some(kind) = sniffed {
                    if !rules.mime_types.contains(&kind.mime_type()) {
                        return Err(Error::file_validation(
                            &display,
                            format!(
                                "content is {}, expected {}",
                                kind.mime_type(),
                                rules.label
                            ),
                        ));
                    }
                }
            }
            mime_guess::from_path(path)
                .first_raw()
                .map(str::to_string)
                .or_else(|| sniffed.map(|k| k.mime_type().to_string()))
        }
        Some(ext) => {
            return Err(Error::file_validation(
                &display,
                format!(
                    "unsupported {} format '.{}'; allowed: {}",
                    rules.label,
                    ext,
                    rules.extensions.join(", ")
                ),
            ));
        }
        None => match sniffed {
            Some(kind) if rules.mime_types.contains(&kind.mime_type()) => {
                file_name = format!("{}.{}", file_name, kind.extension());
                Some(kind.mime_type().to_string())
            }
            Some(kind) => {
                return Err(Error::file_validation(
                    &display,
                    format!("content is {}, expected {}", kind.mime_type(), rules.label),
                ));
            }
            None => {
                return Err(Error::file_validation(
                    &display,
                    format!(
                        "cannot determine file format; use one of: {}",
                        rules.extensions.join(", ")
                    ),
                ));
            }
        },
    };

    Ok(FilePart {
        field: field.to_string(),
        path: path.to_path_buf(),
        file_name,
        mime,
        size,
    })
}
