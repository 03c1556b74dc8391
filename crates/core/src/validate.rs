//! Input validation for trim fields, URLs and local media files.
//!
//! Everything here is a pure predicate. Failures are reported as
//! field-scoped [`ValidationError`]s and never terminate a conversion; the
//! caller simply does not start one until the fields are fixed.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::parse_time;
use crate::transcoder::Bitrate;

/// MIME types accepted for local uploads.
pub const ACCEPTED_VIDEO_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
    "video/3gpp",
];

/// File extensions accepted for local uploads when the MIME type is missing or unknown.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".ogg", ".mov", ".avi", ".mkv", ".3gp"];

/// Extensions that mark a URL as a direct media link (hinting only).
pub const DIRECT_MEDIA_EXTENSIONS: &[&str] = &[
    ".mp4", ".webm", ".ogg", ".mov", ".avi", ".mkv", ".3gp", ".m4v", ".flv", ".wmv",
];

/// Default size above which an input triggers the large-file advisory.
pub const DEFAULT_LARGE_INPUT_THRESHOLD_MB: u64 = 300;

/// A single validation failure. The display text is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("enter a valid time in mm:ss format (e.g. 0:30)")]
    StartTimeFormat,

    #[error("enter a valid duration in mm:ss format (e.g. 2:00)")]
    DurationFormat,

    #[error("duration must be greater than zero")]
    DurationNotPositive,

    #[error("select a valid bitrate")]
    Bitrate,

    #[error("Please enter a URL")]
    UrlEmpty,

    #[error("Please enter a valid URL")]
    UrlInvalid,

    #[error("URL must start with http:// or https://")]
    UrlScheme,
}

/// Form fields that can carry a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Bitrate,
    StartTime,
    Duration,
}

/// Field-keyed validation result. A missing key means the field is valid.
pub type FieldErrors = BTreeMap<Field, ValidationError>;

/// Raw trim input as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimFields {
    pub start_time: String,
    pub duration: String,
}

impl TrimFields {
    pub fn new(start_time: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            start_time: start_time.into(),
            duration: duration.into(),
        }
    }
}

/// Metadata describing a local file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Original file name, without directories.
    pub name: String,
    /// Reported MIME type, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// Validates the optional trim fields.
///
/// Empty fields are fine. A zero start time is valid, a zero duration is not.
pub fn validate_trim(fields: &TrimFields) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if !fields.start_time.trim().is_empty() && parse_time(&fields.start_time).is_none() {
        errors.insert(Field::StartTime, ValidationError::StartTimeFormat);
    }

    if !fields.duration.trim().is_empty() {
        match parse_time(&fields.duration) {
            None => {
                errors.insert(Field::Duration, ValidationError::DurationFormat);
            }
            Some(0) => {
                errors.insert(Field::Duration, ValidationError::DurationNotPositive);
            }
            Some(_) => {}
        }
    }

    errors
}

/// True iff [`validate_trim`] reports nothing.
pub fn is_trim_valid(fields: &TrimFields) -> bool {
    validate_trim(fields).is_empty()
}

/// Validates the whole option form: bitrate plus trim fields.
pub fn validate_convert_fields(bitrate: &str, trim: &TrimFields) -> FieldErrors {
    let mut errors = validate_trim(trim);
    if bitrate.trim().parse::<Bitrate>().is_err() {
        errors.insert(Field::Bitrate, ValidationError::Bitrate);
    }
    errors
}

/// Accepts a file if either its MIME type or its extension is on the allow-list.
pub fn is_accepted_media_input(file: &FileMeta) -> bool {
    if let Some(mime) = file.mime.as_deref() {
        if ACCEPTED_VIDEO_TYPES.contains(&mime) {
            return true;
        }
    }

    match file.name.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = format!(".{}", ext.to_lowercase());
            ACCEPTED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Advisory check only; large inputs are still converted.
pub fn is_large_input(file: &FileMeta, threshold_mb: u64) -> bool {
    file.size_bytes > threshold_mb.saturating_mul(1024 * 1024)
}

/// Heuristic: does the URL path end in a known media extension?
pub fn is_direct_media_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            let path = parsed.path().to_lowercase();
            DIRECT_MEDIA_EXTENSIONS
                .iter()
                .any(|ext| path.ends_with(ext))
        }
        Err(_) => false,
    }
}

/// Checks that `url` is a parsable `http` or `https` URL.
pub fn validate_url(url: &str) -> Result<Url, ValidationError> {
    if url.trim().is_empty() {
        return Err(ValidationError::UrlEmpty);
    }

    let parsed = Url::parse(url).map_err(|_| ValidationError::UrlInvalid)?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(ValidationError::UrlScheme),
    }
}

/// Human readable byte count (`1536` -> `1.5 KB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, UNITS[unit])
    } else {
        format!("{:.1} {}", rounded, UNITS[unit])
    }
}

/// Replaces the final extension of `name` with `.mp3`.
pub fn output_filename(name: &str) -> String {
    let base = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    format!("{}.mp3", base)
}

/// Extension used for the engine's virtual input file, `mp4` when absent.
pub fn input_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "mp4".to_string())
}
