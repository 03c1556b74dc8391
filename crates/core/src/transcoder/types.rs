//! Types for the transcoder module.

use std::fmt;
use std::num::NonZeroU64;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ErrorKind;
use crate::output::OutputResource;
use crate::time::parse_time;
use crate::validate::{validate_convert_fields, FieldErrors, FileMeta, TrimFields, ValidationError};

/// Constant MP3 bitrates offered to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Bitrate {
    Kbps128,
    #[default]
    Kbps192,
    Kbps256,
    Kbps320,
}

impl Bitrate {
    /// Every bitrate, lowest first.
    pub const ALL: [Bitrate; 4] = [
        Bitrate::Kbps128,
        Bitrate::Kbps192,
        Bitrate::Kbps256,
        Bitrate::Kbps320,
    ];

    /// Kilobits per second.
    pub fn kbps(self) -> u32 {
        match self {
            Self::Kbps128 => 128,
            Self::Kbps192 => 192,
            Self::Kbps256 => 256,
            Self::Kbps320 => 320,
        }
    }

    /// Label for option pickers, e.g. `192 kbps`.
    pub fn label(self) -> String {
        format!("{} kbps", self.kbps())
    }
}

impl TryFrom<u32> for Bitrate {
    type Error = ValidationError;

    fn try_from(kbps: u32) -> Result<Self, Self::Error> {
        match kbps {
            128 => Ok(Self::Kbps128),
            192 => Ok(Self::Kbps192),
            256 => Ok(Self::Kbps256),
            320 => Ok(Self::Kbps320),
            _ => Err(ValidationError::Bitrate),
        }
    }
}

impl From<Bitrate> for u32 {
    fn from(bitrate: Bitrate) -> Self {
        bitrate.kbps()
    }
}

impl FromStr for Bitrate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map_err(|_| ValidationError::Bitrate)
            .and_then(Bitrate::try_from)
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kbps())
    }
}

/// Options for one conversion. Immutable once a conversion starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOptions {
    pub bitrate: Bitrate,
    /// Downmix to a single channel.
    pub mono: bool,
    /// Offset into the input, in whole seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_secs: Option<u64>,
    /// Length of the exported segment, in whole seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<NonZeroU64>,
}

impl ConvertOptions {
    pub fn new(bitrate: Bitrate) -> Self {
        Self {
            bitrate,
            ..Default::default()
        }
    }

    pub fn with_mono(mut self, mono: bool) -> Self {
        self.mono = mono;
        self
    }

    pub fn with_start_time(mut self, secs: u64) -> Self {
        self.start_time_secs = Some(secs);
        self
    }

    pub fn with_duration(mut self, secs: NonZeroU64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Builds options from raw form fields (`"192"`, `"1:30"`, ...).
    ///
    /// Empty trim fields mean "not set". Returns every field error at once.
    pub fn from_fields(bitrate: &str, mono: bool, trim: &TrimFields) -> Result<Self, FieldErrors> {
        let errors = validate_convert_fields(bitrate, trim);
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut options = Self::new(bitrate.trim().parse().unwrap_or_default()).with_mono(mono);
        if let Some(secs) = parse_time(&trim.start_time) {
            options = options.with_start_time(secs);
        }
        if let Some(secs) = parse_time(&trim.duration).and_then(NonZeroU64::new) {
            options = options.with_duration(secs);
        }
        Ok(options)
    }

    /// Engine invocation list, in the order the engine expects:
    /// `[-ss s] -i input [-t s] -vn -c:a libmp3lame -b:a <kbps>k [-ac 1] output`.
    pub fn engine_args(&self, input_name: &str, output_name: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(14);

        if let Some(start) = self.start_time_secs {
            args.extend(["-ss".to_string(), start.to_string()]);
        }

        args.extend(["-i".to_string(), input_name.to_string()]);

        if let Some(duration) = self.duration_secs {
            args.extend(["-t".to_string(), duration.to_string()]);
        }

        args.push("-vn".to_string());
        args.extend(["-c:a".to_string(), "libmp3lame".to_string()]);
        args.extend(["-b:a".to_string(), format!("{}k", self.bitrate.kbps())]);

        if self.mono {
            args.extend(["-ac".to_string(), "1".to_string()]);
        }

        args.push(output_name.to_string());
        args
    }
}

/// Where the transcoder is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionState {
    #[default]
    Idle,
    Loading,
    Ready,
    Converting,
    Done,
    Error,
}

impl ConversionState {
    /// Work is in progress; reset must not be offered.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Loading | Self::Ready | Self::Converting)
    }

    /// Only reset leaves this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Converting => "converting",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A file supplied by the user, already read into memory.
#[derive(Debug, Clone)]
pub struct LocalInput {
    pub meta: FileMeta,
    pub bytes: Vec<u8>,
}

impl LocalInput {
    pub fn new(name: impl Into<String>, mime: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            meta: FileMeta {
                name: name.into(),
                mime,
                size_bytes: bytes.len() as u64,
            },
            bytes,
        }
    }

    /// Reads a file from disk. The MIME type is left unknown, so acceptance
    /// falls back to the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, None, bytes))
    }
}

/// Change notification published by the transcoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TranscoderUpdate {
    State(ConversionState),
    Progress(u8),
    Status(String),
    Log(String),
}

/// Point-in-time view of everything a presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscoderSnapshot {
    pub state: ConversionState,
    /// Whole percent, `0..=100`.
    pub progress: u8,
    pub status_text: String,
    pub logs: Vec<String>,
    pub output: Option<OutputResource>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
}
