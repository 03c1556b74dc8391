pub mod config;
pub mod engine;
pub mod fetcher;
pub mod metrics;
pub mod output;
pub mod testing;
pub mod time;
pub mod transcoder;
pub mod validate;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, LimitsConfig, OutputConfig,
};
pub use engine::{
    EngineConfig, EngineError, EngineEvent, EngineLoader, EngineSlot, FfmpegEngine, FfmpegLoader,
    TranscodeEngine,
};
pub use fetcher::{FetchConfig, FetchError, FetchedMedia, HttpFetcher, MediaFetcher};
pub use output::{OutputResource, OutputStore, AUDIO_MPEG};
pub use time::{format_time, parse_time};
pub use transcoder::{
    Bitrate, ConversionState, ConvertOptions, ErrorKind, LocalInput, TranscodeError, Transcoder,
    TranscoderSnapshot, TranscoderUpdate,
};
pub use validate::{
    format_bytes, is_accepted_media_input, is_direct_media_url, is_large_input, validate_url,
    FileMeta, TrimFields, ValidationError,
};
