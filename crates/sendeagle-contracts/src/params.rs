use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::tags::TagPolicy;

pub const DEFAULT_FILENAME_TEMPLATE: &str = "{model}-{seed}";
pub const DEFAULT_COMPRESSION: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Webp,
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported output format '{0}' (expected webp, png or jpeg)")]
pub struct FormatError(pub String);

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::Webp),
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            _ => Err(FormatError(raw.to_string())),
        }
    }
}

/// Options for one invocation of the save step.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParams {
    pub format: OutputFormat,
    /// Quality for lossy WebP and JPEG, 1..=100.
    pub compression: u8,
    pub lossless_webp: bool,
    pub save_tags: TagPolicy,
    pub filename_template: String,
    /// Eagle folder name or id; empty means no folder.
    pub eagle_folder: String,
    pub preview: bool,
    pub save_only: bool,
    pub memo_text: String,
    pub positive: String,
    pub negative: String,
    /// Raw host prompt graph, embedded verbatim in saved files.
    pub prompt: Option<Value>,
    pub extra_pnginfo: Option<Map<String, Value>>,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            compression: DEFAULT_COMPRESSION,
            lossless_webp: true,
            save_tags: TagPolicy::None,
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            eagle_folder: String::new(),
            preview: true,
            save_only: false,
            memo_text: String::new(),
            positive: String::new(),
            negative: String::new(),
            prompt: None,
            extra_pnginfo: None,
        }
    }
}

impl RequestParams {
    pub fn quality(&self) -> u8 {
        self.compression.clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::{OutputFormat, RequestParams};

    #[test]
    fn output_format_parses_aliases() {
        assert_eq!("WEBP".parse::<OutputFormat>(), Ok(OutputFormat::Webp));
        assert_eq!(" png ".parse::<OutputFormat>(), Ok(OutputFormat::Png));
        assert_eq!("jpg".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        let err = "gif".parse::<OutputFormat>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported output format 'gif' (expected webp, png or jpeg)"
        );
    }

    #[test]
    fn defaults_match_host_widget_defaults() {
        let params = RequestParams::default();
        assert_eq!(params.format, OutputFormat::Webp);
        assert_eq!(params.compression, 90);
        assert!(params.lossless_webp);
        assert!(params.preview);
        assert!(!params.save_only);
        assert_eq!(params.filename_template, "{model}-{seed}");
    }

    #[test]
    fn quality_is_clamped() {
        let mut params = RequestParams {
            compression: 0,
            ..RequestParams::default()
        };
        assert_eq!(params.quality(), 1);
        params.compression = 255;
        assert_eq!(params.quality(), 100);
    }
}
