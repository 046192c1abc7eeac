use std::env;
use std::path::PathBuf;

pub const EAGLE_SERVER_URL_ENV: &str = "EAGLE_SERVER_URL";
pub const HOST_URL_ENV: &str = "EAGLE_COMFYUI_URL";
pub const DEFAULT_EAGLE_SERVER_URL: &str = "http://localhost:41595";
pub const DEFAULT_HOST_URL: &str = "http://localhost:8188";

/// Service addresses and output root for one save step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEagleConfig {
    pub output_dir: PathBuf,
    /// Eagle API base; may embed `user:pass@` for basic auth.
    pub eagle_server_url: String,
    /// Base of the host's `/api/view` endpoint that Eagle pulls images from.
    pub host_url: String,
}

impl SendEagleConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            eagle_server_url: DEFAULT_EAGLE_SERVER_URL.to_string(),
            host_url: DEFAULT_HOST_URL.to_string(),
        }
    }

    pub fn from_env(output_dir: impl Into<PathBuf>) -> Self {
        Self::from_lookup(output_dir, |key| env::var(key).ok())
    }

    pub fn from_lookup(
        output_dir: impl Into<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            eagle_server_url: normalize_base(lookup(EAGLE_SERVER_URL_ENV), DEFAULT_EAGLE_SERVER_URL),
            host_url: normalize_base(lookup(HOST_URL_ENV), DEFAULT_HOST_URL),
        }
    }
}

fn normalize_base(raw: Option<String>, default: &str) -> String {
    raw.map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
