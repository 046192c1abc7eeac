mod annotation;
mod extractor;

pub use annotation::format_annotation;
pub use extractor::MetadataExtractor;

/// Normalized generation parameters for one image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationInfo {
    pub model_name: String,
    pub seed: u64,
    pub steps: u64,
    pub width: u32,
    pub height: u32,
    pub positive: String,
    pub negative: String,
}
