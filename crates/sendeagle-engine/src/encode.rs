use anyhow::{anyhow, bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use img_parts::jpeg::Jpeg;
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageEXIF};
use sendeagle_contracts::params::{OutputFormat, RequestParams};
use serde_json::{Map, Value};

use crate::exif::{build_exif, JPEG_MAX_TIFF_LEN};

const PNG_PROMPT_KEYWORD: &str = "prompt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub format: OutputFormat,
    pub quality: u8,
    pub lossless_webp: bool,
}

impl EncodeOptions {
    pub fn from_params(params: &RequestParams) -> Self {
        Self {
            format: params.format,
            quality: params.quality(),
            lossless_webp: params.lossless_webp,
        }
    }
}

/// Metadata carried into the encoded file.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedMetadata<'a> {
    pub prompt: Option<&'a Value>,
    pub extra_pnginfo: Option<&'a Map<String, Value>>,
    pub annotation: &'a str,
}

impl<'a> EmbeddedMetadata<'a> {
    pub fn new(params: &'a RequestParams, annotation: &'a str) -> Self {
        Self {
            prompt: params.prompt.as_ref(),
            extra_pnginfo: params.extra_pnginfo.as_ref(),
            annotation,
        }
    }
}

/// Converts host `[0,1]` float pixels (row-major, RGB) to 8-bit.
pub fn rgb_from_unit_floats(width: u32, height: u32, pixels: &[f32]) -> Result<RgbImage> {
    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        bail!(
            "pixel buffer has {} values, expected {expected} for {width}x{height}x3",
            pixels.len()
        );
    }
    let data = pixels
        .iter()
        .map(|value| (value * 255.0).clamp(0.0, 255.0) as u8)
        .collect::<Vec<u8>>();
    RgbImage::from_raw(width, height, data).context("pixel buffer does not fit image dimensions")
}

pub fn encode_image(
    image: &RgbImage,
    options: &EncodeOptions,
    metadata: &EmbeddedMetadata<'_>,
) -> Result<Vec<u8>> {
    match options.format {
        OutputFormat::Png => encode_png(image, metadata),
        OutputFormat::Webp => {
            let exif = exif_for(metadata, None)?;
            encode_webp(image, options.quality, options.lossless_webp, exif)
        }
        OutputFormat::Jpeg => {
            let exif = exif_for(metadata, Some(JPEG_MAX_TIFF_LEN))?;
            encode_jpeg(image, options.quality, exif)
        }
    }
}

fn encode_png(image: &RgbImage, metadata: &EmbeddedMetadata<'_>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Default);
        for (keyword, text) in png_text_chunks(metadata)? {
            encoder
                .add_text_chunk(keyword.clone(), text)
                .with_context(|| format!("png text chunk '{keyword}' rejected"))?;
        }
        let mut writer = encoder.write_header().context("png header write failed")?;
        writer
            .write_image_data(image.as_raw())
            .context("png image data write failed")?;
        writer.finish().context("png finish failed")?;
    }
    Ok(out)
}

/// `prompt` first, then one chunk per extra-metadata key, values as ASCII
/// JSON. Keys that are not valid PNG keywords are skipped.
fn png_text_chunks(metadata: &EmbeddedMetadata<'_>) -> Result<Vec<(String, String)>> {
    let mut chunks = Vec::new();
    if let Some(prompt) = metadata.prompt {
        chunks.push((PNG_PROMPT_KEYWORD.to_string(), ascii_json(prompt)?));
    }
    if let Some(extra) = metadata.extra_pnginfo {
        for (key, value) in extra {
            if !is_png_keyword(key) {
                tracing::warn!(key = %key, "skipping extra metadata key that is not a valid PNG keyword");
                continue;
            }
            chunks.push((key.clone(), ascii_json(value)?));
        }
    }
    Ok(chunks)
}

fn is_png_keyword(key: &str) -> bool {
    (1..=79).contains(&key.len())
        && key
            .chars()
            .all(|ch| matches!(ch as u32, 0x20..=0x7E | 0xA1..=0xFF))
        && !key.starts_with(' ')
        && !key.ends_with(' ')
        && !key.contains("  ")
}

/// EXIF with the metadata JSON as ImageDescription and the annotation as
/// UserComment. Under `limit`, a description that would not fit is dropped
/// with a warning; a blob still over the limit is an error.
fn exif_for(metadata: &EmbeddedMetadata<'_>, limit: Option<usize>) -> Result<Vec<u8>> {
    let mut payload = Map::new();
    if let Some(prompt) = metadata.prompt {
        payload.insert(PNG_PROMPT_KEYWORD.to_string(), prompt.clone());
    }
    if let Some(extra) = metadata.extra_pnginfo {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }
    let mut description = if payload.is_empty() {
        None
    } else {
        Some(ascii_json(&Value::Object(payload))?)
    };
    let Some(limit) = limit else {
        return build_exif(description.as_deref(), metadata.annotation);
    };
    let comment_len = 8 + metadata.annotation.encode_utf16().count() * 2;
    if comment_len >= limit {
        bail!("EXIF data too long ({comment_len} bytes of annotation, limit {limit})");
    }

    if description.as_ref().is_some_and(|text| text.len() >= limit) {
        tracing::warn!(
            bytes = description.as_ref().map_or(0, String::len),
            limit,
            "metadata JSON does not fit in EXIF; writing annotation only"
        );
        description = None;
    }
    let mut exif = build_exif(description.as_deref(), metadata.annotation)?;
    if exif.len() > limit && description.is_some() {
        tracing::warn!(
            bytes = exif.len(),
            limit,
            "metadata JSON does not fit in EXIF; writing annotation only"
        );
        exif = build_exif(None, metadata.annotation)?;
    }
    if exif.len() > limit {
        bail!("EXIF data too long ({} bytes, limit {limit})", exif.len());
    }
    Ok(exif)
}

fn encode_webp(image: &RgbImage, quality: u8, lossless: bool, exif: Vec<u8>) -> Result<Vec<u8>> {
    let encoded = webp::Encoder::from_rgb(image.as_raw(), image.width(), image.height())
        .encode_simple(lossless, f32::from(quality))
        .map_err(|err| anyhow!("webp encode failed: {err:?}"))?;
    let mut container = WebP::from_bytes(Bytes::copy_from_slice(&encoded))
        .map_err(|err| anyhow!("encoded webp could not be parsed: {err}"))?;
    container.set_exif(Some(Bytes::from(exif)));
    Ok(container.encoder().bytes().to_vec())
}

/// The JPEG encoder has no optimize knob; quality drives the output.
fn encode_jpeg(image: &RgbImage, quality: u8, exif: Vec<u8>) -> Result<Vec<u8>> {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .context("jpeg encode failed")?;
    let mut container = Jpeg::from_bytes(Bytes::from(encoded))
        .map_err(|err| anyhow!("encoded jpeg could not be parsed: {err}"))?;
    container.set_exif(Some(Bytes::from(exif)));
    Ok(container.encoder().bytes().to_vec())
}

/// JSON with every non-ASCII character escaped as `\uXXXX`, so it fits
/// Latin-1 text chunks and ASCII EXIF fields unchanged.
fn ascii_json(value: &Value) -> Result<String> {
    let raw = serde_json::to_string(value)?;
    let mut out = String::with_capacity(raw.len());
    let mut units = [0u16; 2];
    for ch in raw.chars() {
        if ch.is_ascii() {
            out.push(ch);
            continue;
        }
        for unit in ch.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{unit:04x}"));
        }
    }
    Ok(out)
}
