//! EXIF payload for WebP and JPEG outputs.

use anyhow::{bail, Result};
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;

// as_u8_vec(JPEG) yields [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data];
// img-parts set_exif() takes only the TIFF data.
const JPEG_EXIF_OVERHEAD: usize = 10;

/// Largest TIFF payload a JPEG APP1 segment holds after its `Exif\0\0` header.
pub const JPEG_MAX_TIFF_LEN: usize = u16::MAX as usize - 2 - 6;

const USER_COMMENT_UNICODE_PREFIX: &[u8; 8] = b"UNICODE\0";

/// TIFF payload (no `Exif\0\0` prefix) with `ImageDescription` and a UTF-16LE
/// `UserComment`.
pub fn build_exif(description: Option<&str>, user_comment: &str) -> Result<Vec<u8>> {
    let mut metadata = Metadata::new();
    if let Some(description) = description {
        metadata.set_tag(ExifTag::ImageDescription(description.to_string()));
    }
    metadata.set_tag(ExifTag::UserComment(user_comment_bytes(user_comment)));

    let encoded = metadata.as_u8_vec(FileExtension::JPEG)?;
    if encoded.len() <= JPEG_EXIF_OVERHEAD {
        bail!("EXIF encoder produced no data");
    }
    Ok(encoded[JPEG_EXIF_OVERHEAD..].to_vec())
}

/// Undefined-format UserComment with the `UNICODE` character code so
/// non-ASCII prompts survive.
fn user_comment_bytes(value: &str) -> Vec<u8> {
    let mut bytes = USER_COMMENT_UNICODE_PREFIX.to_vec();
    bytes.extend(value.encode_utf16().flat_map(u16::to_le_bytes));
    bytes
}
