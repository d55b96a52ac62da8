//! The AVIF pipeline.
//!
//! AVIF files carry renderable pixel data directly, so they skip the whole
//! probe → select → extract machinery: decode in-process, apply the
//! container's rotation, re-encode to the configured output format at the
//! configured quality, and bound the result. One file read, zero
//! subprocesses.
//!
//! Detection is a header sniff (ISO BMFF `ftyp` box with an `avif`/`avis`
//! brand), not an extension check — RAW files are routinely misnamed,
//! AVIF files less so, but the bytes are authoritative either way.

use super::avif_decode;
use super::normalize::{self, NormalizeError, PreviewImage};
use crate::config::{PreviewFormat, QualitySettings};
use image::DynamicImage;
use std::fs;
use std::path::Path;

/// Bytes of file header examined for the `ftyp` brand and `irot` box.
const HEADER_SNIFF_LEN: usize = 512;

/// Does this file look like an AVIF image?
pub fn is_avif(path: &Path) -> bool {
    let Ok(header) = read_header(path) else {
        return false;
    };
    sniff_avif(&header)
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut file = fs::File::open(path)?;
    let mut header = vec![0u8; HEADER_SNIFF_LEN];
    let n = file.read(&mut header)?;
    header.truncate(n);
    Ok(header)
}

fn sniff_avif(header: &[u8]) -> bool {
    header.len() >= 12
        && &header[4..8] == b"ftyp"
        && matches!(&header[8..12], b"avif" | b"avis")
}

/// Quarter turns (counter-clockwise) from the container's `irot` property,
/// read from the file header. 0 when absent.
fn irot_quarter_turns(header: &[u8]) -> u8 {
    header
        .windows(4)
        .position(|w| w == b"irot")
        .and_then(|pos| header.get(pos + 4))
        .map(|byte| byte & 0x03)
        .unwrap_or(0)
}

fn apply_irot(image: DynamicImage, quarter_turns: u8) -> DynamicImage {
    match quarter_turns {
        1 => image.rotate270(),
        2 => image.rotate180(),
        3 => image.rotate90(),
        _ => image,
    }
}

/// Produce a bounded preview from an AVIF file.
///
/// Decode → orient → re-encode at the configured format/quality → reload →
/// downscale-to-fit → validate. The encode/reload round trip means the
/// working image the caller receives went through the same representation
/// the host will serve.
pub fn avif_preview(
    path: &Path,
    max_width: u32,
    max_height: u32,
    settings: &QualitySettings,
) -> Result<PreviewImage, NormalizeError> {
    let data = fs::read(path)?;

    let decoded = avif_decode::decode(&data)?;
    let header_len = data.len().min(HEADER_SNIFF_LEN);
    let oriented = apply_irot(decoded, irot_quarter_turns(&data[..header_len]));

    let blob = normalize::encode_image(&oriented, settings)?;
    let reloaded = match settings.format {
        PreviewFormat::Avif => avif_decode::decode(&blob)?,
        _ => normalize::load_oriented_bytes(&blob)?,
    };

    PreviewImage::try_new(normalize::downscale_to_fit(reloaded, max_width, max_height))
}
