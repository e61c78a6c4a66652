use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use base64::Engine;
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};

/// Encode a grayscale image (values in [0, 1]) as a PNG data URL.
pub fn encode_luma_png_data_url(width: u32, height: u32, pixels: &[f32]) -> Result<String> {
    if pixels.len() != (width * height) as usize {
        bail!(
            "pixel buffer length {} does not match image size {}x{}",
            pixels.len(),
            width,
            height
        );
    }

    let encoded: Vec<u8> = pixels.iter().map(|&value| to_byte(value)).collect();
    png_data_url(&encoded, width, height, ColorType::L8)
}

/// Encode an interleaved RGB image (values in [0, 1]) as a PNG data URL.
pub fn encode_rgb_png_data_url(width: u32, height: u32, pixels: &[f32]) -> Result<String> {
    let expected_len = (width * height * 3) as usize;
    if pixels.len() != expected_len {
        bail!(
            "pixel buffer length {} does not match RGB image size {}x{}",
            pixels.len(),
            width,
            height
        );
    }

    let encoded: Vec<u8> = pixels.iter().map(|&value| to_byte(value)).collect();
    png_data_url(&encoded, width, height, ColorType::Rgb8)
}

/// Stretch an activation map to [0, 1]. Constant maps become all zeros.
pub fn normalize_to_unit(values: &[f32]) -> Vec<f32> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    if !range.is_finite() || range <= f32::EPSILON {
        return vec![0.0; values.len()];
    }
    values.iter().map(|&v| (v - min) / range).collect()
}

/// Embed an image file from disk as a data URL, keeping its original encoding.
pub fn encode_file_data_url(path: &Path) -> Result<String> {
    let mime = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        other => bail!(
            "unsupported image extension {:?} for {}",
            other,
            path.display()
        ),
    };

    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let base64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{base64}"))
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn png_data_url(encoded: &[u8], width: u32, height: u32, color: ColorType) -> Result<String> {
    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(&mut buffer);
    encoder
        .write_image(encoded, width, height, color)
        .context("failed to encode PNG data")?;

    let base64 = base64::engine::general_purpose::STANDARD.encode(&buffer);
    Ok(format!("data:image/png;base64,{base64}"))
}
