//! Loading the GTSRB directory trees and turning decoded images into [`SignImage`]s.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use image::{imageops::FilterType, DynamicImage};
use tracing::{info, warn};

use crate::dataset::{RawImages, SignImage, IMAGE_SIZE, NUM_CLASSES};

const IMAGE_EXTENSIONS: [&str; 4] = ["ppm", "png", "jpg", "jpeg"];

/// One row of a GTSRB annotation CSV.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub filename: String,
    pub roi: Roi,
    pub class_id: usize,
}

/// Inclusive pixel bounds of the sign inside the source image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Roi {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

/// Parse `Filename;Width;Height;Roi.X1;Roi.Y1;Roi.X2;Roi.Y2;ClassId` rows after a header line.
pub fn parse_annotations(text: &str) -> Result<Vec<Annotation>> {
    let mut annotations = Vec::new();

    for (line_no, line) in text.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        if fields.len() < 8 {
            bail!("line {}: expected 8 fields, found {}", line_no + 1, fields.len());
        }
        let number = |index: usize| -> Result<u32> {
            fields[index].parse().with_context(|| {
                format!("line {}: invalid number {:?}", line_no + 1, fields[index])
            })
        };

        let class_id = number(7)? as usize;
        if class_id >= NUM_CLASSES {
            bail!("line {}: class id {} out of range", line_no + 1, class_id);
        }

        annotations.push(Annotation {
            filename: fields[0].to_string(),
            roi: Roi {
                x1: number(3)?,
                y1: number(4)?,
                x2: number(5)?,
                y2: number(6)?,
            },
            class_id,
        });
    }

    Ok(annotations)
}

/// Crop to the ROI when it fits, resize to 30x30 and scale to [0, 1].
pub fn preprocess(image: &DynamicImage, roi: Option<Roi>) -> SignImage {
    let rgb = image.to_rgb8();
    let cropped = match roi {
        Some(roi)
            if roi.x2 > roi.x1
                && roi.y2 > roi.y1
                && roi.x2 < rgb.width()
                && roi.y2 < rgb.height() =>
        {
            let (width, height) = (roi.x2 - roi.x1 + 1, roi.y2 - roi.y1 + 1);
            image::imageops::crop_imm(&rgb, roi.x1, roi.y1, width, height).to_image()
        }
        _ => rgb,
    };

    let size = IMAGE_SIZE as u32;
    let resized = image::imageops::resize(&cropped, size, size, FilterType::Triangle);
    let pixels: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|value| value as f32 / 255.0)
        .collect();

    SignImage::from_raw(pixels)
}

/// `Final_Training/Images/<class>/GT-<class>.csv` for every class directory present.
pub fn load_training_images(root: &Path) -> Result<RawImages> {
    let mut raw = RawImages::default();

    for class_id in 0..NUM_CLASSES {
        let dir = root.join(format!("{class_id:05}"));
        if !dir.is_dir() {
            warn!(class_id, dir = %dir.display(), "class directory missing, skipping");
            continue;
        }
        let csv = dir.join(format!("GT-{class_id:05}.csv"));
        load_annotated(&dir, &csv, &mut raw)?;
    }

    if raw.is_empty() {
        bail!("no training images found under {}", root.display());
    }
    info!(images = raw.len(), root = %root.display(), "loaded training images");
    Ok(raw)
}

/// `Final_Test/Images/GT-final_test.csv` and the images beside it.
pub fn load_test_images(root: &Path) -> Result<RawImages> {
    let mut raw = RawImages::default();
    load_annotated(root, &root.join("GT-final_test.csv"), &mut raw)?;

    info!(images = raw.len(), root = %root.display(), "loaded test images");
    Ok(raw)
}

/// Every image file in `dir`, sorted by file name, without ROI cropping.
pub fn load_new_images(dir: &Path) -> Result<Vec<(PathBuf, SignImage)>> {
    let mut paths = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list {}", dir.display()))?
            .path();
        if is_image_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let image = open(&path)?;
            Ok((path, preprocess(&image, None)))
        })
        .collect()
}

fn load_annotated(dir: &Path, csv: &Path, raw: &mut RawImages) -> Result<()> {
    let text = fs::read_to_string(csv)
        .with_context(|| format!("failed to read annotations {}", csv.display()))?;
    let annotations = parse_annotations(&text)
        .with_context(|| format!("failed to parse annotations {}", csv.display()))?;

    for annotation in annotations {
        let image = open(&dir.join(&annotation.filename))?;
        raw.images.push(preprocess(&image, Some(annotation.roi)));
        raw.labels.push(annotation.class_id);
    }
    Ok(())
}

fn open(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("failed to decode image {}", path.display()))
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
