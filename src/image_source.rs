use log::debug;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::types::{AnnotationRecord, ImageSize, IMG_FORMATS};
use crate::utils::{infer_image_format, output_path};

/// Where the pixels of an annotated image come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Decoded `imageData` payload and the extension inferred from it
    Embedded { bytes: Vec<u8>, extension: &'static str },
    /// An image file on disk next to the annotation
    File(PathBuf),
}

/// Resolve the image for a record: the embedded payload wins, then a
/// same-named image file beside the annotation, then the file named by
/// `imagePath`.
pub fn resolve_image_source(record: &AnnotationRecord, json_path: &Path) -> Result<ImageSource> {
    if let Some(image_data) = record.embedded_image() {
        let bytes = base64::decode(image_data.trim())
            .map_err(|e| ConvertError::ImageDecode(format!("invalid imageData: {}", e)))?;
        let extension = infer_image_format(&bytes).unwrap_or("png");
        return Ok(ImageSource::Embedded { bytes, extension });
    }

    find_sibling_image(record, json_path)
        .map(ImageSource::File)
        .ok_or_else(|| ConvertError::MissingImage {
            annotation: json_path.to_path_buf(),
        })
}

fn find_sibling_image(record: &AnnotationRecord, json_path: &Path) -> Option<PathBuf> {
    let same_named = IMG_FORMATS
        .iter()
        .map(|ext| json_path.with_extension(ext))
        .find(|candidate| candidate.is_file());
    if same_named.is_some() {
        return same_named;
    }

    let base_dir = json_path.parent().unwrap_or_else(|| Path::new("."));
    record
        .image_path
        .as_deref()
        .filter(|image_path| !image_path.is_empty())
        .map(|image_path| base_dir.join(image_path))
        .filter(|candidate| candidate.is_file())
}

impl ImageSource {
    /// Read the pixel dimensions from the image header.
    pub fn dimensions(&self) -> Result<ImageSize> {
        let (width, height) = match self {
            ImageSource::Embedded { bytes, .. } => image::ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()?
                .into_dimensions()
                .map_err(|e| ConvertError::ImageDecode(e.to_string()))?,
            ImageSource::File(path) => image::image_dimensions(path).map_err(|e| {
                ConvertError::ImageDecode(format!("{}: {}", path.display(), e))
            })?,
        };
        ImageSize::new(width, height)
    }

    /// Extension the materialized image file gets.
    pub fn extension(&self) -> String {
        match self {
            ImageSource::Embedded { extension, .. } => extension.to_string(),
            ImageSource::File(path) => path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_else(|| "jpg".to_string()),
        }
    }

    /// Copy or write the image as `<images_dir>/<name>.<ext>`.
    pub fn materialize(&self, images_dir: &Path, name: &str) -> Result<PathBuf> {
        let output_path = output_path(images_dir, name, &self.extension());
        match self {
            ImageSource::Embedded { bytes, .. } => {
                let mut file = File::create(&output_path)?;
                file.write_all(bytes)?;
            }
            ImageSource::File(path) => {
                if path != &output_path {
                    fs::copy(path, &output_path)?;
                }
            }
        }
        debug!("Wrote image {}", output_path.display());
        Ok(output_path)
    }
}
