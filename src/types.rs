use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{ConvertError, Result};

// Image extensions probed beside an annotation file, in priority order
pub const IMG_FORMATS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

// Name of the dataset directory created inside the input directory
pub const DATASET_DIR: &str = "Dataset";

/// The LabelMe shape types understood by the converter.
///
/// Anything else is kept as `Other` so the normalizer can reject it by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShapeType {
    Rectangle,
    Polygon,
    Circle,
    Other(String),
}

impl From<String> for ShapeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "rectangle" => ShapeType::Rectangle,
            "polygon" => ShapeType::Polygon,
            "circle" => ShapeType::Circle,
            _ => ShapeType::Other(value),
        }
    }
}

impl From<ShapeType> for String {
    fn from(value: ShapeType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeType::Rectangle => f.write_str("rectangle"),
            ShapeType::Polygon => f.write_str("polygon"),
            ShapeType::Circle => f.write_str("circle"),
            ShapeType::Other(name) => f.write_str(name),
        }
    }
}

// The Shape struct representing one annotated region
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Shape {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub shape_type: ShapeType,
}

// One LabelMe document: every shape drawn on a single image
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    /// File stem of the annotation document
    #[serde(skip)]
    pub name: String,
}

impl AnnotationRecord {
    /// The embedded base64 payload, if any non-empty one is present.
    pub fn embedded_image(&self) -> Option<&str> {
        self.image_data.as_deref().filter(|data| !data.is_empty())
    }
}

/// Pixel dimensions of an image; both sides are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ConvertError::ImageDecode(format!(
                "image has zero size ({}x{})",
                width, height
            )));
        }
        Ok(Self { width, height })
    }
}

// Paths to the output directories for the train/val splits
pub struct OutputDirs {
    pub train_labels_dir: PathBuf,
    pub val_labels_dir: PathBuf,
    pub train_images_dir: PathBuf,
    pub val_images_dir: PathBuf,
}

// Record names assigned to each split
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DatasetSplit {
    pub train: Vec<String>,
    pub val: Vec<String>,
}
