//! LabelMe to YOLOv8 dataset converter
//!
//! This library converts LabelMe JSON annotations (rectangles, polygons and
//! circles) into YOLO detection or segmentation labels and lays them out as a
//! train/val dataset with a `dataset.yaml` manifest.

pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod image_source;
pub mod io;
pub mod types;
pub mod utils;
pub mod vocabulary;

// Re-export commonly used types and functions
pub use config::Args;
pub use conversion::{
    convert_annotation, convert_record, normalize_shape, LabelGeometry, YoloLabel, YoloMode,
};
pub use dataset::{convert_one, process_dataset, run, split_annotations};
pub use error::ConvertError;
pub use image_source::{resolve_image_source, ImageSource};
pub use types::{AnnotationRecord, DatasetSplit, ImageSize, Shape, ShapeType};
pub use vocabulary::{gather_label_vocabulary, LabelVocabulary};
