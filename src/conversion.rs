use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConvertError, Result};
use crate::image_source::{resolve_image_source, ImageSource};
use crate::types::{AnnotationRecord, ImageSize, Shape, ShapeType};
use crate::vocabulary::LabelVocabulary;

/// YOLO label flavour to produce.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum YoloMode {
    /// Axis-aligned bounding boxes
    Detect,
    /// Polygon outlines
    Segment,
}

impl FromStr for YoloMode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "detect" => Ok(YoloMode::Detect),
            "segment" => Ok(YoloMode::Segment),
            other => Err(ConvertError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for YoloMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YoloMode::Detect => f.write_str("detect"),
            YoloMode::Segment => f.write_str("segment"),
        }
    }
}

/// Normalized coordinates of one label row.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelGeometry {
    BBox {
        x_center: f64,
        y_center: f64,
        width: f64,
        height: f64,
    },
    /// Corners in order top-left, top-right, bottom-right, bottom-left
    Quad([(f64, f64); 4]),
    Polygon(Vec<(f64, f64)>),
}

impl LabelGeometry {
    pub fn coordinates(&self) -> Vec<f64> {
        match self {
            LabelGeometry::BBox {
                x_center,
                y_center,
                width,
                height,
            } => vec![*x_center, *y_center, *width, *height],
            LabelGeometry::Quad(corners) => corners.iter().flat_map(|&(x, y)| [x, y]).collect(),
            LabelGeometry::Polygon(points) => points.iter().flat_map(|&(x, y)| [x, y]).collect(),
        }
    }

    /// Number of fields in the serialized row, class id included.
    pub fn field_count(&self) -> usize {
        match self {
            LabelGeometry::BBox { .. } => 5,
            LabelGeometry::Quad(_) => 9,
            LabelGeometry::Polygon(points) => 1 + 2 * points.len(),
        }
    }
}

/// One row of a YOLO label file.
#[derive(Debug, Clone, PartialEq)]
pub struct YoloLabel {
    pub class_id: usize,
    pub geometry: LabelGeometry,
}

impl fmt::Display for YoloLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coordinates = self.geometry.coordinates();
        debug_assert_eq!(coordinates.len() + 1, self.geometry.field_count());

        write!(f, "{}", self.class_id)?;
        for value in coordinates {
            write!(f, " {:.6}", value)?;
        }
        Ok(())
    }
}

/// Round to 6 decimal digits, ties to even on the scaled value.
pub fn round6(value: f64) -> f64 {
    (value * 1e6).round_ties_even() / 1e6
}

fn normalize_point(x: f64, y: f64, size: ImageSize) -> (f64, f64) {
    (
        round6(x / size.width as f64),
        round6(y / size.height as f64),
    )
}

fn normalize_bbox(
    x_min: f64,
    y_min: f64,
    width: f64,
    height: f64,
    size: ImageSize,
) -> LabelGeometry {
    let w = size.width as f64;
    let h = size.height as f64;
    LabelGeometry::BBox {
        x_center: round6((x_min + width / 2.0) / w),
        y_center: round6((y_min + height / 2.0) / h),
        width: round6(width / w),
        height: round6(height / h),
    }
}

/// Axis-aligned bounding box `(x_min, y_min, x_max, y_max)` of a point list.
pub fn bounding_box(points: &[(f64, f64)]) -> Result<(f64, f64, f64, f64)> {
    if points.is_empty() {
        return Err(ConvertError::malformed("shape has no points"));
    }
    Ok(points.iter().fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(x_min, y_min, x_max, y_max), &(x, y)| {
            (x_min.min(x), y_min.min(y), x_max.max(x), y_max.max(y))
        },
    ))
}

/// Convert a single shape into a normalized YOLO label row.
pub fn normalize_shape(
    shape: &Shape,
    class_id: usize,
    size: ImageSize,
    mode: YoloMode,
) -> Result<YoloLabel> {
    let geometry = match (&shape.shape_type, mode) {
        // labelme circles are a center plus one point on the circumference
        (ShapeType::Circle, _) => {
            let &[(cx, cy), (px, py)] = shape.points.as_slice() else {
                return Err(ConvertError::malformed(format!(
                    "circle '{}' needs exactly 2 points, got {}",
                    shape.label,
                    shape.points.len()
                )));
            };
            let radius = ((cx - px).powi(2) + (cy - py).powi(2)).sqrt();
            let w = size.width as f64;
            let h = size.height as f64;
            LabelGeometry::BBox {
                x_center: round6(cx / w),
                y_center: round6(cy / h),
                width: round6(2.0 * radius / w),
                height: round6(2.0 * radius / h),
            }
        }
        (ShapeType::Rectangle | ShapeType::Polygon, YoloMode::Detect) => {
            let (x_min, y_min, x_max, y_max) = bounding_box(&shape.points)?;
            normalize_bbox(x_min, y_min, x_max - x_min, y_max - y_min, size)
        }
        (ShapeType::Rectangle, YoloMode::Segment) => {
            let (x_min, y_min, x_max, y_max) = bounding_box(&shape.points)?;
            LabelGeometry::Quad([
                normalize_point(x_min, y_min, size),
                normalize_point(x_max, y_min, size),
                normalize_point(x_max, y_max, size),
                normalize_point(x_min, y_max, size),
            ])
        }
        (ShapeType::Polygon, YoloMode::Segment) => {
            if shape.points.is_empty() {
                return Err(ConvertError::malformed("shape has no points"));
            }
            LabelGeometry::Polygon(
                shape
                    .points
                    .iter()
                    .map(|&(x, y)| normalize_point(x, y, size))
                    .collect(),
            )
        }
        (ShapeType::Other(name), _) => {
            return Err(ConvertError::malformed(format!(
                "unsupported shape type '{}'",
                name
            )))
        }
    };

    Ok(YoloLabel { class_id, geometry })
}

/// Convert every shape of a record, in input order.
pub fn convert_record(
    record: &AnnotationRecord,
    vocabulary: &LabelVocabulary,
    size: ImageSize,
    mode: YoloMode,
) -> Result<Vec<YoloLabel>> {
    record
        .shapes
        .iter()
        .enumerate()
        .map(|(index, shape)| {
            let class_id = vocabulary.id(&shape.label).ok_or_else(|| {
                ConvertError::Configuration(format!(
                    "label '{}' of shape #{} is not in the vocabulary",
                    shape.label, index
                ))
            })?;
            normalize_shape(shape, class_id, size, mode).map_err(|e| e.at_shape(index))
        })
        .collect()
}

/// Resolve the image of a record and convert all of its shapes.
///
/// The resolved source is returned alongside the rows so the caller can
/// materialize the same image the dimensions were read from.
pub fn convert_annotation(
    record: &AnnotationRecord,
    json_path: &Path,
    vocabulary: &LabelVocabulary,
    mode: YoloMode,
) -> Result<(ImageSource, Vec<YoloLabel>)> {
    let source = resolve_image_source(record, json_path)?;
    let labels = convert_record(record, vocabulary, source.dimensions()?, mode)?;
    Ok((source, labels))
}

/// Serialize label rows, one per line, each terminated by a newline.
pub fn format_labels(labels: &[YoloLabel]) -> String {
    let fields: usize = labels.iter().map(|label| label.geometry.field_count()).sum();
    let mut yolo_data = String::with_capacity(fields * 9);
    for label in labels {
        yolo_data.push_str(&label.to_string());
        yolo_data.push('\n');
    }
    yolo_data
}
