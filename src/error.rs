use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while converting LabelMe annotations to YOLO labels.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The input scope is empty or an annotation document cannot be read
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested output mode is neither `detect` nor `segment`
    #[error("unsupported yolo mode: '{0}' (expected 'detect' or 'segment')")]
    UnsupportedMode(String),

    /// Neither embedded image data nor a sibling image file is available
    #[error("no source image found for {}", .annotation.display())]
    MissingImage { annotation: PathBuf },

    /// A shape whose points do not describe its shape type
    #[error("malformed shape{}: {reason}", shape_suffix(.shape_index))]
    MalformedShape {
        shape_index: Option<usize>,
        reason: String,
    },

    /// Image payload or header could not be decoded
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ConvertError::MalformedShape {
            shape_index: None,
            reason: reason.into(),
        }
    }

    /// Attach the index of the offending shape to a malformed-shape error.
    pub(crate) fn at_shape(self, index: usize) -> Self {
        match self {
            ConvertError::MalformedShape { reason, .. } => ConvertError::MalformedShape {
                shape_index: Some(index),
                reason,
            },
            other => other,
        }
    }
}

fn shape_suffix(index: &Option<usize>) -> String {
    index.map(|i| format!(" #{}", i)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ConvertError>;
