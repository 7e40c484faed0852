use clap::Parser;
use std::str::FromStr;

/// Validation fraction used when `--val_size` is not given
pub const DEFAULT_VAL_SIZE: f32 = 0.25;

/// Command-line arguments for converting LabelMe JSON to a YOLOv8 dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory containing LabelMe JSON files and their images
    #[arg(short = 'd', long = "json_dir")]
    pub json_dir: String,

    /// Dataset mode: 'detect' for bounding boxes, 'segment' for polygons
    #[arg(long = "yolo_mode", default_value = "detect")]
    pub yolo_mode: String,

    /// Proportion of the dataset to use for validation
    #[arg(long = "val_size", value_parser = validate_size)]
    pub val_size: Option<f32>,

    /// Convert only this JSON file, writing its label next to it
    #[arg(long = "json_name")]
    pub json_name: Option<String>,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,
}

impl Args {
    pub fn val_size(&self) -> f32 {
        self.val_size.unwrap_or(DEFAULT_VAL_SIZE)
    }
}

// Validate that the size is between 0.0 and 1.0
pub fn validate_size(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}
