use glob::{glob, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::types::AnnotationRecord;

/// Helper function to infer image format from image bytes
pub fn infer_image_format(image_bytes: &[u8]) -> Option<&'static str> {
    if image_bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if image_bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("png")
    } else if image_bytes.starts_with(b"BM") {
        Some("bmp")
    } else if image_bytes.starts_with(&[0x47, 0x49, 0x46]) {
        Some("gif")
    } else if image_bytes.starts_with(b"II*\0") || image_bytes.starts_with(b"MM\0*") {
        Some("tiff")
    } else if image_bytes.len() >= 12
        && image_bytes.starts_with(b"RIFF")
        && &image_bytes[8..12] == b"WEBP"
    {
        Some("webp")
    } else {
        None
    }
}

/// Read and parse a single LabelMe JSON file.
///
/// The document is parsed directly from the file stream; the record name is
/// taken from the file stem.
pub fn read_annotation(path: &Path) -> Result<AnnotationRecord> {
    let file = fs::File::open(path).map_err(|e| {
        ConvertError::Configuration(format!(
            "failed to open annotation {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut record: AnnotationRecord = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| {
            ConvertError::Configuration(format!(
                "failed to parse annotation {}: {}",
                path.display(),
                e
            ))
        })?;
    record.name = record_name(path);
    debug!(
        "Read {} with {} shapes",
        path.display(),
        record.shapes.len()
    );
    Ok(record)
}

/// Record name of an annotation file (its stem).
pub fn record_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Output path `<dir>/<name>.<extension>`.
///
/// Record names are file stems and already valid on the host; they are only
/// sanitized on Windows, where reserved device names still need mapping.
pub fn output_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    let stem = if cfg!(windows) {
        sanitize_filename::sanitize(name)
    } else {
        name.to_string()
    };
    dir.join(format!("{}.{}", stem, extension))
}

/// List every `*.json` file directly inside `dirname`, in sorted path order.
pub fn list_annotation_files(dirname: &Path) -> Result<Vec<PathBuf>> {
    let dir_str = dirname.to_str().ok_or_else(|| {
        ConvertError::Configuration(format!("non UTF-8 input path: {}", dirname.display()))
    })?;
    // the directory itself may contain glob metacharacters such as `[1]`
    let pattern = format!("{}/*.json", Pattern::escape(dir_str));
    let entries = glob(&pattern)
        .map_err(|e| ConvertError::Configuration(format!("invalid glob pattern: {}", e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Create an empty output directory, deleting any previous content
pub fn create_output_directory(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        log::warn!(
            "Directory {:?} already exists. Deleting and recreating it.",
            path
        );
        fs::remove_dir_all(path).and_then(|_| fs::create_dir_all(path))?;
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}
