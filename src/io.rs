use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::conversion::{format_labels, YoloLabel};
use crate::types::{OutputDirs, DATASET_DIR};
use crate::utils::{create_output_directory, output_path};
use crate::vocabulary::LabelVocabulary;

/// Set up the directory structure for YOLO dataset output
pub fn setup_output_directories(dirname: &Path) -> std::io::Result<OutputDirs> {
    let dataset_dir = dirname.join(DATASET_DIR);
    let labels_dir = create_output_directory(&dataset_dir.join("labels"))?;
    let images_dir = create_output_directory(&dataset_dir.join("images"))?;

    Ok(OutputDirs {
        train_labels_dir: create_output_directory(&labels_dir.join("train"))?,
        val_labels_dir: create_output_directory(&labels_dir.join("val"))?,
        train_images_dir: create_output_directory(&images_dir.join("train"))?,
        val_images_dir: create_output_directory(&images_dir.join("val"))?,
    })
}

/// Write `<labels_dir>/<name>.txt` with one line per label row
pub fn write_label_file(
    labels_dir: &Path,
    name: &str,
    labels: &[YoloLabel],
) -> std::io::Result<PathBuf> {
    let label_output_path = output_path(labels_dir, name, "txt");
    let mut writer = BufWriter::new(File::create(&label_output_path)?);
    writer.write_all(format_labels(labels).as_bytes())?;
    writer.flush()?;
    Ok(label_output_path)
}

// Single-quoted YAML scalar
fn yaml_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Create the dataset.yaml file for YOLO training
pub fn create_dataset_yaml(
    dirname: &Path,
    vocabulary: &LabelVocabulary,
) -> std::io::Result<PathBuf> {
    let dataset_dir = fs::canonicalize(dirname.join(DATASET_DIR))?;
    let dataset_yaml_path = dataset_dir.join("dataset.yaml");
    let images_dir = dataset_dir.join("images");

    let mut yaml_content = format!(
        "train: {}/\nval: {}/\n\nnc: {}\n\n",
        images_dir.join("train").to_string_lossy(),
        images_dir.join("val").to_string_lossy(),
        vocabulary.len()
    );
    let names: Vec<String> = vocabulary.names().iter().map(|n| yaml_quote(n)).collect();
    yaml_content.push_str(&format!("names: [{}]\n", names.join(", ")));

    let mut dataset_yaml = BufWriter::new(File::create(&dataset_yaml_path)?);
    dataset_yaml.write_all(yaml_content.as_bytes())?;
    dataset_yaml.flush()?;
    Ok(dataset_yaml_path)
}
