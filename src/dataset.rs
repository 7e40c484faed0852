use anyhow::{Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Args;
use crate::conversion::{convert_annotation, YoloMode};
use crate::error::ConvertError;
use crate::image_source::ImageSource;
use crate::io::{create_dataset_yaml, setup_output_directories, write_label_file};
use crate::types::DatasetSplit;
use crate::utils::{
    create_progress_bar, list_annotation_files, output_path, read_annotation, record_name,
};
use crate::vocabulary::{gather_label_vocabulary, LabelVocabulary};

/// Split record names into training and validation sets
pub fn split_annotations(mut names: Vec<String>, val_size: f32, seed: u64) -> DatasetSplit {
    let mut rng = StdRng::seed_from_u64(seed);
    names.shuffle(&mut rng);

    let val_size = ((names.len() as f32 * val_size).ceil() as usize).min(names.len());
    let train = names.split_off(val_size);

    DatasetSplit { train, val: names }
}

// Names of the sample folders inside a pre-split directory, sorted
fn sample_folders(split_dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(split_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Reuse an existing `train/` + `val/` folder split when both are present.
pub fn find_predefined_split(dirname: &Path) -> std::io::Result<Option<DatasetSplit>> {
    let train_dir = dirname.join("train");
    let val_dir = dirname.join("val");
    if !(train_dir.is_dir() && val_dir.is_dir()) {
        return Ok(None);
    }

    Ok(Some(DatasetSplit {
        train: sample_folders(&train_dir)?,
        val: sample_folders(&val_dir)?,
    }))
}

/// Determine the train/val partition of the records in `dirname`
pub fn partition_dataset(dirname: &Path, val_size: f32, seed: u64) -> Result<DatasetSplit> {
    if let Some(split) = find_predefined_split(dirname)
        .with_context(|| format!("failed to read split folders in {}", dirname.display()))?
    {
        info!(
            "Reusing existing split: {} train, {} val samples.",
            split.train.len(),
            split.val.len()
        );
        return Ok(split);
    }

    let names: Vec<String> = list_annotation_files(dirname)?
        .iter()
        .map(|path| record_name(path))
        .collect();
    let split = split_annotations(names, val_size, seed);
    info!(
        "Randomly split {} records: {} train, {} val.",
        split.train.len() + split.val.len(),
        split.train.len(),
        split.val.len()
    );
    Ok(split)
}

/// Convert one record into `labels_dir`, materializing its image into `images_dir`.
///
/// The image is resolved before anything is written, so a record without an
/// image leaves no label file behind.
pub fn process_record(
    json_path: &Path,
    labels_dir: &Path,
    images_dir: &Path,
    vocabulary: &LabelVocabulary,
    mode: YoloMode,
) -> Result<(), ConvertError> {
    let record = read_annotation(json_path)?;
    let (source, labels) = convert_annotation(&record, json_path, vocabulary, mode)?;

    source.materialize(images_dir, &record.name)?;
    write_label_file(labels_dir, &record.name, &labels)?;
    debug!("Converted {} ({} labels)", json_path.display(), labels.len());
    Ok(())
}

/// Process all records of one split in parallel; the first failure aborts.
pub fn process_split(
    names: &[String],
    split: &str,
    dirname: &Path,
    labels_dir: &Path,
    images_dir: &Path,
    vocabulary: &LabelVocabulary,
    mode: YoloMode,
) -> Result<()> {
    let pb = create_progress_bar(names.len() as u64, split);

    names.par_iter().try_for_each(|name| {
        let json_path = dirname.join(format!("{}.json", name));
        process_record(&json_path, labels_dir, images_dir, vocabulary, mode)
            .with_context(|| format!("failed to convert {} for {}", json_path.display(), split))?;
        pb.inc(1);
        Ok::<(), anyhow::Error>(())
    })?;

    pb.finish_with_message(format!("{} processing complete", split));
    Ok(())
}

/// Main dataset processing pipeline
pub fn process_dataset(
    dirname: &Path,
    vocabulary: &LabelVocabulary,
    mode: YoloMode,
    val_size: f32,
    seed: u64,
) -> Result<PathBuf> {
    let split = partition_dataset(dirname, val_size, seed)?;

    let output_dirs =
        setup_output_directories(dirname).context("failed to set up output directories")?;

    process_split(
        &split.train,
        "Train",
        dirname,
        &output_dirs.train_labels_dir,
        &output_dirs.train_images_dir,
        vocabulary,
        mode,
    )?;
    process_split(
        &split.val,
        "Val",
        dirname,
        &output_dirs.val_labels_dir,
        &output_dirs.val_images_dir,
        vocabulary,
        mode,
    )?;

    info!("Generating dataset.yaml file...");
    let yaml_path =
        create_dataset_yaml(dirname, vocabulary).context("failed to create dataset.yaml")?;
    Ok(yaml_path)
}

/// Convert a single JSON file in place, without splitting or a manifest.
///
/// The label file is written next to the annotation; an embedded image is
/// written there too unless an image of the same name already exists.
pub fn convert_one(
    dirname: &Path,
    json_name: &str,
    vocabulary: &LabelVocabulary,
    mode: YoloMode,
) -> Result<PathBuf> {
    let json_path = dirname.join(json_name);
    info!("Converting {} ...", json_name);

    let record = read_annotation(&json_path)?;
    let (source, labels) = convert_annotation(&record, &json_path, vocabulary, mode)
        .with_context(|| format!("failed to convert {}", json_path.display()))?;

    if matches!(source, ImageSource::Embedded { .. }) {
        let image_path = output_path(dirname, &record.name, &source.extension());
        if !image_path.exists() {
            source.materialize(dirname, &record.name)?;
        }
    }
    let label_path = write_label_file(dirname, &record.name, &labels)?;
    Ok(label_path)
}

/// Run a full conversion as described by the command-line arguments.
pub fn run(args: &Args) -> Result<()> {
    let dirname = PathBuf::from(&args.json_dir);
    if !dirname.is_dir() {
        return Err(ConvertError::Configuration(format!(
            "the specified json_dir does not exist: {}",
            args.json_dir
        ))
        .into());
    }

    let mode: YoloMode = args.yolo_mode.parse()?;
    info!("Building label vocabulary...");
    let vocabulary = gather_label_vocabulary(&dirname)?;

    match &args.json_name {
        Some(json_name) => {
            let label_path = convert_one(&dirname, json_name, &vocabulary, mode)?;
            info!("Wrote {}", label_path.display());
        }
        None => {
            let yaml_path =
                process_dataset(&dirname, &vocabulary, mode, args.val_size(), args.seed)?;
            info!("Conversion finished, manifest at {}", yaml_path.display());
        }
    }
    Ok(())
}
