//! Label vocabulary: the fixed mapping from label text to class id.

use log::info;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::types::AnnotationRecord;
use crate::utils::{list_annotation_files, read_annotation};

/// Class names in id order, with a reverse index.
///
/// Ids are assigned in first-seen order and never change once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelVocabulary {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl LabelVocabulary {
    /// Build the vocabulary from records, in iteration order then shape order.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AnnotationRecord>,
    {
        let mut vocabulary = Self::default();
        for record in records {
            vocabulary.extend_from_record(record);
        }
        vocabulary
    }

    /// Add the labels of one record that have not been seen yet.
    fn extend_from_record(&mut self, record: &AnnotationRecord) {
        for shape in &record.shapes {
            self.insert(&shape.label);
        }
    }

    fn insert(&mut self, label: &str) -> usize {
        if let Some(&id) = self.ids.get(label) {
            return id;
        }
        let id = self.names.len();
        self.names.push(label.to_string());
        self.ids.insert(label.to_string(), id);
        id
    }

    pub fn id(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Gather the label vocabulary from every annotation file in `dirname`.
///
/// Files are scanned in sorted path order so ids are identical across runs.
pub fn gather_label_vocabulary(dirname: &Path) -> Result<LabelVocabulary> {
    let json_files = list_annotation_files(dirname)?;
    if json_files.is_empty() {
        return Err(ConvertError::Configuration(format!(
            "no annotation files found in {}",
            dirname.display()
        )));
    }

    let mut vocabulary = LabelVocabulary::default();
    for json_path in &json_files {
        vocabulary.extend_from_record(&read_annotation(json_path)?);
    }

    info!(
        "Found {} unique labels in {} annotation files.",
        vocabulary.len(),
        json_files.len()
    );
    Ok(vocabulary)
}
