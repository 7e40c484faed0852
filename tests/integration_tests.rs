use serde_json::json;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use labelme2yolov8::dataset::{find_predefined_split, process_record};
use labelme2yolov8::{
    convert_annotation, convert_one, gather_label_vocabulary, process_dataset,
    resolve_image_source, run, Args, ConvertError, ImageSize, ImageSource, YoloMode,
};

fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbImage::new(width, height).save(path).unwrap();
}

fn png_base64(width: u32, height: u32) -> String {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    base64::encode(&buf)
}

fn write_annotation(dir: &Path, name: &str, shapes: serde_json::Value, image_data: Option<String>) {
    write_annotation_with_path(dir, name, shapes, image_data, &format!("{}.png", name));
}

fn write_annotation_with_path(
    dir: &Path,
    name: &str,
    shapes: serde_json::Value,
    image_data: Option<String>,
    image_path: &str,
) {
    let document = json!({
        "version": "5.2.1",
        "flags": {},
        "shapes": shapes,
        "imagePath": image_path,
        "imageData": image_data,
        "imageHeight": 50,
        "imageWidth": 100,
    });
    fs::write(dir.join(format!("{}.json", name)), document.to_string()).unwrap();
}

fn rectangle(label: &str) -> serde_json::Value {
    json!({
        "label": label,
        "points": [[10.0, 10.0], [30.0, 40.0]],
        "group_id": null,
        "shape_type": "rectangle",
        "flags": {}
    })
}

fn polygon(label: &str) -> serde_json::Value {
    json!({
        "label": label,
        "points": [[0.0, 0.0], [50.0, 0.0], [50.0, 25.0]],
        "shape_type": "polygon"
    })
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

fn args(dir: &Path, yolo_mode: &str) -> Args {
    Args {
        json_dir: dir.to_string_lossy().into_owned(),
        yolo_mode: yolo_mode.to_string(),
        val_size: None,
        json_name: None,
        seed: 42,
    }
}

#[test]
fn test_vocabulary_follows_sorted_file_order() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(dir, "b", json!([rectangle("cat")]), None);
    write_annotation(dir, "a", json!([rectangle("dog"), polygon("cat")]), None);

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    assert_eq!(vocabulary.names(), ["dog", "cat"]);
    assert_eq!(gather_label_vocabulary(dir).unwrap(), vocabulary);
}

#[test]
fn test_vocabulary_requires_annotations() {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = gather_label_vocabulary(temp_dir.path()).unwrap_err();
    assert!(matches!(err, ConvertError::Configuration(_)));
}

#[test]
fn test_unreadable_annotation_is_configuration_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();
    let err = gather_label_vocabulary(temp_dir.path()).unwrap_err();
    assert!(matches!(err, ConvertError::Configuration(_)));
}

#[test]
fn test_dimensions_from_sibling_image_and_embedded_data() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(dir, "file", json!([rectangle("dog")]), None);
    write_png(&dir.join("file.png"), 100, 50);
    write_annotation(dir, "inline", json!([rectangle("dog")]), Some(png_base64(64, 32)));

    let record = labelme2yolov8::utils::read_annotation(&dir.join("file.json")).unwrap();
    let source = resolve_image_source(&record, &dir.join("file.json")).unwrap();
    assert!(matches!(source, ImageSource::File(_)));
    assert_eq!(source.dimensions().unwrap(), ImageSize::new(100, 50).unwrap());

    let record = labelme2yolov8::utils::read_annotation(&dir.join("inline.json")).unwrap();
    let source = resolve_image_source(&record, &dir.join("inline.json")).unwrap();
    assert!(matches!(source, ImageSource::Embedded { extension: "png", .. }));
    assert_eq!(source.dimensions().unwrap(), ImageSize::new(64, 32).unwrap());
}

#[test]
fn test_convert_annotation_detect() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(dir, "sample", json!([rectangle("dog")]), None);
    write_png(&dir.join("sample.png"), 100, 50);

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    let json_path = dir.join("sample.json");
    let record = labelme2yolov8::utils::read_annotation(&json_path).unwrap();
    let (source, labels) =
        convert_annotation(&record, &json_path, &vocabulary, YoloMode::Detect).unwrap();

    assert!(matches!(source, ImageSource::File(_)));
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].to_string(), "0 0.200000 0.500000 0.200000 0.600000");
}

#[test]
fn test_missing_image_writes_no_label() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(dir, "orphan", json!([rectangle("dog")]), None);
    let labels_dir = dir.join("labels");
    let images_dir = dir.join("images");
    fs::create_dir_all(&labels_dir).unwrap();
    fs::create_dir_all(&images_dir).unwrap();

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    let err = process_record(
        &dir.join("orphan.json"),
        &labels_dir,
        &images_dir,
        &vocabulary,
        YoloMode::Detect,
    )
    .unwrap_err();

    assert!(matches!(err, ConvertError::MissingImage { .. }));
    assert!(!labels_dir.join("orphan.txt").exists());
    assert_eq!(count_files(&images_dir), 0);
}

#[test]
fn test_process_dataset_detect() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    for name in ["img1", "img2", "img3"] {
        write_annotation(dir, name, json!([rectangle("dog"), polygon("cat")]), None);
        write_png(&dir.join(format!("{}.png", name)), 100, 50);
    }
    write_annotation(dir, "img4", json!([polygon("cat")]), Some(png_base64(100, 50)));

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    let yaml_path = process_dataset(dir, &vocabulary, YoloMode::Detect, 0.25, 42).unwrap();

    let dataset = dir.join("Dataset");
    assert_eq!(count_files(&dataset.join("labels/train")), 3);
    assert_eq!(count_files(&dataset.join("labels/val")), 1);
    assert_eq!(count_files(&dataset.join("images/train")), 3);
    assert_eq!(count_files(&dataset.join("images/val")), 1);

    let label_file = ["train", "val"]
        .iter()
        .map(|split| dataset.join("labels").join(split).join("img1.txt"))
        .find(|path| path.exists())
        .unwrap();
    assert_eq!(
        fs::read_to_string(label_file).unwrap(),
        "0 0.200000 0.500000 0.200000 0.600000\n1 0.250000 0.250000 0.500000 0.500000\n"
    );

    let yaml = fs::read_to_string(yaml_path).unwrap();
    assert!(yaml.contains("train: "));
    assert!(yaml.contains("images/train/"));
    assert!(yaml.contains("val: "));
    assert!(yaml.contains("images/val/"));
    assert!(yaml.contains("nc: 2"));
    assert!(yaml.contains("names: ['dog', 'cat']"));
}

#[test]
fn test_process_dataset_segment_with_embedded_image() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(
        dir,
        "inline",
        json!([rectangle("door"), polygon("roof")]),
        Some(png_base64(100, 50)),
    );

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    process_dataset(dir, &vocabulary, YoloMode::Segment, 0.0, 42).unwrap();

    let dataset = dir.join("Dataset");
    assert!(dataset.join("images/train/inline.png").is_file());
    assert_eq!(
        fs::read_to_string(dataset.join("labels/train/inline.txt")).unwrap(),
        "0 0.100000 0.200000 0.300000 0.200000 0.300000 0.800000 0.100000 0.800000\n\
         1 0.000000 0.000000 0.500000 0.000000 0.500000 0.500000\n"
    );
    assert_eq!(count_files(&dataset.join("labels/val")), 0);
}

#[test]
fn test_predefined_split_is_reused() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    for name in ["a", "b", "c"] {
        write_annotation(dir, name, json!([rectangle("dog")]), None);
        write_png(&dir.join(format!("{}.png", name)), 100, 50);
    }
    fs::create_dir_all(dir.join("train/a")).unwrap();
    fs::create_dir_all(dir.join("train/b")).unwrap();
    fs::create_dir_all(dir.join("val/c")).unwrap();

    let split = find_predefined_split(dir).unwrap().unwrap();
    assert_eq!(split.train, ["a", "b"]);
    assert_eq!(split.val, ["c"]);

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    process_dataset(dir, &vocabulary, YoloMode::Detect, 0.9, 1).unwrap();

    let dataset = dir.join("Dataset");
    assert!(dataset.join("labels/train/a.txt").is_file());
    assert!(dataset.join("labels/train/b.txt").is_file());
    assert!(dataset.join("labels/val/c.txt").is_file());
    assert!(dataset.join("images/val/c.png").is_file());
}

#[test]
fn test_convert_one_writes_beside_annotation() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(dir, "single", json!([polygon("roof")]), Some(png_base64(100, 50)));
    write_annotation(dir, "other", json!([rectangle("dog")]), None);

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    let label_path = convert_one(dir, "single.json", &vocabulary, YoloMode::Segment).unwrap();

    assert_eq!(label_path, dir.join("single.txt"));
    assert_eq!(
        fs::read_to_string(&label_path).unwrap(),
        "1 0.000000 0.000000 0.500000 0.000000 0.500000 0.500000\n"
    );
    assert!(dir.join("single.png").is_file());
    assert!(!dir.join("Dataset").exists());
}

#[test]
fn test_run_rejects_unsupported_mode() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(dir, "sample", json!([rectangle("dog")]), None);
    write_png(&dir.join("sample.png"), 100, 50);

    let err = run(&args(dir, "classify")).unwrap_err();
    match err.downcast_ref::<ConvertError>() {
        Some(ConvertError::UnsupportedMode(mode)) => assert_eq!(mode, "classify"),
        other => panic!("expected UnsupportedMode, got {:?}", other),
    }
    assert!(!dir.join("Dataset").exists());
}

#[test]
fn test_run_is_deterministic() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    for (name, label) in [("x1", "dog"), ("x2", "cat"), ("x3", "bird"), ("x4", "dog")] {
        write_annotation(dir, name, json!([rectangle(label)]), None);
        write_png(&dir.join(format!("{}.png", name)), 100, 50);
    }

    run(&args(dir, "detect")).unwrap();
    let first = fs::read_to_string(dir.join("Dataset/dataset.yaml")).unwrap();
    let first_val: Vec<_> = fs::read_dir(dir.join("Dataset/labels/val"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();

    run(&args(dir, "detect")).unwrap();
    let second = fs::read_to_string(dir.join("Dataset/dataset.yaml")).unwrap();
    let second_val: Vec<_> = fs::read_dir(dir.join("Dataset/labels/val"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();

    assert_eq!(first, second);
    assert_eq!(first_val, second_val);
    assert!(first.contains("names: ['dog', 'cat', 'bird']"));
}

#[test]
fn test_input_directory_with_glob_metacharacters() {
    let temp_dir = tempfile::tempdir().unwrap();
    let decoy = temp_dir.path().join("set1");
    let dir = temp_dir.path().join("set[1]");
    fs::create_dir_all(&decoy).unwrap();
    fs::create_dir_all(&dir).unwrap();
    write_annotation(&decoy, "decoy", json!([rectangle("decoy")]), None);
    write_annotation(&dir, "real", json!([rectangle("dog")]), None);
    write_png(&dir.join("real.png"), 100, 50);

    let files = labelme2yolov8::utils::list_annotation_files(&dir).unwrap();
    assert_eq!(files, vec![dir.join("real.json")]);

    let vocabulary = gather_label_vocabulary(&dir).unwrap();
    assert_eq!(vocabulary.names(), ["dog"]);

    process_dataset(&dir, &vocabulary, YoloMode::Detect, 0.0, 42).unwrap();
    assert!(dir.join("Dataset/labels/train/real.txt").is_file());
}

#[test]
fn test_image_path_fallback() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    fs::create_dir_all(dir.join("imgs")).unwrap();
    write_png(&dir.join("imgs/x.png"), 200, 100);
    write_annotation_with_path(dir, "sample", json!([rectangle("dog")]), None, "imgs/x.png");

    let json_path = dir.join("sample.json");
    let record = labelme2yolov8::utils::read_annotation(&json_path).unwrap();
    let source = resolve_image_source(&record, &json_path).unwrap();
    match &source {
        ImageSource::File(path) => assert_eq!(path, &dir.join("imgs/x.png")),
        other => panic!("expected a file source, got {:?}", other),
    }
    assert_eq!(source.dimensions().unwrap(), ImageSize::new(200, 100).unwrap());

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    process_dataset(dir, &vocabulary, YoloMode::Detect, 0.0, 42).unwrap();
    assert!(dir.join("Dataset/images/train/sample.png").is_file());
    assert_eq!(
        fs::read_to_string(dir.join("Dataset/labels/train/sample.txt")).unwrap(),
        "0 0.100000 0.250000 0.100000 0.300000\n"
    );
}

#[test]
fn test_convert_one_keeps_existing_image() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(dir, "single", json!([rectangle("dog")]), Some(png_base64(100, 50)));
    let existing = b"existing image bytes";
    fs::write(dir.join("single.png"), existing).unwrap();

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    convert_one(dir, "single.json", &vocabulary, YoloMode::Detect).unwrap();

    assert_eq!(fs::read(dir.join("single.png")).unwrap(), existing);
    assert_eq!(
        fs::read_to_string(dir.join("single.txt")).unwrap(),
        "0 0.200000 0.500000 0.200000 0.600000\n"
    );
}

#[test]
fn test_invalid_image_data_is_decode_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(dir, "bad", json!([rectangle("dog")]), Some("!!notbase64".to_string()));
    // valid base64, but not an image
    write_annotation(dir, "garbage", json!([rectangle("dog")]), Some(base64::encode(b"hello world")));

    for name in ["bad", "garbage"] {
        let json_path = dir.join(format!("{}.json", name));
        let record = labelme2yolov8::utils::read_annotation(&json_path).unwrap();
        let err = resolve_image_source(&record, &json_path)
            .and_then(|source| source.dimensions())
            .unwrap_err();
        assert!(
            matches!(err, ConvertError::ImageDecode(_)),
            "{}: expected ImageDecode, got {:?}",
            name,
            err
        );
    }
}

#[cfg(unix)]
#[test]
fn test_record_names_are_kept_verbatim() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();
    write_annotation(dir, "cam:1", json!([rectangle("dog")]), None);
    write_png(&dir.join("cam:1.png"), 100, 50);

    let vocabulary = gather_label_vocabulary(dir).unwrap();
    process_dataset(dir, &vocabulary, YoloMode::Detect, 0.0, 42).unwrap();

    assert!(dir.join("Dataset/labels/train/cam:1.txt").is_file());
    assert!(dir.join("Dataset/images/train/cam:1.png").is_file());
}
