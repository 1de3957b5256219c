/// File-level contract of the lpr-cli tool
use common::plates::PlateResult;
use image::ImageFormat;
use lpr_service::{cli::recognize_file, load_model};
use recognition::synthetic::{render_plate, Scene};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_scene(dir: &TempDir, name: &str, scene: Scene, format: ImageFormat) -> PathBuf {
    let path = dir.path().join(name);
    scene.into_gray().save_with_format(&path, format).unwrap();
    path
}

fn single_row_scene() -> Scene {
    let plate = render_plate(&["51F12345"], 6).unwrap();
    Scene::new(400, 200, 40).place_centered(&plate)
}

fn two_row_scene() -> Scene {
    let plate = render_plate(&["59-X1", "123.45"], 4).unwrap();
    Scene::new(300, 200, 40).place(&plate, 80, 60)
}

#[test]
fn test_reads_plate_from_png() {
    let dir = TempDir::new().unwrap();
    let path = write_scene(&dir, "car.png", single_row_scene(), ImageFormat::Png);
    let model = load_model(None).unwrap();

    let result = recognize_file(&model, &path).unwrap();
    assert_eq!(result.as_text(), "51F12345");
}

#[test]
fn test_reads_two_row_plate_from_bmp() {
    let dir = TempDir::new().unwrap();
    let path = write_scene(&dir, "moto.bmp", two_row_scene(), ImageFormat::Bmp);
    let model = load_model(None).unwrap();

    let result = recognize_file(&model, &path).unwrap();
    assert_eq!(result.as_text(), "59X112345");
}

#[test]
fn test_missing_or_broken_file_prints_no_plate() {
    let dir = TempDir::new().unwrap();
    let model = load_model(None).unwrap();

    let missing = recognize_file(&model, &dir.path().join("nope.jpg")).unwrap();
    assert_eq!(missing, PlateResult::NoPlate);
    assert_eq!(missing.as_text(), "NoPlate");

    let garbage = dir.path().join("garbage.jpg");
    fs::write(&garbage, b"\xff\xd8\xff truncated jpeg").unwrap();
    assert_eq!(recognize_file(&model, &garbage).unwrap(), PlateResult::NoPlate);
}

#[test]
fn test_model_config_file_is_honoured() {
    let dir = TempDir::new().unwrap();
    let image = write_scene(&dir, "car.png", single_row_scene(), ImageFormat::Png);

    // Eight characters can never satisfy a nine-character minimum
    let config = dir.path().join("model.json");
    fs::write(&config, r#"{ "assembler": { "min_length": 9, "max_length": 9 } }"#).unwrap();
    let model = load_model(Some(&config)).unwrap();

    assert_eq!(recognize_file(&model, &image).unwrap(), PlateResult::NoPlate);
}

#[test]
fn test_invalid_model_config_fails_to_load() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("model.json");
    fs::write(&config, r#"{ "detector": { "backend": "yolo" } }"#).unwrap();

    assert!(load_model(Some(&config)).is_err());
    assert!(load_model(Some(&dir.path().join("absent.json"))).is_err());
}
