/// End-to-end recognition on synthetic scenes
use common::plates::{PlateLayout, PlateResult};
use image::{imageops, GrayImage};
use recognition::synthetic::{render_plate, Scene};
use recognition::{initialize, Image, Outcome, RecognitionConfig, RecognitionModel};
use std::sync::Arc;
use std::thread;

fn default_model() -> RecognitionModel {
    initialize(RecognitionConfig::default()).unwrap()
}

fn model_with_threshold(threshold: f32) -> RecognitionModel {
    let mut config = RecognitionConfig::default();
    config.assembler.acceptance_threshold = threshold;
    initialize(config).unwrap()
}

/// Single-row plate centred on a dark background
fn single_plate_scene() -> Scene {
    let plate = render_plate(&["51F12345"], 6).unwrap();
    Scene::new(400, 200, 40).place_centered(&plate)
}

fn two_row_scene() -> Image {
    let plate = render_plate(&["59-X1", "123.45"], 4).unwrap();
    Scene::new(300, 200, 40).place(&plate, 80, 60).into_image().unwrap()
}

/// A large plate and a small one; the detector prefers the larger
fn two_size_scene() -> Image {
    let big = render_plate(&["51F12345"], 6).unwrap();
    let small = render_plate(&["30A67890"], 3).unwrap();
    Scene::new(800, 400, 40)
        .place(&small, 40, 40)
        .place(&big, 400, 250)
        .into_image()
        .unwrap()
}

/// Plate centred in a frame of background `margin` pixels larger each way
fn framed(plate: &GrayImage, background: u8, margin: (u32, u32)) -> Scene {
    Scene::new(plate.width() + margin.0, plate.height() + margin.1, background)
        .place_centered(plate)
}

fn blank_images() -> Vec<Image> {
    vec![
        Scene::new(320, 240, 0).into_image().unwrap(),
        Scene::new(320, 240, 255).into_image().unwrap(),
        Scene::new(320, 240, 128).into_image().unwrap(),
        Image::new(8, 8, 3, vec![200; 8 * 8 * 3]).unwrap(),
    ]
}

#[test]
fn test_axis_aligned_plate_is_read() {
    let model = default_model();
    let image = single_plate_scene().into_image().unwrap();

    let result = model.predict(&image).unwrap();
    assert_eq!(result.as_text(), "51F12345");
    match result {
        PlateResult::Accepted {
            confidence,
            layout,
            detection_confidence,
            ..
        } => {
            assert!((0.5..=1.0).contains(&confidence));
            assert!(detection_confidence >= 0.5);
            assert_eq!(layout, PlateLayout::SingleRow);
        }
        PlateResult::NoPlate => panic!("expected a plate"),
    }
}

#[test]
fn test_blank_images_have_no_plate() {
    let model = default_model();
    for image in blank_images() {
        let recognition = model.recognize(&image).unwrap();
        assert_eq!(recognition.result, PlateResult::NoPlate);
        assert_eq!(recognition.candidates_evaluated(), 0);
    }
}

#[test]
fn test_rotated_plate_reads_the_same() {
    let model = default_model();
    for degrees in [15.0, -15.0] {
        let image = single_plate_scene().rotate(degrees).into_image().unwrap();
        let result = model.predict(&image).unwrap();
        assert_eq!(result.as_text(), "51F12345", "rotation {degrees}");
    }
}

#[test]
fn test_rotated_two_row_plate_keeps_every_glyph() {
    let model = default_model();
    for scale in [4, 5, 6, 7] {
        let plate = render_plate(&["59-X1", "123.45"], scale).unwrap();
        for degrees in [15.0, -15.0] {
            let image = framed(&plate, 40, (160, 140)).rotate(degrees).into_image().unwrap();
            let result = model.predict(&image).unwrap();
            assert_eq!(result.as_text(), "59X112345", "scale {scale}, rotation {degrees}");
        }
    }
}

#[test]
fn test_plate_on_light_background_is_read() {
    let model = default_model();
    for background in [200, 230] {
        for scale in [3, 6] {
            let plate = render_plate(&["51F12345"], scale).unwrap();
            let image = framed(&plate, background, (100, 130)).into_image().unwrap();
            let result = model.predict(&image).unwrap();
            assert_eq!(result.as_text(), "51F12345", "background {background}, scale {scale}");
        }
    }
}

#[test]
fn test_light_text_on_dark_plate_is_read() {
    let model = default_model();
    let mut plate = render_plate(&["51F12345"], 6).unwrap();
    imageops::invert(&mut plate);

    for background in [128, 200] {
        let image = framed(&plate, background, (100, 130)).into_image().unwrap();
        let result = model.predict(&image).unwrap();
        assert_eq!(result.as_text(), "51F12345", "background {background}");
    }
}

#[test]
fn test_larger_plate_wins() {
    let model = default_model();
    let recognition = model.recognize(&two_size_scene()).unwrap();

    assert_eq!(recognition.result.as_text(), "51F12345");
    assert_eq!(recognition.outcomes[0].rank, 0);
    assert!(matches!(recognition.outcomes[0].outcome, Outcome::Accepted { .. }));
}

#[test]
fn test_two_row_plate_reads_top_row_first() {
    let model = default_model();
    let result = model.predict(&two_row_scene()).unwrap();

    // Separators are dropped as noise
    assert_eq!(result.as_text(), "59X112345");
    assert!(matches!(
        result,
        PlateResult::Accepted {
            layout: PlateLayout::TwoRow,
            ..
        }
    ));
}

#[test]
fn test_accepted_text_respects_length_range() {
    let model = default_model();
    let (min, max) = {
        let assembler = &model.config().assembler;
        (assembler.min_length, assembler.max_length)
    };

    for image in [
        single_plate_scene().into_image().unwrap(),
        two_row_scene(),
        two_size_scene(),
    ] {
        let result = model.predict(&image).unwrap();
        assert!(result.is_plate());
        let len = result.as_text().chars().count();
        assert!((min..=max).contains(&len), "length {len}");
    }
}

#[test]
fn test_predict_is_idempotent() {
    let model = default_model();
    let image = two_row_scene();

    let first = model.predict(&image).unwrap();
    for _ in 0..3 {
        assert_eq!(model.predict(&image).unwrap(), first);
    }
}

#[test]
fn test_concurrent_predictions_agree() {
    let model = Arc::new(default_model());
    let image = Arc::new(single_plate_scene().rotate(15.0).into_image().unwrap());
    let expected = model.predict(&image).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let model = Arc::clone(&model);
            let image = Arc::clone(&image);
            thread::spawn(move || model.predict(&image).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_lower_threshold_keeps_accepted_plates() {
    let strict = default_model();
    let lenient = model_with_threshold(0.2);

    for image in [
        single_plate_scene().into_image().unwrap(),
        two_row_scene(),
        two_size_scene(),
    ] {
        if strict.predict(&image).unwrap().is_plate() {
            assert!(lenient.predict(&image).unwrap().is_plate());
        }
    }
}

#[test]
fn test_rejected_candidates_yield_no_plate() {
    // No rendered plate has twelve characters
    let mut config = RecognitionConfig::default();
    config.assembler.min_length = 12;
    config.assembler.max_length = 12;
    let model = initialize(config).unwrap();

    let recognition = model.recognize(&single_plate_scene().into_image().unwrap()).unwrap();
    assert_eq!(recognition.result, PlateResult::NoPlate);
    assert!(recognition.candidates_evaluated() >= 1);
    assert!(recognition
        .outcomes
        .iter()
        .all(|o| !matches!(o.outcome, Outcome::Accepted { .. })));
}
