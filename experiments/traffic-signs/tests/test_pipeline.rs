// Run modes against a throwaway project directory.

mod common;

use std::{fs, path::Path};

use burn_candle::CandleDevice;
use image::{Rgb, RgbImage};
use traffic_signs::{
    checkpoint::CheckpointStore, model::TrafficSignNet, run_evaluate, run_predict, run_train,
    InferenceBackend, ProjectPaths,
};

const HEADER: &str = "Filename;Width;Height;Roi.X1;Roi.Y1;Roi.X2;Roi.Y2;ClassId\n";

fn write_sign(path: &Path, colour: [u8; 3]) {
    RgbImage::from_fn(36, 36, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            Rgb(colour)
        } else {
            Rgb([255 - colour[0], 255 - colour[1], 255 - colour[2]])
        }
    })
    .save(path)
    .unwrap();
}

/// Two training classes with `per_class` images each, plus a four-image test set.
fn write_gtsrb(paths: &ProjectPaths, per_class: usize) {
    let colours = [[200, 30, 30], [30, 30, 200]];

    for (class_id, colour) in colours.iter().enumerate() {
        let dir = paths.train_images.join(format!("{class_id:05}"));
        fs::create_dir_all(&dir).unwrap();
        let mut csv = String::from(HEADER);
        for i in 0..per_class {
            let name = format!("{class_id:05}_{i:05}.png");
            write_sign(&dir.join(&name), *colour);
            csv.push_str(&format!("{name};36;36;2;2;33;33;{class_id}\n"));
        }
        fs::write(dir.join(format!("GT-{class_id:05}.csv")), csv).unwrap();
    }

    fs::create_dir_all(&paths.test_images).unwrap();
    let mut csv = String::from(HEADER);
    for i in 0..4 {
        let class_id = i % 2;
        let name = format!("{i:05}.png");
        write_sign(&paths.test_images.join(&name), colours[class_id]);
        csv.push_str(&format!("{name};36;36;2;2;33;33;{class_id}\n"));
    }
    fs::write(paths.test_images.join("GT-final_test.csv"), csv).unwrap();
}

#[test]
fn predict_ranks_every_new_image() {
    let root = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::new(root.path());

    let model = TrafficSignNet::<InferenceBackend>::init(&CandleDevice::Cpu, 3);
    CheckpointStore::new(&paths.models).save(&model, 4).unwrap();

    fs::create_dir_all(&paths.new_images).unwrap();
    write_sign(&paths.new_images.join("b.png"), [10, 200, 10]);
    write_sign(&paths.new_images.join("a.png"), [200, 200, 10]);

    let predictions = run_predict(&paths, &common::tiny_config()).unwrap();

    assert_eq!(predictions.len(), 2);
    assert!(predictions[0].0.ends_with("a.png"));
    for (_, ranked) in &predictions {
        assert_eq!(ranked.classes.len(), 5);
        assert!(ranked
            .probabilities
            .windows(2)
            .all(|pair| pair[0] >= pair[1]));
    }

    let report = fs::read_to_string(&paths.report).unwrap();
    assert!(report.contains("#### a.png"));
    assert!(report.contains("checkpoint from epoch 4"));
}

#[test]
fn predict_without_checkpoint_fails() {
    let root = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::new(root.path());
    fs::create_dir_all(&paths.new_images).unwrap();
    write_sign(&paths.new_images.join("a.png"), [1, 2, 3]);

    assert!(run_predict(&paths, &common::tiny_config()).is_err());
}

#[test]
fn run_modes_reject_invalid_config() {
    let root = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::new(root.path());
    write_gtsrb(&paths, 2);

    let mut config = common::tiny_config();
    config.verbose = true;
    config.checkpoint_interval = 0;

    assert!(run_train(&paths, &config).is_err());
    assert!(!paths.models.exists());
    assert!(!paths.report.exists());

    config.checkpoint_interval = 5;
    config.top_k = 0;
    assert!(run_evaluate(&paths, &config).is_err());
    assert!(run_predict(&paths, &config).is_err());
}

#[test]
fn train_then_evaluate_on_disk_dataset() {
    let root = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::new(root.path());
    write_gtsrb(&paths, 6);

    let mut config = common::tiny_config();
    config.verbose = true;
    config.num_epochs = 2;
    config.validation_split_pct = 20;

    let report = run_train(&paths, &config).unwrap();
    assert_eq!(report.history.len(), 2);
    assert_eq!(report.checkpoints, vec![0, 1]);
    assert!(report.history.iter().all(|m| m.validation_accuracy.is_some()));
    assert_eq!(report.test.predictions.len(), 4);

    let notebook = fs::read_to_string(&paths.report).unwrap();
    for section in ["learning-curve", "class-distribution", "activations", "failed-cases"] {
        assert!(notebook.contains(&format!("<!-- SECTION:{section} start -->")));
    }
    assert!(notebook.contains("| 0 | 6 |"));

    let evaluation = run_evaluate(&paths, &config).unwrap();
    assert_eq!(evaluation.predictions.len(), 4);
    assert_eq!(evaluation.predictions, report.test.predictions);
}
