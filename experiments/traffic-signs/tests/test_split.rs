// Dataset splitting scenarios on synthetic images.

mod common;

use burn_dataset::Dataset;
use signnet_core::seeded_rng;
use traffic_signs::dataset::{train_validation_test_split, RawImages};

#[test]
fn hundred_images_ten_percent_split() {
    let train = common::synthetic(100, 2);
    let test = common::synthetic(12, 2);
    let mut rng = seeded_rng(7);

    let splits = train_validation_test_split(train, test, 10, &mut rng).unwrap();

    assert_eq!(splits.validation.len(), 10);
    assert_eq!(splits.train.len(), 90);
    assert_eq!(splits.test.len(), 12);
}

#[test]
fn validation_and_train_are_disjoint_samples() {
    let train = common::synthetic(60, 3);
    let originals = train.images.clone();
    let mut rng = seeded_rng(1);

    let splits = train_validation_test_split(train, RawImages::default(), 25, &mut rng).unwrap();

    assert_eq!(splits.train.len() + splits.validation.len(), 60);
    // the synthetic noise term makes every image unique
    for item in splits.validation.items() {
        assert!(originals.contains(&item.image));
        assert!(!splits.train.items().iter().any(|other| other.image == item.image));
    }
}

#[test]
fn labels_become_one_hot() {
    let mut rng = seeded_rng(3);
    let splits =
        train_validation_test_split(common::synthetic(10, 2), common::synthetic(4, 2), 0, &mut rng)
            .unwrap();

    let classes: Vec<usize> = splits.test.items().iter().map(|item| item.label.class()).collect();
    assert_eq!(classes, vec![0, 1, 0, 1]);
    assert!(splits.validation.is_empty());
}

#[test]
fn split_is_reproducible_for_a_seed() {
    let run = |seed| {
        let mut rng = seeded_rng(seed);
        train_validation_test_split(common::synthetic(40, 2), RawImages::default(), 20, &mut rng)
            .unwrap()
            .validation
            .items()
            .to_vec()
    };
    assert_eq!(run(11), run(11));
}
