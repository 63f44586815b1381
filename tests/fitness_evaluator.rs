use rand::rngs::StdRng;
use rand::SeedableRng;

use taphold::config::FitnessConfig;
use taphold::types::feature_vector;
use taphold::{Dataset, FitnessEvaluator, FnPredictor, FormulaParser, Mode, TapholdError, TrainCol};

fn labelled(is_mod: bool, marker: f64) -> taphold::FeatureVector {
    feature_vector(&[
        (TrainCol::IsMod, if is_mod { 1.0 } else { 0.0 }),
        (TrainCol::DownCount, marker),
    ])
}

fn evaluator(recall: f64) -> FitnessEvaluator {
    FitnessEvaluator::new(
        Mode::ThirdDown,
        FitnessConfig {
            min_positive_recall: Some(recall),
            ..FitnessConfig::default()
        },
    )
}

#[test]
fn test_penalty_scenario_four_samples() {
    let evaluator = evaluator(1.0);

    // one hold among four samples, classified correctly
    assert_eq!(evaluator.penalty(1, 1), 0.0);
    // the same hold misclassified
    assert_eq!(evaluator.penalty(0, 1), 200_000.0);

    let data = Dataset::new(vec![
        labelled(true, 1.0),
        labelled(false, 0.0),
        labelled(false, 0.0),
        labelled(false, 0.0),
    ]);
    let perfect = FnPredictor::new(1, |row: &[f64]| row[TrainCol::DownCount.index()]);
    let (fitness, counts) = evaluator.evaluate_with_counts(&data, &perfect);
    assert_eq!(counts.mods, 1);
    assert_eq!(counts.mods_correct, 1);
    assert_eq!(fitness, 0.0);

    let always_tap = FnPredictor::new(1, |_: &[f64]| 0.0);
    let (fitness, counts) = evaluator.evaluate_with_counts(&data, &always_tap);
    assert_eq!(counts.mods_correct, 0);
    assert_eq!(counts.non_mods_correct, 3);
    let loss = (0.1 + 0.5 / 100_000.0) + 200_000.0;
    let expected = loss * (1.0 + evaluator.complexity(1));
    assert!((fitness - expected).abs() < 1e-6);
}

#[test]
fn test_penalty_zero_at_or_above_threshold() {
    let evaluator = evaluator(0.8);
    assert_eq!(evaluator.penalty(8, 10), 0.0);
    assert_eq!(evaluator.penalty(10, 10), 0.0);
    assert_eq!(evaluator.penalty(0, 0), 0.0);
}

#[test]
fn test_penalty_grows_as_recall_drops() {
    let evaluator = evaluator(0.998);
    let mut last = 0.0;
    for correct in (0..=999).rev() {
        let penalty = evaluator.penalty(correct, 1_000);
        if correct >= 998 {
            assert_eq!(penalty, 0.0);
        } else {
            assert!(penalty > last, "{} -> {}", correct, penalty);
        }
        last = penalty;
    }
}

#[test]
fn test_mode_default_recall_threshold() {
    let fast = FitnessEvaluator::new(Mode::FastStreakTap, FitnessConfig::default());
    assert!(fast.penalty(99, 100) > 0.0);
    let third = FitnessEvaluator::new(Mode::ThirdDown, FitnessConfig::default());
    assert_eq!(third.penalty(0, 100), 0.0);
}

#[test]
fn test_larger_trees_score_worse_on_ties() {
    let evaluator = evaluator(0.0);
    let data = Dataset::new(vec![labelled(false, 0.0), labelled(true, 1.0)]);
    let wrong = |row: &[f64]| 1.0 - row[TrainCol::DownCount.index()];
    let small = evaluator.evaluate_full(&data, &FnPredictor::new(3, wrong));
    let large = evaluator.evaluate_full(&data, &FnPredictor::new(30, wrong));
    assert!(small > 0.0);
    assert!(large > small);
}

#[test]
fn test_parallel_matches_sequential() {
    let rows: Vec<_> = (0..20_000)
        .map(|i| labelled(i % 7 == 0, (i % 5) as f64 / 4.0))
        .collect();
    let data = Dataset::new(rows);
    let evaluator = evaluator(0.9);
    let tree = FormulaParser::new(Mode::ThirdDown)
        .parse("max(down_count - 0.3, 0)*2")
        .unwrap();

    let (sequential, counts) = evaluator.evaluate_with_counts(&data, &tree);
    let (parallel, parallel_counts) = evaluator.evaluate_parallel(&data, &tree);
    assert_eq!(counts, parallel_counts);
    assert!((sequential - parallel).abs() <= 1e-9 * sequential.abs().max(1.0));
}

#[test]
fn test_sampling_uses_both_halves() {
    // first half all taps, second half all holds
    let rows: Vec<_> = (0..1_000).map(|i| labelled(i >= 500, 0.0)).collect();
    let data = Dataset::new(rows);
    let evaluator = FitnessEvaluator::new(
        Mode::ThirdDown,
        FitnessConfig {
            sample_per_program: true,
            sample_size: 100,
            min_positive_recall: Some(0.0),
            ..FitnessConfig::default()
        },
    );
    let always_tap = FnPredictor::new(0, |_: &[f64]| 0.0);

    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..20 {
        // exactly the 50 sampled holds are wrong
        let fitness = evaluator.evaluate(&data, &always_tap, &mut rng);
        let expected = 50.0 * (0.1 + 0.5 / 100_000.0);
        assert!((fitness - expected).abs() < 1e-9, "{}", fitness);
    }
}

#[test]
fn test_sampling_falls_back_to_full_data_when_too_small() {
    let data = Dataset::new(vec![labelled(true, 0.0), labelled(false, 0.0)]);
    let evaluator = FitnessEvaluator::new(
        Mode::ThirdDown,
        FitnessConfig {
            sample_per_program: true,
            sample_size: 100,
            ..FitnessConfig::default()
        },
    );
    let always_tap = FnPredictor::new(0, |_: &[f64]| 0.0);
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(
        evaluator.evaluate(&data, &always_tap, &mut rng),
        evaluator.evaluate_full(&data, &always_tap)
    );
}

#[test]
fn test_non_finite_fitness_is_rejected() {
    let data = Dataset::new(vec![labelled(true, 0.0)]);
    let evaluator = FitnessEvaluator::new(
        Mode::ThirdDown,
        FitnessConfig {
            penalty_scale: f64::INFINITY,
            min_positive_recall: Some(1.0),
            ..FitnessConfig::default()
        },
    );
    let always_tap = FnPredictor::new(1, |_: &[f64]| 0.0);
    let mut rng = StdRng::seed_from_u64(1);
    assert!(matches!(
        evaluator.evaluate_checked(&data, &always_tap, &mut rng),
        Err(TapholdError::NonFiniteFitness(_))
    ));
}

#[test]
fn test_overlap_mode_counts_correct_estimates() {
    let evaluator = FitnessEvaluator::new(Mode::OverlapMsForHold, FitnessConfig::default());
    let event = |is_mod: f64, press: f64, second_release: f64, pth_release: f64| {
        feature_vector(&[
            (TrainCol::IsMod, is_mod),
            (TrainCol::SecondPressTime, press),
            (TrainCol::SecondReleaseTime, second_release),
            (TrainCol::PthReleaseTime, pth_release),
        ])
    };
    let data = Dataset::new(vec![
        // 300 ms overlap, hold
        event(1.0, 0.0, 300.0, 400.0),
        // 50 ms overlap, tap
        event(0.0, 0.0, 50.0, 400.0),
    ]);
    let estimate = FnPredictor::new(1, |_: &[f64]| 120.0);
    let (fitness, counts) = evaluator.evaluate_with_counts(&data, &estimate);
    assert_eq!(fitness, 0.0);
    assert_eq!(counts.total_correct(), 2);
}

#[test]
fn test_nan_outputs_are_rejected_in_both_modes() {
    let mut rng = StdRng::seed_from_u64(2);
    let nan = FnPredictor::new(1, |_: &[f64]| f64::NAN);

    let hold_data = Dataset::new(vec![labelled(true, 1.0), labelled(false, 1.0)]);
    let hold = evaluator(0.0);
    assert!(matches!(
        hold.evaluate_checked(&hold_data, &nan, &mut rng),
        Err(TapholdError::NonFiniteFitness(_))
    ));

    // inf - inf for every row
    let overflowing = FormulaParser::new(Mode::ThirdDown)
        .parse("down_count*1e308*10 - down_count*1e308*10")
        .unwrap();
    assert!(matches!(
        hold.evaluate_checked(&hold_data, &overflowing, &mut rng),
        Err(TapholdError::NonFiniteFitness(_))
    ));
    assert!(hold.evaluate_parallel(&hold_data, &overflowing).0.is_nan());

    let overlap = FitnessEvaluator::new(Mode::OverlapMsForHold, FitnessConfig::default());
    let overlap_data = Dataset::new(vec![feature_vector(&[
        (TrainCol::IsMod, 1.0),
        (TrainCol::SecondPressTime, 0.0),
        (TrainCol::SecondReleaseTime, 300.0),
        (TrainCol::PthReleaseTime, 400.0),
    ])]);
    assert!(matches!(
        overlap.evaluate_checked(&overlap_data, &nan, &mut rng),
        Err(TapholdError::NonFiniteFitness(_))
    ));
}
