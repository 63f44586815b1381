use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::env;
use std::sync::Arc;

use taphold::config::{Backend, CodegenConfig, RefinementConfig};
use taphold::engines::codegen::expression_function;
use taphold::{
    AppConfig, Dataset, DecisionTreeNode, FeatureEngineer, FitnessEvaluator, HillClimber,
    ImprovementTracker, LogReporter, Mode, OutputStats, RawEvent, ReportQueue, SeedRanker,
    TreeCompiler,
};

/// Synthetic PTH_UP_AFTER_SECOND_DOWN events: holds keep the second key
/// pressed noticeably longer before the tap-hold key comes up.
fn synthetic_events(count: usize, rng: &mut StdRng) -> Vec<RawEvent> {
    (0..count)
        .map(|i| {
            let is_mod = rng.gen_bool(0.3);
            let start = i as f64 * 1_000.0;
            let second_press = start + rng.gen_range(20.0..200.0);
            let overlap = if is_mod {
                rng.gen_range(90.0..300.0)
            } else {
                rng.gen_range(5.0..110.0)
            };
            RawEvent {
                is_mod: if is_mod { 1.0 } else { 0.0 },
                pth_press_time: start,
                second_press_time: second_press,
                pth_release_time: second_press + overlap,
                second_release_time: second_press + overlap + rng.gen_range(1.0..80.0),
                third_press_time: second_press + overlap + 400.0,
                key_released_before_pth_release_time: start - rng.gen_range(50.0..500.0),
                pth_prev_prev_press_to_prev_press_dur: rng.gen_range(80.0..400.0),
                pth_prev_press_to_pth_press_dur: rng.gen_range(80.0..400.0),
                pth_prev_prev_overlap_dur: rng.gen_range(0.0..150.0),
                pth_prev_overlap_dur: rng.gen_range(0.0..150.0),
                down_count: 2.0,
                ..Default::default()
            }
        })
        .collect()
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let formula = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("sd(pth_press_to_second_press_dur, 100) + 0.2*down_count - 0.5");
    let patience = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(2_000);

    let mut config = AppConfig::for_mode(Mode::PthUpAfterSecondDown);
    config.refinement = RefinementConfig {
        max_iterations_without_improvement: Some(patience),
        seed: Some(42),
        ..RefinementConfig::default()
    };
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let mut rng = StdRng::seed_from_u64(7);
    let events = synthetic_events(20_000, &mut rng);
    let rows = FeatureEngineer::new(config.mode).derive_all(events.iter());
    let (training, validation) = Dataset::from(rows).split_sample(8_000, &mut rng);
    println!(
        "Training on {} rows ({} holds), validating on {}",
        training.len(),
        training.mod_count(),
        validation.len()
    );

    let evaluator = FitnessEvaluator::new(config.mode, config.fitness.clone());
    let seeds = [
        formula,
        "sd(pth_press_to_second_press_dur, 90)",
        "pth_prev_overlap_dur / 200 + 0.1",
    ];
    let ranker = SeedRanker::new(config.mode, config.seeding.clone());
    let ranked = ranker.rank(&seeds, &training, &evaluator, &mut rng);
    let Some(best) = ranked.first() else {
        eprintln!("None of the seed formulas could be scored");
        std::process::exit(1);
    };
    if let Some(stats) = OutputStats::collect(&best.expression, training.iter()) {
        println!("Outputs of the best seed:\n{}", stats);
    }
    let mut tree = best.expression.clone();
    println!("Initial fitness: {}", best.fitness);

    let reporter = LogReporter::new(evaluator.clone(), Arc::new(validation), training.len());
    let queue = ReportQueue::start(reporter);
    let sender = queue.sender();
    let mut tracker = ImprovementTracker::new();
    let mut reports = 0u64;

    let climber = HillClimber::new(config.refinement.clone());
    let mut climb_rng = climber.rng();
    let result = climber.refine_expression(
        &mut tree,
        &training,
        &evaluator,
        &mut climb_rng,
        |best, fitness, _tries| {
            // treat each report as one generation past the validation warm-up
            reports += 1;
            tracker.observe(&sender, reports + 10, fitness, best);
        },
    );

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Refinement failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(reporter) = queue.finish() {
        println!("{} improvements reported", reporter.reports().len());
    }
    println!(
        "Refined fitness {} after {} iterations: {}",
        result.fitness, result.iterations, tree
    );
    match expression_function(&tree, config.mode) {
        Ok(code) => println!("\n{}", code),
        Err(e) => eprintln!("Could not lower the formula: {}", e),
    }

    // a stump on the same feature, the way an induced tree would come back
    let compiler = TreeCompiler::for_mode(
        config.mode,
        CodegenConfig {
            backend: Backend::Ternary,
            max_depth: 1,
            ..CodegenConfig::default()
        },
    );
    let Some(feature) = compiler
        .schema()
        .names()
        .iter()
        .position(|n| n == "pth_press_to_second_press_dur")
    else {
        eprintln!("Feature missing from the schema");
        std::process::exit(1);
    };
    let stump = DecisionTreeNode::split(
        feature,
        100.0,
        DecisionTreeNode::leaf(0.0),
        DecisionTreeNode::leaf(1.0),
    );
    match compiler.compile_with_doc(&stump, "Stump on the second key delay.") {
        Ok(code) => println!("{}", code),
        Err(e) => eprintln!("Could not compile the tree: {}", e),
    }
}
