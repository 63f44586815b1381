use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use taphold::config::FitnessConfig;
use taphold::engines::generation::report_queue::{Improvement, ReportConsumer};
use taphold::types::feature_vector;
use taphold::{
    Dataset, ExpressionNode, FitnessEvaluator, FormulaParser, ImprovementTracker, LogReporter, Mode,
    ReportQueue, TrainCol,
};

#[derive(Default)]
struct Recorder {
    seen: Vec<u64>,
    stopped: bool,
}

impl ReportConsumer for Recorder {
    fn process(&mut self, item: Improvement) {
        self.seen.push(item.generation);
    }

    fn on_stop(&mut self) {
        self.stopped = true;
    }
}

fn improvement(generation: u64) -> Improvement {
    Improvement::new(generation, 1.0 / (generation + 1) as f64, ExpressionNode::Const(1.0))
}

#[test]
fn test_finish_processes_backlog_in_order() {
    let queue = ReportQueue::start(Recorder::default());
    for g in 0..100 {
        assert!(queue.offer(improvement(g)));
    }
    let recorder = queue.finish().unwrap();
    assert_eq!(recorder.seen, (0..100).collect::<Vec<_>>());
    assert!(recorder.stopped);
}

#[test]
fn test_offer_after_stop_is_rejected() {
    let queue = ReportQueue::start(Recorder::default());
    let sender = queue.sender();
    assert!(sender.offer(improvement(1)));
    let recorder = queue.finish().unwrap();
    assert_eq!(recorder.seen, vec![1]);
    assert!(!sender.offer(improvement(2)));
}

#[test]
fn test_shutdown_stops_after_current_item() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let processed = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&processed);
    let blocker = move |item: Improvement| {
        if item.generation == 0 {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }
        record.lock().unwrap().push(item.generation);
    };

    let queue = ReportQueue::start(blocker);
    assert!(queue.offer(improvement(0)));
    started_rx.recv().unwrap();
    for g in 1..50 {
        assert!(queue.offer(improvement(g)));
    }

    // let the consumer go on only once the queue is closed
    let watcher = queue.sender();
    let releaser = thread::spawn(move || {
        while watcher.is_open() {
            thread::sleep(Duration::from_millis(1));
        }
        let _ = release_tx.send(());
    });
    assert!(queue.is_running());
    assert!(queue.shutdown().is_some());
    releaser.join().unwrap();

    assert_eq!(*processed.lock().unwrap(), vec![0]);
}

#[test]
fn test_finish_processes_every_accepted_offer() {
    let queue = ReportQueue::start(Recorder::default());
    let sender = queue.sender();

    let producer = thread::spawn(move || {
        let mut accepted = 0u64;
        while sender.offer(improvement(accepted)) {
            accepted += 1;
            if accepted % 64 == 0 {
                thread::sleep(Duration::from_micros(100));
            }
        }
        accepted
    });
    thread::sleep(Duration::from_millis(20));

    let recorder = queue.finish().unwrap();
    let accepted = producer.join().unwrap();
    assert_eq!(recorder.seen.len() as u64, accepted);
    assert_eq!(recorder.seen, (0..accepted).collect::<Vec<_>>());
}

#[test]
fn test_producers_never_block() {
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let slow = move |_: Improvement| {
        let _ = release_rx.recv_timeout(Duration::from_secs(5));
    };
    let queue = ReportQueue::start(slow);
    let sender = queue.sender();

    let producer = thread::spawn(move || {
        for g in 0..10_000 {
            assert!(sender.offer(improvement(g)));
        }
    });
    producer.join().unwrap();
    drop(release_tx);
    assert!(queue.shutdown().is_some());
}

#[test]
fn test_tracker_reports_only_new_bests() {
    let queue = ReportQueue::start(Recorder::default());
    let sender = queue.sender();
    let mut tracker = ImprovementTracker::new();
    let expr = ExpressionNode::Const(0.5);

    let fitness_by_generation = [9.0, 9.0, 7.0, 8.0, 7.0, 1.0, f64::NAN, 0.5];
    for (g, fitness) in fitness_by_generation.iter().enumerate() {
        tracker.observe(&sender, g as u64, *fitness, &expr);
    }

    let recorder = queue.finish().unwrap();
    assert_eq!(recorder.seen, vec![0, 2, 5, 7]);
    assert_eq!(tracker.best(), Some(0.5));
}

#[test]
fn test_log_reporter_skips_validation_early() {
    let validation = Dataset::new(vec![
        feature_vector(&[(TrainCol::IsMod, 1.0), (TrainCol::DownCount, 1.0)]),
        feature_vector(&[(TrainCol::IsMod, 0.0), (TrainCol::DownCount, 0.0)]),
    ]);
    let evaluator = FitnessEvaluator::new(Mode::ThirdDown, FitnessConfig::default());
    let reporter = LogReporter::new(evaluator, Arc::new(validation), 2);
    let expr = FormulaParser::new(Mode::ThirdDown).parse("down_count*0.9").unwrap();

    let queue = ReportQueue::start(reporter);
    queue.offer(Improvement::new(3, 0.2, expr.clone()));
    queue.offer(Improvement::new(11, 0.1, expr));
    let reporter = queue.finish().unwrap();

    let reports = reporter.reports();
    assert_eq!(reports.len(), 2);
    assert!(reports[0].counts.is_none());
    let counts = reports[1].counts.unwrap();
    assert_eq!(counts.total_correct(), 2);
    assert_eq!(
        reports[1].c_code.as_deref(),
        Some("return down_count * 0.9f;")
    );

    let text = reports[1].to_string();
    assert!(text.contains("Generations:      11"));
    assert!(text.contains("Mode:             third_down"));
}

#[test]
fn test_refined_reports_carry_tries() {
    let evaluator = FitnessEvaluator::new(Mode::ThirdDown, FitnessConfig::default());
    let mut reporter = LogReporter::new(evaluator, Arc::new(Dataset::default()), 0);
    reporter.report_refined(&ExpressionNode::Const(0.25), 3.0, 42);

    let report = &reporter.reports()[0];
    assert_eq!(report.tries, Some(42));
    assert!(report.generation.is_none());
    assert!(report.counts.is_none());
    assert!(report.to_string().starts_with("Tries:            42"));
}
