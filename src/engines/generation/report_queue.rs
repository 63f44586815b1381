use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use crate::engines::generation::ast::ExpressionNode;

/// A new best candidate, queued for reporting.
#[derive(Debug, Clone)]
pub struct Improvement {
    pub generation: u64,
    pub fitness: f64,
    pub expression: ExpressionNode,
    pub found_at: DateTime<Utc>,
}

impl Improvement {
    pub fn new(generation: u64, fitness: f64, expression: ExpressionNode) -> Self {
        Self {
            generation,
            fitness,
            expression,
            found_at: Utc::now(),
        }
    }
}

/// Receives improvements on the queue's consumer thread.
pub trait ReportConsumer: Send {
    fn process(&mut self, item: Improvement);

    fn on_stop(&mut self) {}
}

impl<F> ReportConsumer for F
where
    F: FnMut(Improvement) + Send,
{
    fn process(&mut self, item: Improvement) {
        self(item)
    }
}

enum ReportMessage {
    Item(Improvement),
    /// Makes the consumer look at the abort flag.
    Wake,
    /// Everything sent before has been processed.
    Finish,
}

/// Cloneable producer side of a [`ReportQueue`].
///
/// Offers hold the read side of `open` while sending, so nothing is accepted
/// after the queue closed.
#[derive(Clone)]
pub struct ReportSender {
    sender: Sender<ReportMessage>,
    open: Arc<RwLock<bool>>,
}

impl ReportSender {
    /// Queues `item` without waiting for the consumer. Returns `false` once
    /// the queue stopped.
    pub fn offer(&self, item: Improvement) -> bool {
        let open = self.open.read().unwrap_or_else(|e| e.into_inner());
        *open && self.sender.send(ReportMessage::Item(item)).is_ok()
    }

    pub fn is_open(&self) -> bool {
        *self.open.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Rejects further offers and sends `last` as the final message.
    fn close_with(&self, last: ReportMessage) {
        let mut open = self.open.write().unwrap_or_else(|e| e.into_inner());
        *open = false;
        let _ = self.sender.send(last);
    }
}

/// Unbounded queue with one consumer thread.
///
/// Producers never wait for the consumer. [`ReportQueue::shutdown`] stops the
/// consumer after the item it is working on and drops everything still
/// queued; [`ReportQueue::finish`] processes the backlog first.
pub struct ReportQueue<C: ReportConsumer + 'static> {
    sender: ReportSender,
    abort: Arc<AtomicBool>,
    handle: Option<JoinHandle<C>>,
}

impl<C: ReportConsumer + 'static> ReportQueue<C> {
    pub fn start(consumer: C) -> Self {
        let (tx, rx) = mpsc::channel();
        let abort = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&abort);

        let handle = thread::spawn(move || consume(consumer, rx, flag));

        Self {
            sender: ReportSender {
                sender: tx,
                open: Arc::new(RwLock::new(true)),
            },
            abort,
            handle: Some(handle),
        }
    }

    pub fn sender(&self) -> ReportSender {
        self.sender.clone()
    }

    pub fn offer(&self, item: Improvement) -> bool {
        self.sender.offer(item)
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_open()
    }

    /// Stops without processing the backlog. Returns the consumer unless it
    /// panicked.
    pub fn shutdown(mut self) -> Option<C> {
        self.stop_now()
    }

    /// Processes everything offered so far, then stops.
    pub fn finish(mut self) -> Option<C> {
        let handle = self.handle.take()?;
        self.sender.close_with(ReportMessage::Finish);
        handle.join().ok()
    }

    fn stop_now(&mut self) -> Option<C> {
        let handle = self.handle.take()?;
        self.abort.store(true, Ordering::Release);
        self.sender.close_with(ReportMessage::Wake);
        handle.join().ok()
    }
}

impl<C: ReportConsumer + 'static> Drop for ReportQueue<C> {
    fn drop(&mut self) {
        self.stop_now();
    }
}

fn consume<C: ReportConsumer>(mut consumer: C, rx: Receiver<ReportMessage>, abort: Arc<AtomicBool>) -> C {
    log::debug!("Report consumer started");
    let mut processed = 0usize;

    while let Ok(message) = rx.recv() {
        match message {
            ReportMessage::Item(item) => {
                if abort.load(Ordering::Acquire) {
                    break;
                }
                consumer.process(item);
                processed += 1;
            }
            ReportMessage::Wake => {
                if abort.load(Ordering::Acquire) {
                    break;
                }
            }
            ReportMessage::Finish => break,
        }
    }

    consumer.on_stop();
    log::debug!("Report consumer stopped after {} reports", processed);
    consumer
}

/// Best fitness seen so far; lower is better.
#[derive(Debug, Clone, Default)]
pub struct ImprovementTracker {
    best: Option<f64>,
}

impl ImprovementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Records `fitness` and returns whether it is a new best.
    pub fn update(&mut self, fitness: f64) -> bool {
        if !fitness.is_finite() {
            return false;
        }
        match self.best {
            Some(best) if best <= fitness => false,
            _ => {
                self.best = Some(fitness);
                true
            }
        }
    }

    /// Offers the generation's best to `sender` if it improves on everything
    /// seen before.
    pub fn observe(
        &mut self,
        sender: &ReportSender,
        generation: u64,
        fitness: f64,
        expression: &ExpressionNode,
    ) -> bool {
        if !self.update(fitness) {
            return false;
        }
        sender.offer(Improvement::new(generation, fitness, expression.clone()))
    }
}
