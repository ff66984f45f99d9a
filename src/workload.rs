//! Producer/consumer workload driver.
//!
//! Spawns producer and consumer threads against one [`Queue`], closes the
//! queue once every producer has finished, and reports what each consumer
//! received. The canonical single/double producer and consumer shapes are
//! available as [`Scenario`]s.

use std::any::Any;
use std::str::FromStr;
use std::time::Instant;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::{Queue, QueueStats};
use crate::telemetry::metrics;
use crate::telemetry::worker::{record_finished, start_worker_span};

/// What a workload run produced and where it went.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub queue: String,
    pub producers: usize,
    pub items_per_producer: u64,
    /// Number of items pushed by all producers.
    pub produced: u64,
    /// Items in the order each consumer dequeued them, one entry per consumer.
    pub received: Vec<Vec<u64>>,
    /// Queue counters taken after every thread joined.
    pub stats: QueueStats,
    pub elapsed_ms: u64,
}

impl Report {
    /// Number of items received across all consumers.
    pub fn total(&self) -> u64 {
        self.received.iter().map(|items| items.len() as u64).sum()
    }

    /// True if every produced value was received exactly once.
    pub fn is_exact(&self) -> bool {
        let mut all: Vec<u64> = self.received.iter().flatten().copied().collect();
        all.sort_unstable();
        all.len() as u64 == self.produced && all.iter().copied().eq(0..self.produced)
    }

    /// True if every consumer saw each producer's values in push order.
    pub fn preserves_producer_order(&self) -> bool {
        let per = self.items_per_producer.max(1);
        self.received.iter().all(|items| {
            let mut last: Vec<Option<u64>> = vec![None; self.producers];
            items.iter().all(|&value| {
                let Some(slot) = last.get_mut((value / per) as usize) else {
                    return false;
                };
                let in_order = slot.is_none_or(|prev| prev < value);
                *slot = Some(value);
                in_order
            })
        })
    }
}

/// Run the workload described by `config`.
///
/// Producer `i` pushes `i * items_per_producer .. (i + 1) * items_per_producer`
/// in order. The queue is closed exactly once, after all producers joined.
///
/// # Errors
///
/// Returns [`Error::Config`] for an invalid shape, or the first producer
/// error or thread panic. The queue is still closed in that case so every
/// consumer exits.
pub fn run(config: &Config) -> Result<Report> {
    config.validate()?;

    let run_id = Uuid::new_v4();
    let queue = Queue::named(config.queue_name.clone());
    let per = config.items_per_producer;
    let started = Instant::now();

    info!(
        run.id = %run_id,
        queue = %queue.name(),
        producers = config.producers,
        consumers = config.consumers,
        items = config.total_items(),
        "starting workload"
    );

    let received = std::thread::scope(|s| {
        let queue = &queue;

        let consumers: Vec<_> = (0..config.consumers)
            .map(|index| s.spawn(move || consume(queue, run_id, index)))
            .collect();
        let producers: Vec<_> = (0..config.producers)
            .map(|index| s.spawn(move || produce(queue, run_id, index, index as u64 * per, per)))
            .collect();

        let mut failure = None;
        for handle in producers {
            let outcome = handle.join().unwrap_or_else(|panic| Err(worker_panic(panic)));
            if let Err(e) = outcome {
                failure.get_or_insert(e);
            }
        }

        queue.close();

        let mut received = Vec::with_capacity(config.consumers);
        for handle in consumers {
            match handle.join() {
                Ok(items) => received.push(items),
                Err(panic) => {
                    failure.get_or_insert(worker_panic(panic));
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(received),
        }
    })?;

    let elapsed = started.elapsed();
    metrics::run_duration_ms().record(
        elapsed.as_secs_f64() * 1000.0,
        &[KeyValue::new("queue", config.queue_name.clone())],
    );

    let report = Report {
        run_id,
        queue: config.queue_name.clone(),
        producers: config.producers,
        items_per_producer: per,
        produced: config.total_items(),
        received,
        stats: queue.stats(),
        elapsed_ms: elapsed.as_millis() as u64,
    };

    info!(
        run.id = %run_id,
        received = report.total(),
        elapsed_ms = report.elapsed_ms,
        "workload finished"
    );
    Ok(report)
}

fn produce(queue: &Queue<u64>, run_id: Uuid, index: usize, start: u64, count: u64) -> Result<()> {
    let span = start_worker_span(&run_id, "producer", index);
    let _entered = span.enter();

    for value in start..start + count {
        debug!(value, thread = index, "pushing");
        queue.enqueue(value)?;
    }

    metrics::items_processed().add(count, &[KeyValue::new("role", "producer")]);
    record_finished(&span, count);
    Ok(())
}

fn consume(queue: &Queue<u64>, run_id: Uuid, index: usize) -> Vec<u64> {
    let span = start_worker_span(&run_id, "consumer", index);
    let _entered = span.enter();

    let mut received = Vec::new();
    for value in queue {
        debug!(value, thread = index, "emitting");
        received.push(value);
    }

    let count = received.len() as u64;
    metrics::items_processed().add(count, &[KeyValue::new("role", "consumer")]);
    record_finished(&span, count);
    received
}

fn worker_panic(panic: Box<dyn Any + Send>) -> Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    Error::Worker(message)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// The canonical queue exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// One producer pushes 0..10, one consumer drains in order.
    SingleProducerSingleConsumer,
    /// One producer pushes 0..10, two consumers share the work.
    SingleProducerDoubleConsumer,
    /// Two producers race 0..10 and 10..20, two consumers drain.
    DoubleProducerDoubleConsumer,
    /// Enqueue after close must be rejected.
    EnqueueAfterClose,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::SingleProducerSingleConsumer,
        Scenario::SingleProducerDoubleConsumer,
        Scenario::DoubleProducerDoubleConsumer,
        Scenario::EnqueueAfterClose,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Scenario::SingleProducerSingleConsumer => "a",
            Scenario::SingleProducerDoubleConsumer => "b",
            Scenario::DoubleProducerDoubleConsumer => "c",
            Scenario::EnqueueAfterClose => "d",
        }
    }

    /// Workload shape, or `None` for scenarios that are not a workload run.
    pub fn config(self) -> Option<Config> {
        let (producers, consumers) = match self {
            Scenario::SingleProducerSingleConsumer => (1, 1),
            Scenario::SingleProducerDoubleConsumer => (1, 2),
            Scenario::DoubleProducerDoubleConsumer => (2, 2),
            Scenario::EnqueueAfterClose => return None,
        };
        Some(Config {
            producers,
            consumers,
            items_per_producer: 10,
            queue_name: format!("scenario-{}", self.label()),
            ..Config::default()
        })
    }
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::Config(format!("unknown scenario '{s}', expected one of a, b, c, d"))
            })
    }
}

/// What a scenario run observed.
#[derive(Debug)]
pub enum ScenarioOutcome {
    /// A workload scenario drained completely.
    Drained(Report),
    /// The post-close enqueue was rejected with this error.
    Rejected { error: Error, stats: QueueStats },
}

impl ScenarioOutcome {
    /// True if the scenario behaved as the queue contract requires.
    pub fn passed(&self, scenario: Scenario) -> bool {
        match self {
            ScenarioOutcome::Drained(report) => {
                let ordered = scenario != Scenario::SingleProducerSingleConsumer
                    || report.received.first().is_some_and(|items| items.is_sorted());
                report.is_exact() && report.preserves_producer_order() && ordered
            }
            ScenarioOutcome::Rejected { error, stats } => {
                error.is_closed() && stats.enqueued == 1 && stats.pending == 1
            }
        }
    }
}

/// Run one canonical scenario.
pub fn run_scenario(scenario: Scenario) -> Result<ScenarioOutcome> {
    if let Some(config) = scenario.config() {
        return run(&config).map(ScenarioOutcome::Drained);
    }

    let queue = Queue::named(format!("scenario-{}", scenario.label()));
    queue.enqueue(0u64)?;
    queue.close();
    match queue.enqueue(0) {
        Err(error) => Ok(ScenarioOutcome::Rejected {
            error,
            stats: queue.stats(),
        }),
        Ok(()) => Err(Error::Other("enqueue after close was accepted".to_string())),
    }
}
