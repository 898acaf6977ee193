/*!
 * Dish-Washing Pipeline
 *
 * An eater stacks dirty cutlery on a rack, a washer takes from the top.
 * The rack is a LIFO bounded queue, so the eater blocks when it is full.
 * One cancellation token stops both sides. With a patience set, a side
 * that waits longer than that on the rack gives up on that one attempt,
 * counts a stall and carries on.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::guard::TimeoutPolicy;
use crate::core::sync::{AtomicCell, BoundedQueue, CancellationToken, QueueOrder, QueueStats};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cutlery {
    Fork,
    Spoon,
    Plate,
    Knife,
}

impl Cutlery {
    pub const ALL: [Cutlery; 4] = [Cutlery::Fork, Cutlery::Spoon, Cutlery::Plate, Cutlery::Knife];
}

impl fmt::Display for Cutlery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cutlery::Fork => "fork",
            Cutlery::Spoon => "spoon",
            Cutlery::Plate => "plate",
            Cutlery::Knife => "knife",
        };
        f.write_str(name)
    }
}

/// Pacing for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub rack_capacity: usize,
    pub eat_interval: Duration,
    pub wash_interval: Duration,
    /// How long to run before cancelling
    pub run_for: Duration,
    pub seed: u64,
    /// Longest single wait on the rack; `None` waits until cancelled
    pub patience: Option<Duration>,
}

impl Default for PipelinePlan {
    fn default() -> Self {
        Self {
            rack_capacity: 10,
            eat_interval: Duration::from_millis(5),
            wash_interval: Duration::from_millis(30),
            run_for: Duration::from_millis(300),
            seed: 7,
            patience: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub dirtied: usize,
    pub washed: usize,
    pub left_on_rack: usize,
    /// Rack waits that ran out of patience
    pub stalls: usize,
    pub rack: QueueStats,
}

pub struct DishPipeline {
    rack: BoundedQueue<Cutlery>,
    eat_interval: Duration,
    wash_interval: Duration,
    patience: TimeoutPolicy,
    stalls: AtomicCell<usize>,
}

impl DishPipeline {
    pub fn new(rack_capacity: usize, eat_interval: Duration, wash_interval: Duration) -> SyncResult<Self> {
        Ok(Self {
            rack: BoundedQueue::named("dish_rack", rack_capacity, QueueOrder::Lifo)?,
            eat_interval,
            wash_interval,
            patience: TimeoutPolicy::None,
            stalls: AtomicCell::new(0),
        })
    }

    /// Bound every single wait on the rack by `patience`
    pub fn with_patience(mut self, patience: TimeoutPolicy) -> Self {
        self.patience = patience;
        self
    }

    pub fn stalls(&self) -> usize {
        self.stalls.load()
    }

    pub fn rack(&self) -> &BoundedQueue<Cutlery> {
        &self.rack
    }

    /// Produce dirty cutlery until cancelled; returns how many were racked
    pub fn eat(&self, token: &CancellationToken, seed: u64) -> SyncResult<usize> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut dirtied = 0;

        while !token.is_cancelled() {
            let item = Cutlery::ALL[rng.gen_range(0..Cutlery::ALL.len())];
            match self.rack.put_cancellable_with(item, token, self.patience) {
                Ok(()) => {
                    dirtied += 1;
                    debug!(%item, "+ dirty");
                }
                Err(err) if err.error().is_cancelled() => break,
                Err(err) if err.error().is_timeout() => {
                    self.stalls.increment();
                    debug!(item = %err.into_inner(), "rack stayed full, item set aside");
                    continue;
                }
                Err(err) => return Err(SyncError::from(err)),
            }
            thread::sleep(self.eat_interval);
        }

        Ok(dirtied)
    }

    /// Wash until cancelled or the rack is closed and empty
    pub fn wash(&self, token: &CancellationToken) -> SyncResult<usize> {
        let mut washed = 0;

        loop {
            match self.rack.take_cancellable_with(token, self.patience) {
                Ok(Some(item)) => {
                    washed += 1;
                    debug!(%item, "- washed");
                    thread::sleep(self.wash_interval);
                }
                Ok(None) => break,
                Err(err) if err.is_cancelled() => break,
                Err(err) if err.is_timeout() => {
                    self.stalls.increment();
                    debug!("rack stayed empty");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(washed)
    }

    /// Run eater and washer until `token` fires
    pub fn run(&self, token: &CancellationToken, seed: u64) -> SyncResult<PipelineReport> {
        let (dirtied, washed) = thread::scope(|scope| {
            let eater = scope.spawn(|| self.eat(token, seed));
            let washer = scope.spawn(|| self.wash(token));

            let dirtied = eater.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            let washed = washer.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (dirtied, washed)
        });

        let report = PipelineReport {
            dirtied: dirtied?,
            washed: washed?,
            left_on_rack: self.rack.len(),
            stalls: self.stalls(),
            rack: self.rack.stats(),
        };
        info!(
            dirtied = report.dirtied,
            washed = report.washed,
            left_on_rack = report.left_on_rack,
            stalls = report.stalls,
            "dish pipeline stopped"
        );
        Ok(report)
    }
}

/// Run the pipeline for `plan.run_for`, then cancel
pub fn run(plan: &PipelinePlan) -> SyncResult<PipelineReport> {
    let patience = plan.patience.map_or(TimeoutPolicy::None, TimeoutPolicy::Queue);
    let pipeline = DishPipeline::new(plan.rack_capacity, plan.eat_interval, plan.wash_interval)?
        .with_patience(patience);
    let token = CancellationToken::new();

    thread::scope(|scope| {
        let canceller = token.clone();
        scope.spawn(move || {
            thread::sleep(plan.run_for);
            canceller.cancel();
        });
        pipeline.run(&token, plan.seed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_lost_on_cancel() {
        let plan = PipelinePlan {
            rack_capacity: 4,
            eat_interval: Duration::from_millis(1),
            wash_interval: Duration::from_millis(10),
            run_for: Duration::from_millis(100),
            seed: 1,
            patience: None,
        };
        let report = run(&plan).unwrap();

        assert!(report.dirtied > 0);
        assert_eq!(report.dirtied, report.washed + report.left_on_rack);
        assert!(report.left_on_rack <= 4);
        assert_eq!(report.rack.total_put as usize, report.dirtied);
    }

    #[test]
    fn test_washer_stops_when_rack_closed() {
        let pipeline = DishPipeline::new(3, Duration::ZERO, Duration::ZERO).unwrap();
        pipeline.rack().put(Cutlery::Fork).unwrap();
        pipeline.rack().put(Cutlery::Knife).unwrap();
        pipeline.rack().complete_adding();

        let washed = pipeline.wash(&CancellationToken::new()).unwrap();
        assert_eq!(washed, 2);
    }

    #[test]
    fn test_cancelled_eater_racks_nothing() {
        let pipeline = DishPipeline::new(3, Duration::ZERO, Duration::ZERO).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(pipeline.eat(&token, 0).unwrap(), 0);
        assert!(pipeline.rack().is_empty());
    }

    #[test]
    fn test_impatient_washer_counts_stalls() {
        let pipeline = DishPipeline::new(2, Duration::ZERO, Duration::ZERO)
            .unwrap()
            .with_patience(TimeoutPolicy::Queue(Duration::from_millis(10)));
        let token = CancellationToken::new();

        let washed = thread::scope(|scope| {
            let canceller = token.clone();
            scope.spawn(move || {
                thread::sleep(Duration::from_millis(60));
                canceller.cancel();
            });
            pipeline.wash(&token)
        })
        .unwrap();

        assert_eq!(washed, 0);
        assert!(pipeline.stalls() >= 2, "stalls: {}", pipeline.stalls());
    }
}
