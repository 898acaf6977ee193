/*!
 * Dish Pipeline Tests
 * Producer/consumer over a LIFO rack stopped by cancellation
 */

use sync_toolkit::core::sync::{CancellationToken, QueueOrder, QueuePhase};
use sync_toolkit::demos::dishwashing::{self, DishPipeline, PipelinePlan};
use std::thread;
use std::time::Duration;

#[test]
fn test_every_dirtied_dish_accounted_for() {
    let plan = PipelinePlan {
        rack_capacity: 3,
        eat_interval: Duration::from_millis(1),
        wash_interval: Duration::from_millis(8),
        run_for: Duration::from_millis(120),
        seed: 99,
        patience: Some(Duration::from_secs(2)),
    };

    let report = dishwashing::run(&plan).expect("pipeline failed");

    assert!(report.dirtied > 0);
    assert_eq!(report.dirtied, report.washed + report.left_on_rack);
    assert!(report.left_on_rack <= 3);
    assert_eq!(report.rack.order, QueueOrder::Lifo);
    assert_eq!(report.rack.capacity, 3);
    assert_eq!(report.stalls, 0);
}

#[test]
fn test_pipeline_stops_on_cancel() {
    let pipeline =
        DishPipeline::new(2, Duration::from_millis(1), Duration::from_millis(50)).unwrap();
    let token = CancellationToken::new();

    let report = thread::scope(|scope| {
        let canceller = token.clone();
        scope.spawn(move || {
            thread::sleep(Duration::from_millis(60));
            canceller.cancel();
        });
        pipeline.run(&token, 3)
    })
    .unwrap();

    assert_eq!(report.dirtied, report.washed + report.left_on_rack);
    // Cancellation stops the workers without closing the rack
    assert_eq!(pipeline.rack().phase(), QueuePhase::Open);
}
