/*!
 * Book Stock
 *
 * A concurrent map of titles to quantities shared by several sales
 * managers. Each update is atomic per title.
 */

use ahash::RandomState;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const BOOKS: [&str; 5] = [
    "Clean Code",
    "C# in Depth",
    "C++ for Beginners",
    "Design Patterns in C#",
    "Marvel Heroes",
];

#[derive(Debug, Default)]
pub struct StockController {
    stock: DashMap<String, u32, RandomState>,
}

impl StockController {
    pub fn new() -> Self {
        Self {
            stock: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn buy_book(&self, title: &str, quantity: u32) {
        *self.stock.entry(title.to_string()).or_insert(0) += quantity;
    }

    /// Drop a title entirely; returns the quantity that was on hand
    pub fn try_remove_book(&self, title: &str) -> Option<u32> {
        self.stock.remove(title).map(|(_, quantity)| quantity)
    }

    /// Sell one copy if any are in stock
    ///
    /// An unknown title is recorded with zero copies.
    pub fn try_sell_book(&self, title: &str) -> bool {
        let mut quantity = self.stock.entry(title.to_string()).or_insert(0);
        if *quantity == 0 {
            return false;
        }
        *quantity -= 1;
        true
    }

    pub fn quantity(&self, title: &str) -> Option<u32> {
        self.stock.get(title).map(|quantity| *quantity)
    }

    /// Sorted copy of the current stock
    pub fn snapshot(&self) -> BTreeMap<String, u32> {
        self.stock
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

/// What one sales manager did during the day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTally {
    pub name: String,
    pub copies_bought: u64,
    pub sold: u64,
    pub out_of_stock: u64,
    pub removals: u64,
}

#[derive(Debug, Clone)]
pub struct SalesManager {
    name: String,
}

impl SalesManager {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Buy, sell and occasionally delist titles until `work_day` is over
    pub fn start_work(&self, stock: &StockController, work_day: Duration, seed: u64) -> SalesTally {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tally = SalesTally {
            name: self.name.clone(),
            ..SalesTally::default()
        };
        let start = Instant::now();

        while start.elapsed() < work_day {
            thread::sleep(Duration::from_millis(rng.gen_range(0..5)));
            let roll = rng.gen_range(0..10);
            let title = BOOKS[rng.gen_range(0..BOOKS.len())];

            if roll % 2 == 0 {
                let quantity = rng.gen_range(1..=9);
                stock.buy_book(title, quantity);
                tally.copies_bought += u64::from(quantity);
                debug!(manager = %self.name, title, quantity, "bought");
            } else if roll == 9 {
                stock.try_remove_book(title);
                tally.removals += 1;
                debug!(manager = %self.name, title, "removed");
            } else if stock.try_sell_book(title) {
                tally.sold += 1;
                debug!(manager = %self.name, title, "sold");
            } else {
                tally.out_of_stock += 1;
                debug!(manager = %self.name, title, "out of stock");
            }
        }

        debug!(manager = %self.name, "finished work");
        tally
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReport {
    pub tallies: Vec<SalesTally>,
    pub stock: BTreeMap<String, u32>,
}

/// Several managers share one stock for a working day
pub fn run(managers: &[&str], work_day: Duration, seed: u64) -> StockReport {
    let stock = StockController::new();

    let tallies = thread::scope(|scope| {
        let workers: Vec<_> = managers
            .iter()
            .zip(seed..)
            .map(|(name, seed)| {
                let manager = SalesManager::new(*name);
                let stock = &stock;
                scope.spawn(move || manager.start_work(stock, work_day, seed))
            })
            .collect();

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect::<Vec<_>>()
    });

    let report = StockReport {
        tallies,
        stock: stock.snapshot(),
    };
    info!(titles = report.stock.len(), "stock after the working day");
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_and_sell() {
        let stock = StockController::new();
        stock.buy_book("Clean Code", 2);

        assert!(stock.try_sell_book("Clean Code"));
        assert!(stock.try_sell_book("Clean Code"));
        assert!(!stock.try_sell_book("Clean Code"));
        assert_eq!(stock.quantity("Clean Code"), Some(0));
    }

    #[test]
    fn test_selling_unknown_title_records_zero() {
        let stock = StockController::new();
        assert!(!stock.try_sell_book("Marvel Heroes"));
        assert_eq!(stock.quantity("Marvel Heroes"), Some(0));
    }

    #[test]
    fn test_remove_returns_quantity() {
        let stock = StockController::new();
        stock.buy_book("C# in Depth", 4);
        assert_eq!(stock.try_remove_book("C# in Depth"), Some(4));
        assert_eq!(stock.try_remove_book("C# in Depth"), None);
    }

    #[test]
    fn test_concurrent_purchases_add_up() {
        let stock = StockController::new();
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        stock.buy_book("Clean Code", 1);
                    }
                });
            }
        });
        assert_eq!(stock.quantity("Clean Code"), Some(800));
    }

    #[test]
    fn test_working_day() {
        let report = run(&["Bob", "Alice", "Rob"], Duration::from_millis(30), 42);
        assert_eq!(report.tallies.len(), 3);
        assert!(report.stock.keys().all(|title| BOOKS.contains(&title.as_str())));
    }
}
