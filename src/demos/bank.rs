/*!
 * Bank Card
 *
 * Balance reads go through a shared read lock, payments through the
 * exclusive write lock. Transfers lock both cards' funds in id order so
 * two cards paying each other at the same time cannot deadlock.
 */

use crate::core::errors::SyncResult;
use crate::core::guard::TimeoutPolicy;
use crate::core::sync::{AtomicCell, ScopedLock, ScopedRwLock, WriteGuard};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Money in minor units
pub type Cents = i64;

static NEXT_CARD_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct Funds {
    money: Cents,
    credit: Cents,
}

/// Card whose balance is shared between threads
#[derive(Debug)]
pub struct BankCard {
    id: u64,
    funds: ScopedRwLock<Funds>,
    /// Serializes outgoing transfers from this card
    outgoing: ScopedLock<u64>,
    timeout: Duration,
}

impl BankCard {
    pub fn new(money: Cents) -> Self {
        Self::with_timeout(money, TimeoutPolicy::default_lock().duration().unwrap_or_default())
    }

    pub fn with_timeout(money: Cents, timeout: Duration) -> Self {
        Self {
            id: NEXT_CARD_ID.fetch_add(1, Ordering::Relaxed),
            funds: ScopedRwLock::named("bank_card.funds", Funds { money, credit: 0 }),
            outgoing: ScopedLock::named("bank_card.outgoing", 0),
            timeout,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Money plus granted credit
    pub fn total(&self) -> SyncResult<Cents> {
        let funds = self.funds.acquire_read(self.timeout)?;
        Ok(funds.money + funds.credit)
    }

    pub fn receive_payment(&self, amount: Cents) -> SyncResult<()> {
        self.funds.acquire_write(self.timeout)?.money += amount;
        Ok(())
    }

    pub fn grant_credit(&self, amount: Cents) -> SyncResult<()> {
        self.funds.acquire_write(self.timeout)?.credit += amount;
        Ok(())
    }

    /// Number of transfers sent from this card
    pub fn transfers_sent(&self) -> SyncResult<u64> {
        Ok(*self.outgoing.acquire(self.timeout)?)
    }

    /// Move `amount` to `recipient`, all or nothing
    ///
    /// # Errors
    ///
    /// - `Timeout` if either card stays locked too long; no money moves.
    /// - `Reentrancy` when `recipient` is this card.
    pub fn transfer_to(&self, amount: Cents, recipient: &BankCard) -> SyncResult<()> {
        let mut sent = self.outgoing.acquire(self.timeout)?;

        let (mut from, mut to) = self.lock_pair(recipient)?;
        from.money -= amount;
        to.money += amount;
        *sent += 1;

        debug!(from = self.id, to = recipient.id, amount, "transfer completed");
        Ok(())
    }

    fn lock_pair<'a>(
        &'a self,
        recipient: &'a BankCard,
    ) -> SyncResult<(WriteGuard<'a, Funds>, WriteGuard<'a, Funds>)> {
        if self.id <= recipient.id {
            let from = self.funds.acquire_write(self.timeout)?;
            let to = recipient.funds.acquire_write(self.timeout)?;
            Ok((from, to))
        } else {
            let to = recipient.funds.acquire_write(self.timeout)?;
            let from = self.funds.acquire_write(self.timeout)?;
            Ok((from, to))
        }
    }
}

/// Parameters for the transfer storm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankPlan {
    pub opening_balance: Cents,
    pub workers: usize,
    pub transfers_per_worker: usize,
    pub amount: Cents,
    pub credit: Cents,
}

impl Default for BankPlan {
    fn default() -> Self {
        Self {
            opening_balance: 100_000,
            workers: 8,
            transfers_per_worker: 250,
            amount: 125,
            credit: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankReport {
    pub alice_total: Cents,
    pub bob_total: Cents,
    pub transfers: u64,
    pub auditor_reads: u64,
    /// Sum of both cards equals opening balances plus credit
    pub conserved: bool,
}

/// Two cards paying each other from many threads while an auditor reads
pub fn run(plan: &BankPlan, timeout: Duration) -> SyncResult<BankReport> {
    let alice = BankCard::with_timeout(plan.opening_balance, timeout);
    let bob = BankCard::with_timeout(plan.opening_balance, timeout);
    alice.grant_credit(plan.credit)?;

    let expected = 2 * plan.opening_balance + plan.credit;
    let auditor_reads = AtomicCell::new(0_u64);
    let done = AtomicCell::new(0_usize);

    thread::scope(|scope| -> SyncResult<()> {
        let auditor = scope.spawn(|| -> SyncResult<()> {
            while done.load() < plan.workers {
                alice.total()?;
                bob.total()?;
                auditor_reads.increment();
                thread::yield_now();
            }
            Ok(())
        });

        let workers: Vec<_> = (0..plan.workers)
            .map(|worker| {
                let (from, to) = if worker % 2 == 0 { (&alice, &bob) } else { (&bob, &alice) };
                let done = &done;
                scope.spawn(move || -> SyncResult<()> {
                    let result = (0..plan.transfers_per_worker)
                        .try_for_each(|_| from.transfer_to(plan.amount, to));
                    done.increment();
                    result
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))?;
        }
        auditor.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })?;

    let alice_total = alice.total()?;
    let bob_total = bob.total()?;
    let report = BankReport {
        alice_total,
        bob_total,
        transfers: alice.transfers_sent()? + bob.transfers_sent()?,
        auditor_reads: auditor_reads.load(),
        conserved: alice_total + bob_total == expected,
    };

    info!(
        alice = report.alice_total,
        bob = report.bob_total,
        transfers = report.transfers,
        conserved = report.conserved,
        "bank scenario finished"
    );
    Ok(report)
}
