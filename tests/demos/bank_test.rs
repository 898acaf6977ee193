/*!
 * Bank Card Tests
 * Money is conserved across concurrent transfers in both directions
 */

use pretty_assertions::assert_eq;
use sync_toolkit::demos::bank::{self, BankCard, BankPlan};
use sync_toolkit::SyncError;
use std::thread;
use std::time::Duration;

#[test]
fn test_opposing_transfers_conserve_money() {
    let plan = BankPlan {
        opening_balance: 10_000,
        workers: 6,
        transfers_per_worker: 100,
        amount: 7,
        credit: 500,
    };

    let report = bank::run(&plan, Duration::from_secs(5)).expect("bank scenario failed");

    assert!(report.conserved);
    assert_eq!(report.alice_total + report.bob_total, 20_500);
    assert_eq!(report.transfers, 600);
    // Equal workers each way cancel out
    assert_eq!(report.alice_total, 10_500);
}

#[test]
fn test_transfer_to_self_rejected() {
    let card = BankCard::new(100);
    let err = card.transfer_to(10, &card).unwrap_err();

    assert!(matches!(err, SyncError::Reentrancy { .. }));
    assert_eq!(card.total().unwrap(), 100);
}

#[test]
fn test_cards_used_from_many_threads() {
    let alice = BankCard::new(1_000);
    let bob = BankCard::new(1_000);

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    alice.transfer_to(3, &bob).unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..50 {
                    bob.receive_payment(1).unwrap();
                }
            });
        }
    });

    assert_eq!(alice.total().unwrap(), 1_000 - 600);
    assert_eq!(bob.total().unwrap(), 1_000 + 600 + 200);
    assert_eq!(alice.transfers_sent().unwrap(), 200);
}
