/*!
 * Bank Terminal Signaling
 *
 * A purchase hands an operation to the device protocol and blocks on an
 * auto-reset signal until the protocol reports completion from its own
 * thread. Only one purchase waits at a time, and each waits on a signal of
 * its own: a completion for an operation that already timed out is ignored.
 */

use crate::core::errors::SyncResult;
use crate::core::sync::{AtomicCell, ScopedLock, Signal};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const PURCHASE_OP_CODE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Finished,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    /// Operation the device is reporting on
    pub operation: u64,
    pub op_code: u32,
    pub status: OperationStatus,
}

type MessageHandler = Arc<dyn Fn(ProtocolMessage) + Send + Sync>;

/// Emulated device link; completes each operation after `latency`
pub struct Protocol {
    latency: Duration,
    handler: Option<MessageHandler>,
}

impl Protocol {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            handler: None,
        }
    }

    pub fn on_message_received<F>(&mut self, handler: F)
    where
        F: Fn(ProtocolMessage) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
    }

    /// Start an operation; completion is reported on a device thread
    pub fn send(&self, operation: u64, op_code: u32, amount: i64) {
        let latency = self.latency;
        let handler = self.handler.clone();
        debug!(operation, op_code, amount, "operation in action");

        thread::spawn(move || {
            thread::sleep(latency);
            if let Some(handler) = handler {
                handler(ProtocolMessage {
                    operation,
                    op_code,
                    status: OperationStatus::Finished,
                });
            }
        });
    }
}

/// What came back from the device for one purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub amount: i64,
    pub waited: Duration,
}

/// The operation a purchase is currently waiting on
struct PendingOperation {
    operation: u64,
    completed: Arc<Signal>,
}

type PendingSlot = Arc<Mutex<Option<PendingOperation>>>;

pub struct BankTerminal {
    protocol: Protocol,
    pending: PendingSlot,
    next_operation: AtomicCell<u64>,
    /// Serializes purchases so the single-waiter signal has one waiter
    purchase: ScopedLock<()>,
}

impl BankTerminal {
    pub fn new(mut protocol: Protocol) -> Self {
        let pending: PendingSlot = Arc::new(Mutex::new(None));
        let slot = pending.clone();
        protocol.on_message_received(move |message| {
            if message.status != OperationStatus::Finished {
                return;
            }
            match slot.lock().as_ref() {
                Some(waiting) if waiting.operation == message.operation => {
                    debug!(operation = message.operation, op_code = message.op_code, "signaling");
                    waiting.completed.set();
                }
                _ => debug!(operation = message.operation, "stale completion ignored"),
            }
        });

        Self {
            protocol,
            pending,
            next_operation: AtomicCell::new(0),
            purchase: ScopedLock::named("bank_terminal.purchase", ()),
        }
    }

    /// Send a purchase and wait for the device to finish it
    ///
    /// # Errors
    ///
    /// `Timeout` if the device does not answer within `timeout`.
    pub fn purchase(&self, amount: i64, timeout: Duration) -> SyncResult<PurchaseReceipt> {
        let _exclusive = self.purchase.acquire(timeout)?;
        let start = Instant::now();

        let operation = self.next_operation.increment();
        let completed = Arc::new(Signal::auto());
        *self.pending.lock() = Some(PendingOperation {
            operation,
            completed: completed.clone(),
        });

        self.protocol.send(operation, PURCHASE_OP_CODE, amount);
        debug!(operation, amount, "waiting for signal");
        let outcome = completed.wait(Some(timeout));
        *self.pending.lock() = None;
        outcome?;

        Ok(PurchaseReceipt {
            amount,
            waited: start.elapsed(),
        })
    }
}

/// One purchase against an emulated device
pub fn run(latency: Duration, timeout: Duration) -> SyncResult<PurchaseReceipt> {
    let terminal = BankTerminal::new(Protocol::new(latency));
    let receipt = terminal.purchase(100, timeout)?;
    info!(amount = receipt.amount, waited_ms = receipt.waited.as_millis() as u64, "operation is done");
    Ok(receipt)
}
