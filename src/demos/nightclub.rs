/*!
 * Nightclub Admission
 *
 * A bouncer semaphore caps how many guests dance at once. Occupancy and
 * the peak are tracked lock-free.
 */

use crate::core::errors::SyncResult;
use crate::core::guard::TimeoutPolicy;
use crate::core::sync::{AtomicCell, Semaphore};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Nightclub {
    bouncer: Semaphore,
    occupancy: AtomicCell<usize>,
    peak: AtomicCell<usize>,
    admitted: AtomicCell<usize>,
    admission: TimeoutPolicy,
}

impl Nightclub {
    /// Club admitting at most `capacity` guests at a time
    pub fn new(capacity: usize, admission: TimeoutPolicy) -> SyncResult<Self> {
        Ok(Self {
            bouncer: Semaphore::named("nightclub.bouncer", capacity, capacity)?,
            occupancy: AtomicCell::new(0),
            peak: AtomicCell::new(0),
            admitted: AtomicCell::new(0),
            admission,
        })
    }

    /// Wait at the door, dance for `dance`, then leave
    pub fn visit(&self, guest: usize, dance: Duration) -> SyncResult<()> {
        debug!(guest, "waiting to enter");
        let _permit = self.bouncer.acquire_with(self.admission)?;

        let inside = self.occupancy.increment();
        self.record_peak(inside);
        self.admitted.increment();
        debug!(guest, inside, "dancing");

        thread::sleep(dance);

        self.occupancy.decrement();
        debug!(guest, "leaving");
        Ok(())
    }

    pub fn occupancy(&self) -> usize {
        self.occupancy.load()
    }

    pub fn peak(&self) -> usize {
        self.peak.load()
    }

    pub fn admitted(&self) -> usize {
        self.admitted.load()
    }

    pub fn capacity(&self) -> usize {
        self.bouncer.max_permits()
    }

    fn record_peak(&self, inside: usize) {
        let mut seen = self.peak.load();
        while inside > seen {
            match self.peak.compare_exchange(seen, inside) {
                Ok(_) => break,
                Err(actual) => seen = actual,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightPlan {
    pub capacity: usize,
    pub guests: usize,
    pub dance: Duration,
}

impl Default for NightPlan {
    fn default() -> Self {
        Self {
            capacity: 3,
            guests: 49,
            dance: Duration::from_millis(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightReport {
    pub capacity: usize,
    pub admitted: usize,
    pub peak_occupancy: usize,
    pub turned_away: usize,
}

/// Count guests turned away at the door
///
/// A timed-out admission is a guest turned away; any other failure ends
/// the night with that error.
fn count_turned_away<I>(visits: I) -> SyncResult<usize>
where
    I: IntoIterator<Item = SyncResult<()>>,
{
    visits.into_iter().try_fold(0, |turned_away, visit| match visit {
        Ok(()) => Ok(turned_away),
        Err(err) if err.is_timeout() => Ok(turned_away + 1),
        Err(err) => Err(err),
    })
}

/// Every guest arrives on their own thread
pub fn open_night(plan: &NightPlan, admission: TimeoutPolicy) -> SyncResult<NightReport> {
    let club = Nightclub::new(plan.capacity, admission)?;

    let turned_away = thread::scope(|scope| {
        let guests: Vec<_> = (1..=plan.guests)
            .map(|guest| {
                let club = &club;
                scope.spawn(move || club.visit(guest, plan.dance))
            })
            .collect();

        let visits: Vec<_> = guests
            .into_iter()
            .map(|guest| guest.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect();
        count_turned_away(visits)
    })?;

    let report = NightReport {
        capacity: club.capacity(),
        admitted: club.admitted(),
        peak_occupancy: club.peak(),
        turned_away,
    };
    info!(
        admitted = report.admitted,
        peak = report.peak_occupancy,
        turned_away = report.turned_away,
        "nightclub closed"
    );
    Ok(report)
}
