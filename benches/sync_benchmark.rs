/*!
 * Synchronization Primitives Benchmarks
 *
 * Compare uncontended and contended costs of the scoped primitives
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sync_toolkit::core::sync::{
    spin_until, AtomicCell, BoundedQueue, EscalationPolicy, QueueOrder, ScopedLock, ScopedRwLock,
    Signal,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(1);

fn bench_uncontended_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_acquire");

    let lock = ScopedLock::new(0_u64);
    group.bench_function("scoped_lock", |b| {
        b.iter(|| {
            let mut guard = lock.acquire(WAIT).unwrap();
            *guard += 1;
        })
    });

    let rwlock = ScopedRwLock::new(0_u64);
    group.bench_function("rwlock_read", |b| {
        b.iter(|| black_box(*rwlock.acquire_read(WAIT).unwrap()))
    });
    group.bench_function("rwlock_write", |b| {
        b.iter(|| {
            let mut guard = rwlock.acquire_write(WAIT).unwrap();
            *guard += 1;
        })
    });

    let cell = AtomicCell::new(0_u64);
    group.bench_function("atomic_increment", |b| b.iter(|| black_box(cell.increment())));

    group.finish();
}

fn bench_contended_lock(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_lock");

    for threads in [2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let lock = Arc::new(ScopedLock::new(0_u64));
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let lock = lock.clone();
                        thread::spawn(move || {
                            for _ in 0..1000 {
                                *lock.acquire(WAIT).unwrap() += 1;
                            }
                        })
                    })
                    .collect();

                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_queue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_throughput");

    for capacity in [1, 16, 256] {
        for order in [QueueOrder::Fifo, QueueOrder::Lifo] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", order), capacity),
                &capacity,
                |b, &capacity| {
                    b.iter(|| {
                        let queue = BoundedQueue::with_order(capacity, order).unwrap();
                        let producer = queue.clone();
                        let handle = thread::spawn(move || {
                            for i in 0..1000_u32 {
                                producer.put(i).unwrap();
                            }
                            producer.complete_adding();
                        });

                        black_box(queue.iter().count());
                        handle.join().unwrap();
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_wake_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("wake_latency");

    group.bench_function("signal", |b| {
        b.iter(|| {
            let signal = Arc::new(Signal::auto());
            let waiter = signal.clone();
            let handle = thread::spawn(move || waiter.wait(Some(WAIT)));

            signal.set();
            handle.join().unwrap().ok();
        });
    });

    for (label, policy) in [
        ("spin_default", EscalationPolicy::default()),
        ("spin_low_latency", EscalationPolicy::low_latency()),
        ("spin_long_wait", EscalationPolicy::long_wait()),
    ] {
        let policy = policy.with_timeout(WAIT);
        group.bench_function(label, |b| {
            b.iter(|| {
                let flag = Arc::new(AtomicBool::new(false));
                let setter = flag.clone();
                let handle = thread::spawn(move || setter.store(true, Ordering::Release));

                spin_until(|| flag.load(Ordering::Acquire), &policy).ok();
                handle.join().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended_acquire,
    bench_contended_lock,
    bench_queue_throughput,
    bench_wake_latency
);
criterion_main!(benches);
