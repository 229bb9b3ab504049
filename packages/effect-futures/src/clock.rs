//! Timer sources for `Delay`.
//!
//! [`ThreadClock`] runs timers on one background thread in real time.
//! [`ManualClock`] only moves when told to, for deterministic tests.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

pub type Task = Box<dyn FnOnce() + Send>;

/// Something that can run a task after a delay.
pub trait Clock: Send + Sync {
    fn call_later(&self, delay: Duration, task: Task);
}

pub type ClockRef = Arc<dyn Clock>;

/// Min-heap entry ordered by (due, seq).
struct Timer<T> {
    due: T,
    seq: u64,
    task: Task,
}

impl<T: Ord> PartialEq for Timer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Ord> Eq for Timer<T> {}

impl<T: Ord> PartialOrd for Timer<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Timer<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        (&other.due, other.seq).cmp(&(&self.due, self.seq))
    }
}

struct TimerQueue<T> {
    heap: BinaryHeap<Timer<T>>,
    next_seq: u64,
}

impl<T: Ord> TimerQueue<T> {
    fn new() -> Self {
        TimerQueue {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    fn push(&mut self, due: T, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Timer { due, seq, task });
    }

    fn next_due(&self) -> Option<&T> {
        self.heap.peek().map(|timer| &timer.due)
    }

    /// Pop the earliest timer if it is due at or before `now`.
    fn pop_due(&mut self, now: &T) -> Option<(T, Task)> {
        if self.next_due().is_some_and(|due| due <= now) {
            self.heap.pop().map(|timer| (timer.due, timer.task))
        } else {
            None
        }
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

struct Shared {
    queue: Mutex<(TimerQueue<Instant>, bool)>,
    wake: Condvar,
}

/// Real-time clock backed by a single timer thread.
///
/// Tasks run on the timer thread, one at a time, in due order. Dropping the
/// clock stops the thread; timers still pending are dropped unrun.
pub struct ThreadClock {
    shared: Arc<Shared>,
}

impl ThreadClock {
    pub fn new() -> io::Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new((TimerQueue::new(), false)),
            wake: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        thread::Builder::new()
            .name("effect-clock".into())
            .spawn(move || run_timers(&worker))?;
        Ok(ThreadClock { shared })
    }
}

fn run_timers(shared: &Shared) {
    let mut guard = shared.queue.lock();
    loop {
        let (queue, stopped) = &mut *guard;
        if *stopped {
            return;
        }
        let now = Instant::now();
        if let Some((_, task)) = queue.pop_due(&now) {
            drop(guard);
            task();
            guard = shared.queue.lock();
            continue;
        }
        match queue.next_due().copied() {
            Some(due) => {
                shared.wake.wait_until(&mut guard, due);
            }
            None => shared.wake.wait(&mut guard),
        }
    }
}

impl Clock for ThreadClock {
    fn call_later(&self, delay: Duration, task: Task) {
        let mut guard = self.shared.queue.lock();
        guard.0.push(Instant::now() + delay, task);
        self.shared.wake.notify_one();
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        self.shared.queue.lock().1 = true;
        self.shared.wake.notify_one();
    }
}

/// Clock whose time only moves through [`ManualClock::advance`].
///
/// Tasks run on the thread calling `advance`.
pub struct ManualClock {
    state: Mutex<(Duration, TimerQueue<Duration>)>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            state: Mutex::new((Duration::ZERO, TimerQueue::new())),
        }
    }

    /// Time elapsed since the clock was created.
    pub fn now(&self) -> Duration {
        self.state.lock().0
    }

    pub fn pending(&self) -> usize {
        self.state.lock().1.len()
    }

    /// Move time forward by `by`, running every task that falls due, in due
    /// order. While a task runs the clock reads its due time, so tasks it
    /// schedules are due relative to that and run too if they fall within
    /// the new time.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().0 + by;
        loop {
            let task = {
                let mut state = self.state.lock();
                let (now, queue) = &mut *state;
                match queue.pop_due(&target) {
                    Some((due, task)) => {
                        *now = (*now).max(due);
                        task
                    }
                    None => {
                        *now = target;
                        return;
                    }
                }
            };
            task();
        }
    }
}

impl Clock for ManualClock {
    fn call_later(&self, delay: Duration, task: Task) {
        let mut state = self.state.lock();
        let due = state.0 + delay;
        state.1.push(due, task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, move |tag| {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().push(tag)) as Task
        })
    }

    #[test]
    fn test_manual_clock_runs_due_tasks_in_order() {
        let clock = ManualClock::new();
        let (log, task) = recorder();
        clock.call_later(Duration::from_secs(2), task("late"));
        clock.call_later(Duration::from_secs(1), task("early"));
        clock.call_later(Duration::from_secs(1), task("early-second"));

        clock.advance(Duration::from_millis(500));
        assert!(log.lock().is_empty());
        assert_eq!(clock.pending(), 3);

        clock.advance(Duration::from_millis(500));
        assert_eq!(*log.lock(), vec!["early", "early-second"]);

        clock.advance(Duration::from_secs(5));
        assert_eq!(*log.lock(), vec!["early", "early-second", "late"]);
        assert_eq!(clock.now(), Duration::from_secs(6));
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_manual_clock_runs_tasks_scheduled_while_advancing() {
        let clock = Arc::new(ManualClock::new());
        let (log, task) = recorder();
        let chained = task("chained");
        let inner = Arc::clone(&clock);
        clock.call_later(
            Duration::from_secs(1),
            Box::new(move || inner.call_later(Duration::from_secs(1), chained)),
        );
        clock.call_later(Duration::from_secs(10), task("never"));

        clock.advance(Duration::from_secs(3));
        assert_eq!(*log.lock(), vec!["chained"]);
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn test_manual_clock_reads_due_time_while_task_runs() {
        let clock = Arc::new(ManualClock::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for secs in [3, 1] {
            let (inner, seen) = (Arc::clone(&clock), Arc::clone(&seen));
            clock.call_later(
                Duration::from_secs(secs),
                Box::new(move || seen.lock().push(inner.now())),
            );
        }

        clock.advance(Duration::from_secs(5));
        assert_eq!(
            *seen.lock(),
            vec![Duration::from_secs(1), Duration::from_secs(3)]
        );
        assert_eq!(clock.now(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_delay_runs_on_next_advance() {
        let clock = ManualClock::new();
        let (log, task) = recorder();
        clock.call_later(Duration::ZERO, task("now"));
        clock.advance(Duration::ZERO);
        assert_eq!(*log.lock(), vec!["now"]);
    }

    #[test]
    fn test_thread_clock_fires_after_delay() {
        let clock = ThreadClock::new().expect("timer thread");
        let (tx, rx) = mpsc::channel();
        let started = Instant::now();
        let tx_late = tx.clone();
        clock.call_later(
            Duration::from_millis(40),
            Box::new(move || {
                let _ = tx_late.send("late");
            }),
        );
        clock.call_later(
            Duration::from_millis(10),
            Box::new(move || {
                let _ = tx.send("early");
            }),
        );

        let first = rx.recv_timeout(Duration::from_secs(5)).expect("early timer");
        let second = rx.recv_timeout(Duration::from_secs(5)).expect("late timer");
        assert_eq!((first, second), ("early", "late"));
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
