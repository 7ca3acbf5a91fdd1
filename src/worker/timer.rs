use futures_util::Stream;
use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{self, Instant, Sleep};

/// Handle to a scheduled value, used to cancel it.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug)]
pub(crate) struct Timeout {
    deadline: Instant,
    id: u64,
}

/// Queue of values that become available from the `Stream` impl once their deadline
/// passes, earliest first.
pub(crate) struct Timer<T> {
    next_id: u64,
    current: Option<CurrentTimerEntry<T>>,
    queue: BTreeMap<Timeout, T>,
}

impl<T> Timer<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            current: None,
            queue: BTreeMap::new(),
        }
    }

    /// Has the timer no scheduled timeouts?
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    pub fn schedule_in(&mut self, delay: Duration, value: T) -> Timeout {
        self.schedule_at(Instant::now() + delay, value)
    }

    pub fn schedule_at(&mut self, deadline: Instant, value: T) -> Timeout {
        // If the current timeout is later than the new one, push it back into the queue.
        if let Some(current) = &self.current {
            let key = current.key();

            if deadline < key.deadline {
                if let Some(CurrentTimerEntry { value, .. }) = self.current.take() {
                    self.queue.insert(key, value);
                }
            }
        }

        let id = self.next_id();
        let key = Timeout { deadline, id };
        self.queue.insert(key, value);

        key
    }

    /// Returns whether the timeout was still pending.
    pub fn cancel(&mut self, timeout: Timeout) -> bool {
        if let Some(current) = &self.current {
            if current.key() == timeout {
                self.current = None;
                return true;
            }
        }

        self.queue.remove(&timeout).is_some()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}

impl<T: Unpin> Stream for Timer<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(current) = &mut self.current {
                match current.sleep.as_mut().poll(cx) {
                    Poll::Ready(()) => {
                        return Poll::Ready(self.current.take().map(|entry| entry.value));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            let (key, value) = match self.queue.pop_first() {
                Some(entry) => entry,
                None => return Poll::Ready(None),
            };

            self.current = Some(CurrentTimerEntry {
                sleep: Box::pin(time::sleep_until(key.deadline)),
                value,
                id: key.id,
            });
        }
    }
}

struct CurrentTimerEntry<T> {
    sleep: Pin<Box<Sleep>>,
    value: T,
    id: u64,
}

impl<T> CurrentTimerEntry<T> {
    fn key(&self) -> Timeout {
        Timeout {
            deadline: self.sleep.deadline(),
            id: self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Timer;
    use futures_util::{FutureExt, StreamExt};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fires_in_deadline_order() {
        let mut timer = Timer::new();
        let start = Instant::now();

        timer.schedule_in(Duration::from_millis(300), "late");
        timer.schedule_in(Duration::from_millis(100), "early");

        assert_eq!(timer.next().await, Some("early"));
        assert_eq!(start.elapsed(), Duration::from_millis(100));
        assert_eq!(timer.next().await, Some("late"));
        assert_eq!(start.elapsed(), Duration::from_millis(300));
        assert!(timer.is_empty());
        assert_eq!(timer.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_schedule_preempts_current() {
        let mut timer = Timer::new();

        timer.schedule_in(Duration::from_millis(300), "late");
        // Make "late" the current entry.
        assert!(timer.next().now_or_never().is_none());

        timer.schedule_in(Duration::from_millis(100), "early");

        assert_eq!(timer.next().await, Some("early"));
        assert_eq!(timer.next().await, Some("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_values_never_fire() {
        let mut timer = Timer::new();

        let queued = timer.schedule_in(Duration::from_millis(200), "queued");
        let current = timer.schedule_in(Duration::from_millis(100), "current");
        assert!(timer.next().now_or_never().is_none());

        assert!(timer.cancel(current));
        assert!(timer.cancel(queued));
        assert!(!timer.cancel(queued));

        assert!(timer.is_empty());
        assert_eq!(timer.next().await, None);
    }
}
