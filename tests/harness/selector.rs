//! Interest table standing in for a reactor.

use std::collections::{HashMap, HashSet};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use wsgate::{Interest, Key, PipeHalf, Selector};

#[derive(Debug, Default)]
pub struct PollSelector {
    keys: HashMap<Key, Interest>,
    cancelled: HashSet<Key>,
}

impl PollSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: Key, interest: Interest) {
        self.keys.insert(key, interest);
    }

    pub fn was_cancelled(&self, key: Key) -> bool {
        self.cancelled.contains(&key)
    }
}

impl Selector for PollSelector {
    fn is_valid(&self, key: Key) -> bool {
        self.keys.contains_key(&key)
    }

    fn interest(&self, key: Key) -> Option<Interest> {
        self.keys.get(&key).copied()
    }

    fn set_interest(&mut self, key: Key, interest: Interest) {
        if let Some(slot) = self.keys.get_mut(&key) {
            *slot = interest;
        }
    }

    fn cancel(&mut self, key: Key) {
        if self.keys.remove(&key).is_some() {
            self.cancelled.insert(key);
        }
    }
}

/// Deliver one round of events to `half` according to its interest.
pub fn pump(half: &mut PipeHalf, conn: &mut TcpStream, selector: &mut PollSelector) {
    let Some(interest) = selector.interest(half.key()) else {
        return;
    };
    if interest.is_readable() {
        half.on_readable(conn, selector);
    }
    if interest.is_writable() && selector.is_valid(half.key()) {
        half.on_writable(conn, selector);
    }
}

/// Pump both halves until `done` holds. Panics after five seconds.
pub fn pump_until(
    selector: &mut PollSelector,
    a: (&mut PipeHalf, &mut TcpStream),
    b: (&mut PipeHalf, &mut TcpStream),
    mut done: impl FnMut(&PollSelector) -> bool,
) {
    let (half_a, conn_a) = a;
    let (half_b, conn_b) = b;
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(selector) {
        assert!(Instant::now() < deadline, "pipe did not settle in time");
        pump(half_a, conn_a, selector);
        pump(half_b, conn_b, selector);
        std::thread::sleep(Duration::from_millis(1));
    }
}
