use std::time::{Duration, Instant};

/// A value plus the moment it was fetched.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub data: T,
    pub fetched_at: Instant,
}

impl<T> Cached<T> {
    pub fn new(data: T) -> Self {
        Self { data, fetched_at: Instant::now() }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Still usable under `max_age`. A zero max age never is.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.age() < max_age
    }

    /// The data if still fresh.
    pub fn get(&self, max_age: Duration) -> Option<&T> {
        self.is_fresh(max_age).then_some(&self.data)
    }
}
