//! In-process fixed-window counters keyed by client IP.
//!
//! State lives in this process only: it resets on restart and is not shared
//! between instances.

use std::{
    net::IpAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Too many requests, try again in {} seconds", .retry_after.as_secs().max(1))]
pub struct RateLimited {
    pub retry_after: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<IpAddr, Window>,
    last_prune: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
            last_prune: Mutex::new(None),
        }
    }

    /// Five failed logins per fifteen minutes.
    pub fn login() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// Ten lead submissions per hour.
    pub fn leads() -> Self {
        Self::new(10, Duration::from_secs(60 * 60))
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), RateLimited> {
        self.check_at(ip, Instant::now())
    }

    pub fn record(&self, ip: IpAddr) {
        self.record_at(ip, Instant::now());
    }

    pub fn hit(&self, ip: IpAddr) -> Result<(), RateLimited> {
        self.hit_at(ip, Instant::now())
    }

    /// Fails when `ip` already used up its window. Does not count.
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), RateLimited> {
        let Some(window) = self.windows.get(&ip).map(|entry| *entry) else {
            return Ok(());
        };
        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= self.window || window.count < self.limit {
            return Ok(());
        }
        Err(RateLimited {
            retry_after: self.window - elapsed,
        })
    }

    /// Counts one attempt for `ip`, opening a new window when the old one ran out.
    pub fn record_at(&self, ip: IpAddr, now: Instant) {
        self.maybe_prune(now);
        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        entry.count = entry.count.saturating_add(1);
    }

    /// Checks and counts under a single entry guard, so concurrent callers
    /// cannot both take the last slot.
    pub fn hit_at(&self, ip: IpAddr, now: Instant) -> Result<(), RateLimited> {
        self.maybe_prune(now);
        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        } else if entry.count >= self.limit {
            return Err(RateLimited {
                retry_after: self.window - elapsed,
            });
        }
        entry.count = entry.count.saturating_add(1);
        Ok(())
    }

    /// Sweeps expired windows at most once per window length. Must run
    /// before an entry guard is taken: `retain` locks every shard.
    fn maybe_prune(&self, now: Instant) {
        let Ok(mut last) = self.last_prune.lock() else {
            return;
        };
        match *last {
            Some(at) if now.saturating_duration_since(at) < self.window => {}
            Some(_) => {
                *last = Some(now);
                drop(last);
                self.prune_at(now);
            }
            None => *last = Some(now),
        }
    }

    /// Drops expired windows.
    pub fn prune_at(&self, now: Instant) {
        self.windows
            .retain(|_, window| now.saturating_duration_since(window.started) < self.window);
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
