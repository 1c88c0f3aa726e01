use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one session, shared between the reader and callers.
#[derive(Debug, Default)]
pub struct Stats {
    ok: AtomicU64,
    bad: AtomicU64,
    unsolicited: AtomicU64,
    timeouts: AtomicU64,
    rx_bytes: AtomicU64,
    tx_bytes: AtomicU64,
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// frames delivered to a waiting caller
    pub ok: u64,
    /// bytes discarded as noise or corrupt frames
    pub bad: u64,
    /// well-formed frames nobody was waiting for
    pub unsolicited: u64,
    pub timeouts: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn inc_ok(&self) {
        self.ok.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_bad(&self, n: usize) {
        self.bad.fetch_add(n as u64, Ordering::Relaxed);
    }
    pub fn inc_unsolicited(&self) {
        self.unsolicited.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_rx_bytes(&self, n: usize) {
        self.rx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }
    pub fn add_tx_bytes(&self, n: usize) {
        self.tx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ok: self.ok.load(Ordering::Relaxed),
            bad: self.bad.load(Ordering::Relaxed),
            unsolicited: self.unsolicited.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ok={} bad={} unsolicited={} timeouts={} rx_bytes={} tx_bytes={}",
            self.ok, self.bad, self.unsolicited, self.timeouts, self.rx_bytes, self.tx_bytes
        )
    }
}
