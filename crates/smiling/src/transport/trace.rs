use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::{Level, debug};

/// Connection lifecycle logging, one line per (host, event) for the lifetime of a client.
#[derive(Debug, Default)]
pub struct ConnectionTrace {
    seen: Mutex<HashSet<(String, &'static str)>>,
}

impl ConnectionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, host: &str, event: &'static str, target: &str) {
        if !tracing::enabled!(Level::DEBUG) {
            return;
        }
        if self.first_seen(host, event) {
            debug!(host, event, "{event}: {target}");
        }
    }

    /// True the first time a pair is observed.
    pub fn first_seen(&self, host: &str, event: &'static str) -> bool {
        self.seen.lock().insert((host.to_owned(), event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_deduplicated() {
        let trace = ConnectionTrace::new();
        assert!(trace.first_seen("a.example.com", "connect_tcp"));
        assert!(!trace.first_seen("a.example.com", "connect_tcp"));
        assert!(trace.first_seen("a.example.com", "start_tls"));
        assert!(trace.first_seen("b.example.com", "connect_tcp"));
    }
}
