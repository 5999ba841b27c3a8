use std::time::Duration;

/// Tuning for the filesystem watch behind a session.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// A file must be quiet this long before its add/change is reported.
    pub stability_threshold: Duration,
    /// How often pending changes are checked against the threshold.
    pub poll_interval: Duration,
    /// Skip any path with a component starting with `.`.
    pub ignore_dotfiles: bool,
    /// Buffered events per observer before a slow observer starts missing
    /// notifications. The session log is unaffected.
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stability_threshold: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(100),
            ignore_dotfiles: true,
            event_capacity: 256,
        }
    }
}

impl TrackerConfig {
    pub fn with_stability_threshold(mut self, threshold: Duration) -> Self {
        self.stability_threshold = threshold;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        // tokio::time::interval panics on a zero period
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_ignore_dotfiles(mut self, ignore: bool) -> Self {
        self.ignore_dotfiles = ignore;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}
