use std::{
    collections::VecDeque,
    thread,
    time::{Duration, Instant},
};

/// Capture statistics with all-time totals and a sliding window rate.
#[derive(Debug, Clone)]
pub struct Counter {
    /// All-time samples read
    pub total_samples: usize,
    /// All-time number of completed captures
    pub n_captures: usize,
    /// Time when this counter was created or last reset
    pub t_begin: Instant,

    window: Duration,
    reads: VecDeque<(Instant, usize)>,
    samples_in_window: usize,
}

impl Default for Counter {
    fn default() -> Self {
        Counter {
            total_samples: 0,
            n_captures: 0,
            t_begin: Instant::now(),
            window: Duration::from_secs(10),
            reads: VecDeque::new(),
            samples_in_window: 0,
        }
    }
}

impl Counter {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_window(window: Duration) -> Self {
        Counter {
            window,
            ..Default::default()
        }
    }

    /// Samples per second since `t_begin`.
    pub fn average_rate(&self) -> f64 {
        let secs = self.t_begin.elapsed().as_secs_f64().max(1e-6);
        self.total_samples as f64 / secs
    }

    /// Samples per second over the sliding window.
    pub fn rate(&self) -> f64 {
        let secs = self.window.as_secs_f64().max(1e-6);
        self.samples_in_window as f64 / secs
    }

    /// Record one finished capture of `samples` samples (all channels).
    pub fn increment(&mut self, samples: usize) {
        let now = Instant::now();
        self.total_samples += samples;
        self.n_captures += 1;

        self.reads.push_back((now, samples));
        self.samples_in_window += samples;

        while let Some(&(ts, n)) = self.reads.front() {
            if now.duration_since(ts) > self.window {
                self.reads.pop_front();
                self.samples_in_window -= n;
            } else {
                break;
            }
        }
    }

    pub fn reset(&mut self) {
        self.total_samples = 0;
        self.n_captures = 0;
        self.t_begin = Instant::now();
        self.reads.clear();
        self.samples_in_window = 0;
    }
}

/// Check whether the host clock can resolve a 1 ms sleep.
///
/// Coarse timers report zero or a wildly inflated elapsed time for short sleeps.
pub fn timer_is_coarse() -> bool {
    let t0 = Instant::now();
    thread::sleep(Duration::from_millis(1));
    let elapsed = t0.elapsed();
    elapsed.is_zero() || elapsed > Duration::from_millis(50)
}

/// Parse a channel list written as a list literal, e.g. `"[1, 2, 5]"`.
///
/// Anything that does not parse yields an empty list.
pub fn channels_from_str(text: &str) -> Vec<u16> {
    let inner = text
        .trim()
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')']);
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u16>())
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_default()
}

pub fn channels_to_str(channels: &[u16]) -> String {
    let items: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
    format!("[{}]", items.join(", "))
}
