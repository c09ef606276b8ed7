//! Rolling history of link measurements for diagnostics

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// One sampled measurement
#[derive(Debug, Clone)]
pub struct LinkSample {
    pub ping_ms: f32,
    pub packet_loss: f64,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Quality {
    pub fn from_ping(ping_ms: f32) -> Self {
        if ping_ms < 30.0 {
            Quality::Excellent
        } else if ping_ms < 60.0 {
            Quality::Good
        } else if ping_ms < 100.0 {
            Quality::Fair
        } else {
            Quality::Poor
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Quality::Excellent => "Excellent",
            Quality::Good => "Good",
            Quality::Fair => "Fair",
            Quality::Poor => "Poor",
        };
        f.write_str(label)
    }
}

/// Bounded history sampled at a fixed cadence
pub struct LinkQuality {
    history: VecDeque<LinkSample>,
    max_samples: usize,
    sample_interval: Duration,
    last_sample_time: Option<Instant>,
}

impl LinkQuality {
    pub fn new(sample_interval: Duration) -> Self {
        Self {
            history: VecDeque::new(),
            max_samples: 100,
            sample_interval,
            last_sample_time: None,
        }
    }

    /// Records a measurement if the sampling interval has passed
    pub fn record(&mut self, ping_ms: f32, packet_loss: f64) -> bool {
        self.record_at(Instant::now(), ping_ms, packet_loss)
    }

    fn record_at(&mut self, now: Instant, ping_ms: f32, packet_loss: f64) -> bool {
        if let Some(last) = self.last_sample_time {
            if now.duration_since(last) < self.sample_interval {
                return false;
            }
        }

        self.history.push_back(LinkSample {
            ping_ms,
            packet_loss,
            timestamp: now,
        });
        while self.history.len() > self.max_samples {
            self.history.pop_front();
        }
        self.last_sample_time = Some(now);
        true
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn latest(&self) -> Option<&LinkSample> {
        self.history.back()
    }

    pub fn average_ping(&self) -> Option<f32> {
        if self.history.is_empty() {
            return None;
        }
        let total: f32 = self.history.iter().map(|s| s.ping_ms).sum();
        Some(total / self.history.len() as f32)
    }

    pub fn max_ping(&self) -> Option<f32> {
        self.history
            .iter()
            .map(|s| s.ping_ms)
            .fold(None, |max, ping| Some(max.map_or(ping, |m: f32| m.max(ping))))
    }

    pub fn quality(&self) -> Option<Quality> {
        self.latest().map(|s| Quality::from_ping(s.ping_ms))
    }

    /// Time covered by the current history
    pub fn time_span(&self) -> Duration {
        match (self.history.front(), self.history.back()) {
            (Some(oldest), Some(newest)) => newest.timestamp.duration_since(oldest.timestamp),
            _ => Duration::ZERO,
        }
    }

    /// One-line report for the periodic log
    ///
    /// Loss is lost over received for the last window and can exceed 1.
    pub fn summary(&self) -> String {
        match (self.latest(), self.quality(), self.average_ping()) {
            (Some(latest), Some(quality), Some(average)) => format!(
                "ping {:.0}ms (avg {:.0}ms), loss ratio {:.2}, quality {}",
                latest.ping_ms,
                average,
                latest.packet_loss,
                quality
            ),
            _ => "no samples".to_string(),
        }
    }
}

impl Default for LinkQuality {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
