use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::types::Gesture;

/// Per-frame gesture counts for one run.
#[derive(Debug)]
pub struct GestureStats {
    started: Instant,
    frames: u64,
    hand_frames: u64,
    events: u64,
    counts: HashMap<Gesture, u64>,
}

impl GestureStats {
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            frames: 0,
            hand_frames: 0,
            events: 0,
            counts: HashMap::new(),
        }
    }

    /// `None` frames are not counted as gestures.
    pub fn record_frame(&mut self, gesture: Gesture, hand_present: bool) {
        self.frames += 1;
        if hand_present {
            self.hand_frames += 1;
        }
        if gesture != Gesture::None {
            *self.counts.entry(gesture).or_default() += 1;
        }
    }

    pub fn record_event(&mut self) {
        self.events += 1;
    }

    pub fn total_gestures(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Counts sorted by frequency, ties broken by gesture order.
    pub fn breakdown(&self) -> Vec<(Gesture, u64, f32)> {
        let total = self.total_gestures();
        let mut rows: Vec<(Gesture, u64, f32)> = self
            .counts
            .iter()
            .map(|(&gesture, &count)| {
                let share = if total > 0 {
                    count as f32 / total as f32 * 100.0
                } else {
                    0.0
                };
                (gesture, count, share)
            })
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        rows
    }

    pub fn summary(&self, now: Instant) -> SessionSummary {
        SessionSummary {
            runtime: now.saturating_duration_since(self.started),
            frames: self.frames,
            hand_frames: self.hand_frames,
            events: self.events,
            breakdown: self.breakdown(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub runtime: Duration,
    pub frames: u64,
    pub hand_frames: u64,
    pub events: u64,
    pub breakdown: Vec<(Gesture, u64, f32)>,
}

impl SessionSummary {
    pub fn fps(&self) -> f32 {
        let secs = self.runtime.as_secs_f32();
        if secs > 0.0 {
            self.frames as f32 / secs
        } else {
            0.0
        }
    }

    pub fn top(&self, n: usize) -> Vec<(Gesture, u64)> {
        self.breakdown
            .iter()
            .take(n)
            .map(|&(gesture, count, _)| (gesture, count))
            .collect()
    }

    pub fn log(&self) {
        log::info!(
            "runtime {:.1}s, {} frames ({:.1} fps), hand seen in {} frames, {} gesture events",
            self.runtime.as_secs_f32(),
            self.frames,
            self.fps(),
            self.hand_frames,
            self.events
        );
        if self.hand_frames == 0 {
            log::warn!("no hand detected; check lighting and camera position");
        }
        for (gesture, count, share) in &self.breakdown {
            log::info!(
                "  {}{}: {count} frames ({share:.1}%)",
                gesture.emoji(),
                gesture.display_name()
            );
        }
        let top: Vec<String> = self
            .top(3)
            .into_iter()
            .map(|(gesture, count)| format!("{} x{count}", gesture.display_name()))
            .collect();
        if !top.is_empty() {
            log::info!("most used: {}", top.join(", "));
        }
    }
}
