use std::time::{Duration, Instant};

use crate::types::Gesture;

/// Turns the per-frame gesture stream into edge-triggered events.
///
/// An event fires once whenever the frame's gesture differs from the last
/// emitted one. The configured cooldown is kept and the emission time
/// recorded, but neither gates emission.
#[derive(Debug)]
pub struct Debouncer {
    last_emitted: Gesture,
    last_emit_time: Option<Instant>,
    cooldown: Duration,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_emitted: Gesture::None,
            last_emit_time: None,
            cooldown,
        }
    }

    /// Out-of-range values saturate: negative or NaN to zero, too large to `Duration::MAX`.
    pub fn from_seconds(cooldown_seconds: f32) -> Self {
        Self::new(Duration::try_from_secs_f32(cooldown_seconds.max(0.0)).unwrap_or(Duration::MAX))
    }

    /// `Gesture::None` frames (no hand, or an unrecognized shape) are
    /// skipped without touching state, so a brief dropout cannot re-fire the
    /// gesture that was held before it.
    pub fn observe(&mut self, gesture: Gesture, now: Instant) -> Option<Gesture> {
        if gesture == Gesture::None || gesture == self.last_emitted {
            return None;
        }
        self.last_emitted = gesture;
        self.last_emit_time = Some(now);
        Some(gesture)
    }

    pub fn last_emitted(&self) -> Gesture {
        self.last_emitted
    }

    #[cfg(test)]
    pub fn last_emit_time(&self) -> Option<Instant> {
        self.last_emit_time
    }

    /// Whether the configured cooldown has elapsed since the last emission.
    /// Informational only.
    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.last_emit_time
            .is_none_or(|at| now.saturating_duration_since(at) >= self.cooldown)
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::from_seconds(crate::config::DEFAULT_COOLDOWN_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(debouncer: &mut Debouncer, gestures: &[Gesture]) -> Vec<Gesture> {
        let start = Instant::now();
        gestures
            .iter()
            .enumerate()
            .filter_map(|(i, g)| debouncer.observe(*g, start + Duration::from_millis(33 * i as u64)))
            .collect()
    }

    #[test]
    fn emits_once_per_change() {
        use Gesture::*;
        let mut debouncer = Debouncer::default();
        let events = feed(
            &mut debouncer,
            &[None, None, Fist, Fist, Fist, OpenPalm, OpenPalm],
        );
        assert_eq!(events, vec![Fist, OpenPalm]);
        assert_eq!(debouncer.last_emitted(), OpenPalm);
    }

    #[test]
    fn initial_none_is_silent() {
        let mut debouncer = Debouncer::default();
        assert!(feed(&mut debouncer, &[Gesture::None; 10]).is_empty());
        assert!(debouncer.last_emit_time().is_none());
    }

    #[test]
    fn hand_dropout_does_not_refire() {
        use Gesture::*;
        let mut debouncer = Debouncer::default();
        let events = feed(&mut debouncer, &[Fist, None, Fist, None, None, Fist]);
        assert_eq!(events, vec![Fist]);
        assert_eq!(debouncer.last_emitted(), Fist);
    }

    #[test]
    fn change_after_dropout_still_fires() {
        use Gesture::*;
        let mut debouncer = Debouncer::default();
        let events = feed(&mut debouncer, &[Fist, None, OpenPalm, None, Fist]);
        assert_eq!(events, vec![Fist, OpenPalm, Fist]);
    }

    #[test]
    fn unbounded_cooldown_saturates() {
        let now = Instant::now();
        let mut debouncer = Debouncer::from_seconds(f32::INFINITY);
        assert_eq!(debouncer.observe(Gesture::Fist, now), Some(Gesture::Fist));
        assert!(!debouncer.cooldown_elapsed(now + Duration::from_secs(3600)));

        let mut debouncer = Debouncer::from_seconds(1e30);
        assert_eq!(debouncer.observe(Gesture::Fist, now), Some(Gesture::Fist));

        let debouncer = Debouncer::from_seconds(f32::NAN);
        assert!(debouncer.cooldown_elapsed(now));
    }

    #[test]
    fn cooldown_does_not_gate_emission() {
        let mut debouncer = Debouncer::new(Duration::from_secs(10));
        let now = Instant::now();
        assert_eq!(debouncer.observe(Gesture::Fist, now), Some(Gesture::Fist));
        assert!(!debouncer.cooldown_elapsed(now + Duration::from_millis(5)));
        assert_eq!(
            debouncer.observe(Gesture::Point, now + Duration::from_millis(5)),
            Some(Gesture::Point)
        );
        assert_eq!(
            debouncer.last_emit_time(),
            Some(now + Duration::from_millis(5))
        );
    }

    #[test]
    fn cooldown_elapsed_after_duration() {
        let mut debouncer = Debouncer::from_seconds(1.0);
        let now = Instant::now();
        assert!(debouncer.cooldown_elapsed(now));
        debouncer.observe(Gesture::Pinch, now);
        assert!(!debouncer.cooldown_elapsed(now + Duration::from_millis(999)));
        assert!(debouncer.cooldown_elapsed(now + Duration::from_secs(1)));
    }
}
