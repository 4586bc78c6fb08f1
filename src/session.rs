use std::time::Instant;

use anyhow::Result;
use crossbeam_channel::Receiver;

use crate::{
    arm::ArmPose,
    config::AppConfig,
    dispatch::{Action, Dispatcher, Effector},
    gesture::{FrameOutcome, GestureEngine, PointerSmoother, to_screen},
    pipeline::{FrameSource, LandmarkSource},
    stats::{GestureStats, SessionSummary},
    types::{Gesture, LandmarkSet},
};

/// Owns every resource of one control run: frame source, detector, gesture
/// state and effector. Resources are released by `close`, which also runs on
/// drop, so early returns and errors release the camera too.
pub struct Session<F: FrameSource, L: LandmarkSource, E: Effector> {
    frames: F,
    landmarks: L,
    engine: GestureEngine,
    dispatcher: Dispatcher<E>,
    smoother: PointerSmoother,
    stats: GestureStats,
    quit_rx: Receiver<()>,
    robot_arm: bool,
    arm_pose: Option<ArmPose>,
    closed: bool,
}

impl<F: FrameSource, L: LandmarkSource, E: Effector> Session<F, L, E> {
    pub fn open(
        config: &AppConfig,
        frames: F,
        landmarks: L,
        effector: E,
        quit_rx: Receiver<()>,
    ) -> Self {
        log::info!(
            "session open (extension x{}, pinch < {}, smoothing {}, cooldown {}s{})",
            config.gesture.extension_threshold_multiplier,
            config.gesture.pinch_distance_threshold,
            config.gesture.mouse_smoothing_alpha,
            config.gesture.gesture_cooldown_seconds,
            if config.control.dry_run { ", dry run" } else { "" }
        );

        Self {
            frames,
            landmarks,
            engine: GestureEngine::new(&config.gesture),
            dispatcher: Dispatcher::new(effector, &config.control),
            smoother: PointerSmoother::new(config.gesture.mouse_smoothing_alpha),
            stats: GestureStats::new(Instant::now()),
            quit_rx,
            robot_arm: config.control.robot_arm,
            arm_pose: None,
            closed: false,
        }
    }

    /// Runs until a quit signal arrives or the frame stream ends.
    pub fn run(&mut self) -> Result<SessionSummary> {
        loop {
            if self.quit_rx.try_recv().is_ok() {
                log::info!("quit requested");
                break;
            }

            let frame = match self.frames.next_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("frame stream ended: {err:#}");
                    break;
                }
            };

            let landmarks = self.landmarks.detect(&frame).unwrap_or_else(|err| {
                log::warn!("hand detection failed: {err:?}");
                None
            });
            self.process(landmarks.as_ref(), frame.timestamp);
        }

        let summary = self.stats.summary(Instant::now());
        self.close();
        Ok(summary)
    }

    /// Handles one frame's landmarks: debounced actions, continuous pointer
    /// movement while pointing, stats and arm pose.
    pub fn process(&mut self, landmarks: Option<&LandmarkSet>, now: Instant) -> FrameOutcome {
        let outcome = self.engine.step(landmarks, now);

        if let Some(extended) = outcome.extended {
            log::debug!("extended {:?} -> {}", extended.0, outcome.gesture);
        }

        if let Some(event) = outcome.event {
            self.stats.record_event();
            log::info!(
                "gesture: {}{} ({})",
                event.emoji(),
                event.display_name(),
                event
            );
            if let Some(action) = Action::for_gesture(event) {
                self.dispatcher.dispatch(action);
            }
        }

        if outcome.gesture == Gesture::Point {
            if let Some(position) = outcome.hand_position {
                let target = to_screen(position, self.dispatcher.screen_size());
                let (x, y) = self.smoother.update(target);
                self.dispatcher.dispatch(Action::MoveMouse {
                    x: x.round() as i32,
                    y: y.round() as i32,
                });
            }
        }

        if self.robot_arm {
            if let Some(landmarks) = landmarks {
                let pose = ArmPose::from_landmarks(landmarks);
                let (ex, ey) = pose.end_effector();
                log::debug!(
                    "arm shoulder {:.0} elbow {:.0} wrist {:.0} -> end ({ex:.0}, {ey:.0})",
                    pose.shoulder,
                    pose.elbow,
                    pose.wrist
                );
                self.arm_pose = Some(pose);
            }
        }

        self.stats
            .record_frame(outcome.gesture, outcome.hand_position.is_some());
        outcome
    }

    #[cfg(test)]
    pub fn arm_pose(&self) -> Option<ArmPose> {
        self.arm_pose
    }

    #[cfg(test)]
    pub fn dispatcher(&self) -> &Dispatcher<E> {
        &self.dispatcher
    }

    /// Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.frames.close();
        log::info!(
            "session closed, last gesture {}",
            self.engine.debouncer().last_emitted()
        );
    }
}

impl<F: FrameSource, L: LandmarkSource, E: Effector> Drop for Session<F, L, E> {
    fn drop(&mut self) {
        self.close();
    }
}
