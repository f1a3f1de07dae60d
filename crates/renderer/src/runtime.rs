//! Per-frame state that does not touch the GPU.
//!
//! [`RenderContext`] is owned by the window loop and consulted once per
//! iteration: it folds the current key states into the fill mode or a close
//! request, samples the clock, and hands back a [`FramePlan`] for the GPU
//! side to draw. Keeping this free of wgpu makes the loop's decisions
//! testable without a display.

use std::time::Instant;

use crate::gpu::ColorUniform;
use crate::types::FillMode;

/// How often frame statistics are logged, in seconds of elapsed time.
const STATS_INTERVAL_SECS: f64 = 2.0;

/// Snapshot of the clock for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Seconds since the loop started.
    pub seconds: f64,
    /// Monotonic frame counter.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f64, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Where frame times come from.
pub trait TimeSource: Send {
    fn sample(&mut self) -> TimeSample;
}

/// Monotonic clock starting at construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed().as_secs_f64(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Clock frozen at one timestamp; the frame counter still advances.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f64,
    frame: u64,
}

impl FixedTimeSource {
    pub fn new(time: f64) -> Self {
        Self { time, frame: 0 }
    }
}

impl TimeSource for FixedTimeSource {
    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.time, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Whether the loop should keep iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Running,
    /// Terminal: the loop exits at the top of its next iteration.
    CloseRequested,
}

/// Keys the loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    /// Requests close.
    Escape,
    /// Switches to wireframe.
    F1,
    /// Switches back to filled polygons.
    F2,
}

/// Current up/down state of every [`ControlKey`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStates {
    escape: bool,
    f1: bool,
    f2: bool,
}

impl KeyStates {
    pub fn set(&mut self, key: ControlKey, pressed: bool) {
        match key {
            ControlKey::Escape => self.escape = pressed,
            ControlKey::F1 => self.f1 = pressed,
            ControlKey::F2 => self.f2 = pressed,
        }
    }

    pub fn is_pressed(&self, key: ControlKey) -> bool {
        match key {
            ControlKey::Escape => self.escape,
            ControlKey::F1 => self.f1,
            ControlKey::F2 => self.f2,
        }
    }
}

/// Everything the GPU side needs to draw one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub fill_mode: FillMode,
    pub time: TimeSample,
    pub color: ColorUniform,
}

#[derive(Debug, Default)]
struct FrameStats {
    window_start: f64,
    frames: u32,
}

impl FrameStats {
    /// Counts a frame; yields the average rate once per interval.
    fn record(&mut self, seconds: f64) -> Option<f64> {
        self.frames += 1;
        let span = seconds - self.window_start;
        if span < STATS_INTERVAL_SECS {
            return None;
        }
        let fps = f64::from(self.frames) / span;
        self.window_start = seconds;
        self.frames = 0;
        Some(fps)
    }
}

/// Loop state, input and clock, threaded explicitly through the window loop.
pub struct RenderContext {
    state: LoopState,
    fill_mode: FillMode,
    keys: KeyStates,
    clock: BoxedTimeSource,
    stats: FrameStats,
}

impl RenderContext {
    pub fn new(clock: BoxedTimeSource) -> Self {
        Self {
            state: LoopState::Running,
            fill_mode: FillMode::Fill,
            keys: KeyStates::default(),
            clock,
            stats: FrameStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    /// Records a key transition reported by the windowing layer.
    pub fn set_key(&mut self, key: ControlKey, pressed: bool) {
        self.keys.set(key, pressed);
    }

    /// Marks the loop for exit, e.g. when the window's close button is used.
    pub fn request_close(&mut self) {
        if self.state == LoopState::Running {
            tracing::info!("close requested");
        }
        self.state = LoopState::CloseRequested;
    }

    /// Applies held keys. Escape wins over F1, which wins over F2; holding a
    /// key for many frames has the same effect as one press.
    pub fn handle_input(&mut self) {
        if self.keys.is_pressed(ControlKey::Escape) {
            self.request_close();
            return;
        }
        let wanted = if self.keys.is_pressed(ControlKey::F1) {
            FillMode::Wireframe
        } else if self.keys.is_pressed(ControlKey::F2) {
            FillMode::Fill
        } else {
            return;
        };
        if wanted != self.fill_mode {
            tracing::info!(mode = %wanted, "polygon mode changed");
            self.fill_mode = wanted;
        }
    }

    /// Runs input handling and, unless the loop is closing, plans a frame.
    pub fn begin_frame(&mut self) -> Option<FramePlan> {
        self.handle_input();
        if !self.is_running() {
            return None;
        }

        let time = self.clock.sample();
        if let Some(fps) = self.stats.record(time.seconds) {
            tracing::debug!(
                fps = format_args!("{fps:.1}"),
                frame = time.frame_index,
                mode = %self.fill_mode,
                "frame stats"
            );
        }
        Some(FramePlan {
            fill_mode: self.fill_mode,
            time,
            color: ColorUniform::pulse(time.seconds),
        })
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("state", &self.state)
            .field("fill_mode", &self.fill_mode)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{DrawCall, IndexList};
    use crate::scene::Scene;
    use crate::types::{SceneKind, WireframeStrategy};

    fn context_at(time: f64) -> RenderContext {
        RenderContext::new(Box::new(FixedTimeSource::new(time)))
    }

    #[test]
    fn starts_running_in_fill_mode() {
        let mut context = context_at(0.0);
        let plan = context.begin_frame().unwrap();
        assert_eq!(plan.fill_mode, FillMode::Fill);
        assert_eq!(plan.color.our_color, [0.0, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn escape_outranks_mode_keys() {
        let mut context = context_at(0.0);
        context.set_key(ControlKey::F1, true);
        context.set_key(ControlKey::Escape, true);
        assert!(context.begin_frame().is_none());
        assert_eq!(context.state(), LoopState::CloseRequested);
        assert_eq!(context.fill_mode(), FillMode::Fill);
    }

    #[test]
    fn f1_outranks_f2() {
        let mut context = context_at(0.0);
        context.set_key(ControlKey::F1, true);
        context.set_key(ControlKey::F2, true);
        context.handle_input();
        assert_eq!(context.fill_mode(), FillMode::Wireframe);

        context.set_key(ControlKey::F1, false);
        context.handle_input();
        assert_eq!(context.fill_mode(), FillMode::Fill);
    }

    #[test]
    fn held_key_is_idempotent() {
        let mut context = context_at(0.0);
        context.set_key(ControlKey::F1, true);
        for _ in 0..5 {
            context.handle_input();
            assert_eq!(context.fill_mode(), FillMode::Wireframe);
        }
        context.set_key(ControlKey::F1, false);
        context.handle_input();
        assert_eq!(context.fill_mode(), FillMode::Wireframe);
    }

    #[test]
    fn close_request_is_terminal() {
        let mut context = context_at(0.0);
        context.request_close();
        context.set_key(ControlKey::F2, true);
        assert!(context.begin_frame().is_none());
        assert!(context.begin_frame().is_none());
        assert!(!context.is_running());
    }

    #[test]
    fn frame_stats_report_once_per_interval() {
        let mut stats = FrameStats::default();
        assert_eq!(stats.record(0.5), None);
        assert_eq!(stats.record(1.5), None);
        let fps = stats.record(2.0).unwrap();
        assert!((fps - 1.5).abs() < 1e-9);
        assert_eq!(stats.record(3.0), None);
    }

    #[test]
    fn quad_frames_before_and_after_wireframe_toggle() {
        let scene = Scene::builtin(SceneKind::Animated).unwrap();
        let index_count = scene.mesh.indices().len() as u32;
        let mut context = context_at(0.0);

        let first = context.begin_frame().unwrap();
        let call = DrawCall::for_mode(index_count, first.fill_mode, WireframeStrategy::PolygonLine);
        assert_eq!(call.list, IndexList::Triangles);
        assert_eq!(call.index_count, 6);
        assert_eq!(call.triangles(), 2);
        assert_eq!(first.color.our_color[1], 0.5);

        context.set_key(ControlKey::F1, true);
        let second = context.begin_frame().unwrap();
        assert_eq!(second.fill_mode, FillMode::Wireframe);
        assert_eq!(second.time.frame_index, 1);
        for strategy in [WireframeStrategy::PolygonLine, WireframeStrategy::EdgeList] {
            let call = DrawCall::for_mode(index_count, second.fill_mode, strategy);
            assert_eq!(call.triangles(), 2);
        }
    }
}
