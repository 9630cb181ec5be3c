use scheduler::{FrameHandle, FrameLoop, FrameScheduler};

use crate::backend::DrawSurface;
use crate::clock::{Clock, SystemClock};
use crate::engine::{FrameStatus, RendererCore};
use crate::error::RendererError;
use crate::types::PixelSize;

/// Binds one renderer core to one mounted surface.
///
/// Source changes go through [`set_source`](Self::set_source): identical text
/// is not recompiled, a successful compile (re)starts the loop, and a failed
/// one leaves the running loop drawing the last good program.
pub struct ShaderCanvas<S, F = FrameLoop, K = SystemClock>
where
    S: DrawSurface,
    F: FrameScheduler,
    K: Clock,
{
    core: RendererCore<S, F, K>,
    source: Option<String>,
    compiled: bool,
}

impl<S, F> ShaderCanvas<S, F, SystemClock>
where
    S: DrawSurface,
    F: FrameScheduler,
{
    pub fn mount(surface: S, scheduler: F) -> Result<Self, RendererError> {
        Ok(Self::from_core(RendererCore::create(surface, scheduler)?))
    }
}

impl<S, F, K> ShaderCanvas<S, F, K>
where
    S: DrawSurface,
    F: FrameScheduler,
    K: Clock,
{
    pub fn mount_with_clock(surface: S, scheduler: F, clock: K) -> Result<Self, RendererError> {
        Ok(Self::from_core(RendererCore::with_clock(
            surface, scheduler, clock,
        )?))
    }

    fn from_core(core: RendererCore<S, F, K>) -> Self {
        Self {
            core,
            source: None,
            compiled: false,
        }
    }

    /// Compiles `source` unless it matches the last one; returns whether the
    /// source compiled.
    pub fn set_source(&mut self, source: &str) -> bool {
        if self.source.as_deref() == Some(source) {
            return self.compiled;
        }
        self.compiled = self.core.compile(source);
        self.source = Some(source.to_owned());
        if self.compiled {
            self.core.start();
        }
        self.compiled
    }

    /// Updates the backing size; the next frame reads it.
    pub fn resize(&mut self, size: PixelSize) {
        self.core.surface_mut().resize(size);
    }

    pub fn frame(&mut self, handle: FrameHandle) -> FrameStatus {
        self.core.run_frame(handle)
    }

    /// Stops the loop and releases GPU state.
    pub fn unmount(mut self) {
        self.core.destroy();
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn last_diagnostic(&self) -> Option<&str> {
        self.core.last_diagnostic()
    }

    pub fn core(&self) -> &RendererCore<S, F, K> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut RendererCore<S, F, K> {
        &mut self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingProbe;

    const RED: &str = "void mainImage(out vec4 c, in vec2 p){ c = vec4(1.0,0.0,0.0,1.0); }";

    fn dispatch<S: DrawSurface>(canvas: &mut ShaderCanvas<S>, frames: &FrameLoop) -> usize {
        frames
            .tick()
            .into_iter()
            .filter(|handle| canvas.frame(*handle) == FrameStatus::Drawn)
            .count()
    }

    #[test]
    fn mount_does_not_start_until_source_compiles() {
        let probe = RecordingProbe::new(PixelSize::new(32, 32));
        let frames = FrameLoop::new();
        let mut canvas = ShaderCanvas::mount(probe.surface(), frames.clone()).expect("mount");
        assert!(!canvas.core().is_running());

        assert!(!canvas.set_source("broken"));
        assert!(!canvas.core().is_running());
        assert!(canvas.last_diagnostic().is_some());

        assert!(canvas.set_source(RED));
        assert!(canvas.core().is_running());
        assert_eq!(dispatch(&mut canvas, &frames), 1);
    }

    #[test]
    fn identical_source_is_not_recompiled() {
        let probe = RecordingProbe::new(PixelSize::new(32, 32));
        let frames = FrameLoop::new();
        let mut canvas = ShaderCanvas::mount(probe.surface(), frames.clone()).expect("mount");

        assert!(canvas.set_source(RED));
        assert!(canvas.set_source(RED));
        assert_eq!(probe.programs_created(), 1);

        assert!(!canvas.set_source("broken"));
        assert!(!canvas.set_source("broken"));
        assert_eq!(canvas.source(), Some("broken"));
    }

    #[test]
    fn failing_edit_keeps_loop_running() {
        let probe = RecordingProbe::new(PixelSize::new(32, 32));
        let frames = FrameLoop::new();
        let mut canvas = ShaderCanvas::mount(probe.surface(), frames.clone()).expect("mount");

        assert!(canvas.set_source(RED));
        assert!(!canvas.set_source("void mainImage(out vec4 c, in vec2 p) { c = }"));
        assert!(canvas.core().is_running());
        assert_eq!(dispatch(&mut canvas, &frames), 1);
        assert_eq!(dispatch(&mut canvas, &frames), 1);
    }

    #[test]
    fn resize_reaches_next_draw() {
        let probe = RecordingProbe::new(PixelSize::new(32, 32));
        let frames = FrameLoop::new();
        let mut canvas = ShaderCanvas::mount(probe.surface(), frames.clone()).expect("mount");
        assert!(canvas.set_source(RED));

        canvas.resize(PixelSize::new(640, 480));
        dispatch(&mut canvas, &frames);
        assert_eq!(probe.draws()[0].viewport, PixelSize::new(640, 480));
    }

    #[test]
    fn unmount_cancels_pending_frame() {
        let probe = RecordingProbe::new(PixelSize::new(32, 32));
        let frames = FrameLoop::new();
        let mut canvas = ShaderCanvas::mount(probe.surface(), frames.clone()).expect("mount");
        assert!(canvas.set_source(RED));
        assert!(frames.has_pending());

        canvas.unmount();
        assert!(!frames.has_pending());
        assert_eq!(probe.live_programs(), 0);
    }
}
