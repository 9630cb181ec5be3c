use std::time::Duration;

use scheduler::{FrameHandle, FrameLoop, FrameScheduler};
use tracing::{debug, warn};

use crate::backend::{DrawSurface, GraphicsContext};
use crate::clock::{Clock, RenderClock, SystemClock};
use crate::compile::{wrap_fragment, QUAD_VERTICES, VERTEX_SHADER_GLSL};
use crate::error::RendererError;
use crate::types::{ContextApi, FrameUniforms, StageKind};

type ContextOf<S> = <S as DrawSurface>::Context;
type ProgramOf<S> = <ContextOf<S> as GraphicsContext>::Program;
type QuadOf<S> = <ContextOf<S> as GraphicsContext>::Buffer;

/// Outcome of one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// A program was bound and the quad was drawn.
    Drawn,
    /// No program yet; the loop stays armed.
    Idle,
    /// The handle was cancelled or belongs to someone else.
    Stale,
}

/// Owns one surface, its graphics context and the current shader program.
///
/// Created once per surface and kept alive across edits: call
/// [`compile`](Self::compile) with new source instead of building a new core.
/// The animation loop is cooperative. The host forwards every handle fired by
/// the scheduler to [`run_frame`](Self::run_frame), which draws and re-arms.
pub struct RendererCore<S, F = FrameLoop, K = SystemClock>
where
    S: DrawSurface,
    F: FrameScheduler,
    K: Clock,
{
    surface: S,
    context: ContextOf<S>,
    quad: QuadOf<S>,
    program: Option<ProgramOf<S>>,
    clock: RenderClock<K>,
    scheduler: F,
    animation: Option<FrameHandle>,
    last_error: Option<RendererError>,
    frames_drawn: u64,
    destroyed: bool,
}

impl<S, F> RendererCore<S, F, SystemClock>
where
    S: DrawSurface,
    F: FrameScheduler,
{
    /// Acquires a context from `surface` (modern API first, legacy second)
    /// and uploads the quad. Time starts now.
    pub fn create(surface: S, scheduler: F) -> Result<Self, RendererError> {
        Self::with_clock(surface, scheduler, SystemClock)
    }
}

impl<S, F, K> RendererCore<S, F, K>
where
    S: DrawSurface,
    F: FrameScheduler,
    K: Clock,
{
    pub fn with_clock(mut surface: S, scheduler: F, clock: K) -> Result<Self, RendererError> {
        let mut reasons = Vec::new();
        let mut acquired = None;
        for api in ContextApi::PREFERENCE {
            match surface.acquire_context(api) {
                Ok(context) => {
                    acquired = Some(context);
                    break;
                }
                Err(reason) => {
                    debug!(%api, %reason, "graphics context unavailable");
                    reasons.push(format!("{api}: {reason}"));
                }
            }
        }
        let Some(mut context) = acquired else {
            return Err(RendererError::ContextUnavailable { reasons });
        };

        let quad = context.create_quad(&QUAD_VERTICES);
        debug!(api = %context.api(), size = %surface.pixel_size(), "renderer core created");

        Ok(Self {
            surface,
            context,
            quad,
            program: None,
            clock: RenderClock::start(clock),
            scheduler,
            animation: None,
            last_error: None,
            frames_drawn: 0,
            destroyed: false,
        })
    }

    /// Wraps, compiles and links `fragment_body`.
    ///
    /// Returns `true` when the new program replaced the current one. On
    /// failure the current program (if any) keeps drawing and the diagnostic
    /// is available from [`last_diagnostic`](Self::last_diagnostic).
    pub fn compile(&mut self, fragment_body: &str) -> bool {
        if self.destroyed {
            warn!("compile called on a destroyed renderer");
            return false;
        }
        match self.build_program(fragment_body) {
            Ok(program) => {
                if let Some(previous) = self.program.replace(program) {
                    self.context.release_program(previous);
                }
                self.last_error = None;
                debug!(bytes = fragment_body.len(), "shader program compiled");
                true
            }
            Err(err) => {
                warn!(error = %err, "shader rejected; keeping previous program");
                self.last_error = Some(err);
                false
            }
        }
    }

    fn build_program(&mut self, fragment_body: &str) -> Result<ProgramOf<S>, RendererError> {
        let vertex = self
            .context
            .compile_stage(StageKind::Vertex, VERTEX_SHADER_GLSL)
            .map_err(|log| RendererError::compile(StageKind::Vertex, log))?;

        let wrapped = wrap_fragment(fragment_body);
        let fragment = match self.context.compile_stage(StageKind::Fragment, &wrapped) {
            Ok(stage) => stage,
            Err(log) => {
                self.context.release_stage(vertex);
                return Err(RendererError::compile(StageKind::Fragment, log));
            }
        };

        let linked = self
            .context
            .link_program(&vertex, &fragment)
            .map_err(RendererError::link);
        self.context.release_stage(vertex);
        self.context.release_stage(fragment);
        linked
    }

    /// Arms the animation loop, replacing any pending frame.
    pub fn start(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        self.animation = Some(self.scheduler.request_frame());
    }

    /// Handles one scheduler callback: draw if a program is bound, then
    /// request the next frame.
    pub fn run_frame(&mut self, handle: FrameHandle) -> FrameStatus {
        if self.animation != Some(handle) {
            return FrameStatus::Stale;
        }
        self.animation = None;

        let status = match self.program.as_ref() {
            Some(program) => {
                let size = self.surface.pixel_size();
                let uniforms = FrameUniforms::new(size, self.clock.seconds());
                self.context
                    .draw_quad(program, &self.quad, size, &uniforms);
                self.frames_drawn = self.frames_drawn.saturating_add(1);
                FrameStatus::Drawn
            }
            None => FrameStatus::Idle,
        };

        self.animation = Some(self.scheduler.request_frame());
        status
    }

    /// Cancels the pending frame. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(handle) = self.animation.take() {
            self.scheduler.cancel_frame(handle);
        }
    }

    /// Stops the loop and releases the current program. Safe to call
    /// repeatedly; also runs on drop.
    pub fn destroy(&mut self) {
        self.stop();
        if let Some(program) = self.program.take() {
            self.context.release_program(program);
        }
        if !self.destroyed {
            debug!(frames = self.frames_drawn, "renderer core destroyed");
        }
        self.destroyed = true;
    }

    pub fn last_diagnostic(&self) -> Option<&str> {
        self.last_error.as_ref().and_then(RendererError::log)
    }

    pub fn last_error(&self) -> Option<&RendererError> {
        self.last_error.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.animation.is_some()
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Time fed to `iTime` on the next frame.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn api(&self) -> ContextApi {
        self.context.api()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn context(&self) -> &S::Context {
        &self.context
    }
}

impl<S, F, K> Drop for RendererCore<S, F, K>
where
    S: DrawSurface,
    F: FrameScheduler,
    K: Clock,
{
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::recording::{RecordingProbe, RecordingSurface};
    use crate::types::PixelSize;

    const RED: &str = "void mainImage(out vec4 c, in vec2 p){ c = vec4(1.0,0.0,0.0,1.0); }";
    const BLUE: &str = "void mainImage(out vec4 c, in vec2 p){ c = vec4(0.0,0.0,1.0,1.0); }";
    const ANIMATED: &str = r"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    fragColor = vec4(uv, 0.5 + 0.5 * sin(iTime), 1.0);
}
";

    type TestCore = RendererCore<RecordingSurface, FrameLoop, ManualClock>;

    fn core_with(probe: &RecordingProbe) -> (TestCore, FrameLoop, ManualClock) {
        let frames = FrameLoop::new();
        let clock = ManualClock::new();
        let core = RendererCore::with_clock(probe.surface(), frames.clone(), clock.clone())
            .expect("recording context");
        (core, frames, clock)
    }

    fn tick(core: &mut TestCore, frames: &FrameLoop) -> Vec<FrameStatus> {
        frames
            .tick()
            .into_iter()
            .map(|handle| core.run_frame(handle))
            .collect()
    }

    #[test]
    fn valid_source_draws_once_per_tick() {
        let probe = RecordingProbe::new(PixelSize::new(320, 200));
        let (mut core, frames, _clock) = core_with(&probe);

        assert!(core.compile(RED));
        assert!(core.last_diagnostic().is_none());
        core.start();

        assert_eq!(tick(&mut core, &frames), vec![FrameStatus::Drawn]);
        assert_eq!(probe.draws().len(), 1);
        assert_eq!(probe.draws()[0].viewport, PixelSize::new(320, 200));
        assert_eq!(probe.draws()[0].uniforms.resolution, [320.0, 200.0]);
        assert!(core.is_running(), "frame re-arms itself");
    }

    #[test]
    fn invalid_source_keeps_previous_program() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, _clock) = core_with(&probe);

        assert!(core.compile(RED));
        let good = probe.live_program_ids();
        core.start();

        assert!(!core.compile("void mainImage(out vec4 c, in vec2 p) { c = ; }"));
        assert!(core
            .last_diagnostic()
            .is_some_and(|log| !log.trim().is_empty()));
        assert_eq!(probe.live_program_ids(), good);

        assert_eq!(tick(&mut core, &frames), vec![FrameStatus::Drawn]);
        assert_eq!(Some(probe.draws()[0].program), good.first().copied());
    }

    #[test]
    fn garbage_fails_without_touching_state() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, _clock) = core_with(&probe);

        assert!(!core.compile("not glsl at all"));
        assert!(!core.has_program());
        assert!(!core.is_running());
        assert!(matches!(
            core.last_error(),
            Some(RendererError::ShaderCompile {
                stage: StageKind::Fragment,
                ..
            })
        ));
        assert_eq!(probe.live_stages(), 0);
        assert!(tick(&mut core, &frames).is_empty());
    }

    #[test]
    fn missing_main_image_is_a_compile_error() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, _frames, _clock) = core_with(&probe);

        assert!(!core.compile("void image(out vec4 c, in vec2 p) { c = vec4(1.0); }"));
        assert!(core.last_diagnostic().is_some());
        assert_eq!(probe.live_programs(), 0);
    }

    #[test]
    fn successful_compile_clears_diagnostic() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, _frames, _clock) = core_with(&probe);

        assert!(!core.compile("nope"));
        assert!(core.last_diagnostic().is_some());
        assert!(core.compile(RED));
        assert!(core.last_diagnostic().is_none());
    }

    #[test]
    fn stop_halts_drawing_and_start_resumes_without_recompiling() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, _clock) = core_with(&probe);

        assert!(core.compile(RED));
        core.start();
        tick(&mut core, &frames);
        let created = probe.programs_created();

        core.stop();
        core.stop();
        for _ in 0..5 {
            assert!(tick(&mut core, &frames).is_empty());
        }
        assert_eq!(probe.draws().len(), 1);

        core.start();
        assert_eq!(tick(&mut core, &frames), vec![FrameStatus::Drawn]);
        assert_eq!(probe.programs_created(), created);
    }

    #[test]
    fn restart_replaces_the_pending_frame() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, _clock) = core_with(&probe);

        assert!(core.compile(RED));
        core.start();
        core.start();
        assert_eq!(frames.pending(), 1);
        assert_eq!(tick(&mut core, &frames), vec![FrameStatus::Drawn]);
    }

    #[test]
    fn alternating_compiles_keep_resources_bounded() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, _clock) = core_with(&probe);
        core.start();

        for round in 0..6 {
            let source = if round % 2 == 0 { RED } else { "broken(" };
            core.compile(source);
            core.compile(BLUE);
            tick(&mut core, &frames);
            assert!(probe.live_programs() <= 1);
            assert_eq!(probe.live_stages(), 0);
        }
        assert_eq!(probe.live_programs(), 1);
    }

    #[test]
    fn link_failure_is_reported_like_a_compile_failure() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, _frames, _clock) = core_with(&probe);
        assert!(core.compile(RED));

        probe.set_fail_link(true);
        assert!(!core.compile(BLUE));
        assert!(matches!(
            core.last_error(),
            Some(RendererError::ShaderLink { .. })
        ));
        assert_eq!(probe.live_programs(), 1);
        assert_eq!(probe.live_stages(), 0);
    }

    #[test]
    fn time_starts_at_zero_and_never_decreases() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, clock) = core_with(&probe);

        assert!(core.compile(ANIMATED));
        core.start();
        tick(&mut core, &frames);

        clock.advance(Duration::from_millis(250));
        assert!(core.compile(RED), "recompiling must not reset time");
        tick(&mut core, &frames);
        clock.advance(Duration::from_millis(250));
        tick(&mut core, &frames);

        let times: Vec<f32> = probe.draws().iter().map(|d| d.uniforms.time).collect();
        assert_eq!(times[0], 0.0);
        assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!((times[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn frames_without_program_are_idle_but_stay_armed() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, _clock) = core_with(&probe);

        core.start();
        assert_eq!(tick(&mut core, &frames), vec![FrameStatus::Idle]);
        assert_eq!(tick(&mut core, &frames), vec![FrameStatus::Idle]);
        assert!(probe.draws().is_empty());

        assert!(core.compile(RED));
        assert_eq!(tick(&mut core, &frames), vec![FrameStatus::Drawn]);
    }

    #[test]
    fn foreign_and_cancelled_handles_are_stale() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, mut frames, _clock) = core_with(&probe);
        assert!(core.compile(RED));

        let foreign = frames.request_frame();
        assert_eq!(core.run_frame(foreign), FrameStatus::Stale);

        core.start();
        let due = frames.tick();
        core.stop();
        for handle in due {
            assert_eq!(core.run_frame(handle), FrameStatus::Stale);
        }
        assert!(probe.draws().is_empty());
    }

    #[test]
    fn resize_is_picked_up_on_next_frame() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, _clock) = core_with(&probe);
        assert!(core.compile(RED));
        core.start();
        tick(&mut core, &frames);

        core.surface_mut().resize(PixelSize::new(800, 600));
        tick(&mut core, &frames);
        let draws = probe.draws();
        assert_eq!(draws[1].viewport, PixelSize::new(800, 600));
        assert_eq!(draws[1].uniforms.resolution, [800.0, 600.0]);
    }

    #[test]
    fn destroy_releases_program_and_stops_forever() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, _clock) = core_with(&probe);
        assert!(core.compile(RED));
        core.start();

        core.destroy();
        core.destroy();
        assert_eq!(probe.live_programs(), 0);
        assert!(!core.is_running());
        assert!(frames.tick().is_empty());

        core.start();
        assert!(!core.is_running());
        assert!(!core.compile(RED));
        assert_eq!(probe.live_programs(), 0);
    }

    #[test]
    fn drop_releases_program() {
        let probe = RecordingProbe::new(PixelSize::new(64, 64));
        let (mut core, frames, _clock) = core_with(&probe);
        assert!(core.compile(RED));
        core.start();
        drop(core);
        assert_eq!(probe.live_programs(), 0);
        assert!(!frames.has_pending());
    }

    #[test]
    fn falls_back_to_legacy_api() {
        let probe = RecordingProbe::with_apis(PixelSize::new(64, 64), &[ContextApi::Legacy]);
        let (core, _frames, _clock) = core_with(&probe);
        assert_eq!(core.api(), ContextApi::Legacy);
        assert_eq!(probe.quads(), 1);
    }

    #[test]
    fn no_api_means_context_unavailable() {
        let probe = RecordingProbe::with_apis(PixelSize::new(64, 64), &[]);
        let err = RendererCore::create(probe.surface(), FrameLoop::new())
            .err()
            .expect("no context");
        match err {
            RendererError::ContextUnavailable { reasons } => assert_eq!(reasons.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
