use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Receiver;
use renderer::{
    ApiPreference, FrameLoop, FramePacer, GpuPowerPreference, PixelSize, ShaderCanvas,
    WindowSurface,
};
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub title: String,
    pub size: PixelSize,
    pub fps: Option<f32>,
    pub api: ApiPreference,
    pub power: GpuPowerPreference,
    pub reload_interval: Duration,
}

/// Where replacement shader text comes from while the window is open.
#[derive(Debug, Default)]
pub struct SourceFeed {
    pub watch: Option<SourceWatcher>,
    pub updates: Option<Receiver<String>>,
}

impl SourceFeed {
    fn poll(&mut self, now: Instant) -> Option<String> {
        let mut latest = self.watch.as_mut().and_then(|watch| watch.poll(now));
        if let Some(updates) = self.updates.as_ref() {
            if let Some(pushed) = updates.try_iter().last() {
                latest = Some(pushed);
            }
        }
        latest
    }

    fn next_poll(&self) -> Option<Instant> {
        self.watch.as_ref().map(SourceWatcher::next_poll)
    }
}

/// Polls a file's modification time and returns its text when it changes.
#[derive(Debug)]
pub struct SourceWatcher {
    path: PathBuf,
    interval: Duration,
    last_check: Instant,
    last_modified: Option<SystemTime>,
}

impl SourceWatcher {
    pub fn new(path: PathBuf, interval: Duration, now: Instant) -> Self {
        let last_modified = modified(&path);
        Self {
            path,
            interval,
            last_check: now,
            last_modified,
        }
    }

    pub fn next_poll(&self) -> Instant {
        self.last_check + self.interval
    }

    pub fn poll(&mut self, now: Instant) -> Option<String> {
        if now < self.next_poll() {
            return None;
        }
        self.last_check = now;
        let current = modified(&self.path)?;
        if self.last_modified == Some(current) {
            return None;
        }
        // Editors often truncate then write; a failed read is retried next poll.
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                self.last_modified = Some(current);
                debug!(path = %self.path.display(), "shader file changed");
                Some(text)
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to re-read shader");
                None
            }
        }
    }
}

fn modified(path: &std::path::Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn apply_source(canvas: &mut ShaderCanvas<WindowSurface>, source: &str) {
    if canvas.set_source(source) {
        info!("shader compiled");
    } else {
        warn!("shader rejected; still showing the last good program");
        if let Some(diagnostic) = canvas.last_diagnostic() {
            eprintln!("{diagnostic}");
        }
    }
}

/// Opens a window rendering `initial` and blocks until it is closed.
pub fn run_preview(initial: &str, mut feed: SourceFeed, options: PreviewOptions) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(options.title.as_str())
            .with_inner_size(PhysicalSize::new(options.size.width, options.size.height))
            .build(&event_loop)
            .context("failed to create preview window")?,
    );

    let frames = FrameLoop::new();
    let surface = WindowSurface::new(Arc::clone(&window))
        .with_power(options.power)
        .with_api_preference(options.api);
    let mut canvas =
        ShaderCanvas::mount(surface, frames.clone()).context("failed to start renderer")?;
    info!(api = %canvas.core().api(), size = %options.size, "preview window ready");
    apply_source(&mut canvas, initial);

    let mut pacer = FramePacer::new(options.fps);
    let window_id = window.id();

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id: id, event } if id == window_id => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => {
                    debug!(width = size.width, height = size.height, "preview resized");
                    window.request_redraw();
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    if pacer.ready(now) {
                        pacer.mark_fired(now);
                        for handle in frames.tick() {
                            canvas.frame(handle);
                        }
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                let now = Instant::now();
                if let Some(source) = feed.poll(now) {
                    apply_source(&mut canvas, &source);
                }

                let mut wake = feed.next_poll();
                if frames.has_pending() {
                    match pacer.next_deadline() {
                        Some(deadline) if deadline > now => {
                            wake = Some(wake.map_or(deadline, |poll| poll.min(deadline)));
                        }
                        _ => window.request_redraw(),
                    }
                }
                elwt.set_control_flow(match wake {
                    Some(deadline) => ControlFlow::WaitUntil(deadline),
                    None => ControlFlow::Wait,
                });
            }
            Event::LoopExiting => {
                info!(frames = canvas.core().frames_drawn(), "closing preview");
                canvas.core_mut().destroy();
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
