use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use renderer::{
    ApiPreference, FrameLoop, FrameStatus, GpuPowerPreference, ManualClock, OffscreenSurface,
    PixelSize, ShaderCanvas,
};
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct SnapshotOptions {
    pub size: PixelSize,
    pub time: Duration,
    pub api: ApiPreference,
    pub power: GpuPowerPreference,
}

/// Renders one frame of `source` at a fixed shader time and returns the RGBA
/// pixels.
pub fn render_frame(source: &str, options: SnapshotOptions) -> Result<image::RgbaImage> {
    let frames = FrameLoop::new();
    let clock = ManualClock::new();
    let surface = OffscreenSurface::new(options.size)
        .with_power(options.power)
        .with_api_preference(options.api);
    let mut canvas = ShaderCanvas::mount_with_clock(surface, frames.clone(), clock.clone())
        .context("failed to start offscreen renderer")?;

    if !canvas.set_source(source) {
        let diagnostic = canvas.last_diagnostic().unwrap_or("unknown error");
        bail!("shader failed to compile:\n{diagnostic}");
    }
    clock.advance(options.time);

    let drawn = frames
        .tick()
        .into_iter()
        .map(|handle| canvas.frame(handle))
        .filter(|status| *status == FrameStatus::Drawn)
        .count();
    if drawn == 0 {
        bail!("renderer did not produce a frame");
    }

    let image = canvas.core().context().capture()?;
    canvas.unmount();
    Ok(image)
}

pub fn write_snapshot(source: &str, output: &Path, options: SnapshotOptions) -> Result<()> {
    let image = render_frame(source, options)?;
    image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        path = %output.display(),
        size = %options.size,
        time = options.time.as_secs_f32(),
        "snapshot written"
    );
    Ok(())
}
