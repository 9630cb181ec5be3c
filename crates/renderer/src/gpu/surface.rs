use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::backend::DrawSurface;
use crate::types::{ApiPreference, ContextApi, GpuPowerPreference, PixelSize};

use super::context::WgpuContext;

fn gate(preference: ApiPreference, api: ContextApi) -> Result<(), String> {
    if preference.allows(api) {
        Ok(())
    } else {
        Err("disabled by configuration".to_string())
    }
}

/// A winit window. The drawable size follows `inner_size()`.
pub struct WindowSurface {
    window: Arc<Window>,
    power: GpuPowerPreference,
    preference: ApiPreference,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            power: GpuPowerPreference::default(),
            preference: ApiPreference::default(),
        }
    }

    pub fn with_power(mut self, power: GpuPowerPreference) -> Self {
        self.power = power;
        self
    }

    pub fn with_api_preference(mut self, preference: ApiPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl DrawSurface for WindowSurface {
    type Context = WgpuContext;

    fn pixel_size(&self) -> PixelSize {
        let size = self.window.inner_size();
        PixelSize::new(size.width, size.height)
    }

    fn resize(&mut self, size: PixelSize) {
        // The compositor may ignore the request; pixel_size stays authoritative.
        let _ = self
            .window
            .request_inner_size(PhysicalSize::new(size.width, size.height));
    }

    fn acquire_context(&mut self, api: ContextApi) -> Result<WgpuContext, String> {
        gate(self.preference, api)?;
        WgpuContext::for_window(Arc::clone(&self.window), api, self.power)
            .map_err(|err| format!("{err:#}"))
    }
}

/// A texture of fixed pixel size that can be read back.
pub struct OffscreenSurface {
    size: PixelSize,
    power: GpuPowerPreference,
    preference: ApiPreference,
}

impl OffscreenSurface {
    /// Zero dimensions are clamped to one pixel.
    pub fn new(size: PixelSize) -> Self {
        Self {
            size: PixelSize::new(size.width.max(1), size.height.max(1)),
            power: GpuPowerPreference::default(),
            preference: ApiPreference::default(),
        }
    }

    pub fn with_power(mut self, power: GpuPowerPreference) -> Self {
        self.power = power;
        self
    }

    pub fn with_api_preference(mut self, preference: ApiPreference) -> Self {
        self.preference = preference;
        self
    }
}

impl DrawSurface for OffscreenSurface {
    type Context = WgpuContext;

    fn pixel_size(&self) -> PixelSize {
        self.size
    }

    fn resize(&mut self, size: PixelSize) {
        self.size = PixelSize::new(size.width.max(1), size.height.max(1));
    }

    fn acquire_context(&mut self, api: ContextApi) -> Result<WgpuContext, String> {
        gate(self.preference, api)?;
        WgpuContext::offscreen(self.size, api, self.power).map_err(|err| format!("{err:#}"))
    }
}
