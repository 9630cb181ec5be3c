//! Live Shadertoy-style shader rendering for ShaderLens.
//!
//! A caller hands arbitrary `mainImage` source to a [`RendererCore`], which
//! wraps it into a complete fragment program, compiles and links it against a
//! fixed full-screen quad, and keeps drawing it once per display refresh with
//! `iResolution` and `iTime` supplied. Broken source never takes the loop
//! down: the last good program keeps drawing and the diagnostic is kept for
//! the caller.
//!
//! ```text
//!   ShaderCanvas::set_source ──▶ RendererCore::compile ──▶ GraphicsContext
//!                                        │                  (wgpu / recording)
//!   FrameLoop::tick ──▶ handles ──▶ RendererCore::run_frame ──▶ draw_quad
//!                                        └──▶ request_frame (re-arm)
//! ```
//!
//! The wgpu backend lives in [`gpu`]; [`compile`] also offers an offline
//! check that runs the wrapped program through naga without a GPU.

mod backend;
mod canvas;
mod clock;
pub mod compile;
mod engine;
mod error;
pub mod gpu;
#[cfg(test)]
mod recording;
mod types;

pub use backend::{DrawSurface, GraphicsContext};
pub use canvas::ShaderCanvas;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{FrameStatus, RendererCore};
pub use error::RendererError;
pub use gpu::{OffscreenSurface, WgpuContext, WindowSurface};
pub use scheduler::{FrameHandle, FrameLoop, FramePacer, FrameScheduler};
pub use types::{ApiPreference, ContextApi, FrameUniforms, GpuPowerPreference, PixelSize, StageKind};
