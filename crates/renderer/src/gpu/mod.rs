//! wgpu implementation of the renderer seams.
//!
//! - `context` owns the instance, device and render target (window swapchain
//!   or offscreen texture) and implements `GraphicsContext`. Compile and link
//!   failures are caught with validation error scopes.
//! - `pipeline` holds the shared bind group/pipeline layouts and builds the
//!   triangle-strip pipeline for a vertex/fragment pair.
//! - `uniforms` mirrors the injected `ShaderLensFrame` block.
//! - `surface` provides the window and offscreen `DrawSurface`s.

mod context;
mod pipeline;
mod surface;
mod uniforms;

pub use context::{AdapterProfile, WgpuContext, WgpuProgram, WgpuStage};
pub use surface::{OffscreenSurface, WindowSurface};
