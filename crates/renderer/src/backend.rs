//! Seams between the renderer core and a concrete graphics stack.
//!
//! A [`DrawSurface`] is the thing pixels end up on (a window, an offscreen
//! texture). It hands out a [`GraphicsContext`] for one API generation, which
//! the core then uses to compile stages, link programs and draw the quad. The
//! wgpu implementation lives in [`crate::gpu`].

use crate::types::{ContextApi, FrameUniforms, PixelSize, StageKind};

pub trait DrawSurface {
    type Context: GraphicsContext;

    /// Current drawable size in physical pixels. Queried before every draw.
    fn pixel_size(&self) -> PixelSize;

    /// Sets the drawable backing size. The caller decides when to resize.
    fn resize(&mut self, size: PixelSize);

    /// Acquires a context for one API generation, or explains why not.
    fn acquire_context(&mut self, api: ContextApi) -> Result<Self::Context, String>;
}

pub trait GraphicsContext {
    type Stage;
    type Program;
    type Buffer;

    fn api(&self) -> ContextApi;

    /// Uploads the static full-screen quad.
    fn create_quad(&mut self, vertices: &[[f32; 2]; 4]) -> Self::Buffer;

    /// Compiles one stage. `Err` carries the compiler log.
    fn compile_stage(&mut self, kind: StageKind, source: &str) -> Result<Self::Stage, String>;

    fn release_stage(&mut self, stage: Self::Stage);

    /// Links two compiled stages. `Err` carries the linker log.
    fn link_program(
        &mut self,
        vertex: &Self::Stage,
        fragment: &Self::Stage,
    ) -> Result<Self::Program, String>;

    fn release_program(&mut self, program: Self::Program);

    /// Draws the quad once over the full `viewport` with `program`.
    fn draw_quad(
        &mut self,
        program: &Self::Program,
        quad: &Self::Buffer,
        viewport: PixelSize,
        uniforms: &FrameUniforms,
    );
}
