use bytemuck::{Pod, Zeroable};

use crate::types::FrameUniforms;

/// std140 image of the `ShaderLensFrame` block injected by the GLSL prelude.
///
/// `vec2` at offset 0, `float` at offset 8, padded to a 16 byte block.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct FrameUniformBlock {
    pub resolution: [f32; 2],
    pub time: f32,
    _padding: f32,
}

impl FrameUniformBlock {
    pub(crate) const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

impl From<&FrameUniforms> for FrameUniformBlock {
    fn from(uniforms: &FrameUniforms) -> Self {
        Self {
            resolution: uniforms.resolution,
            time: uniforms.time,
            _padding: 0.0,
        }
    }
}
