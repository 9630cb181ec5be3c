use std::error::Error as StdError;

use wgpu::naga;
use wgpu::naga::front::glsl::{Frontend, Options, ParseErrors};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::RendererError;
use crate::types::StageKind;

/// Triangle-strip quad covering `[-1, 1]²` in normalised device coordinates.
pub const QUAD_VERTICES: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];

/// Attribute location of the quad position stream in [`VERTEX_SHADER_GLSL`].
pub(crate) const POSITION_LOCATION: u32 = 0;

/// Pass-through vertex stage: the quad position goes straight to clip space.
pub const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_pos;

void main() {
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
";

/// GLSL prologue injected ahead of every caller-supplied fragment body.
///
/// The uniform block layout must match `FrameUniformBlock` in
/// `gpu/uniforms.rs`. The Shadertoy names are macros over the block members so
/// the body can use `iResolution` and `iTime` as plain globals.
const HEADER: &str = r"#version 450
precision highp float;

layout(location = 0) out vec4 shaderlens_fragColor;

layout(std140, set = 0, binding = 0) uniform ShaderLensFrame {
    vec2 shaderlens_resolution;
    float shaderlens_time;
} shaderlens_frame;

#define iResolution shaderlens_frame.shaderlens_resolution
#define iTime shaderlens_frame.shaderlens_time
";

/// GLSL epilogue: flips to a bottom-left origin and delegates to `mainImage`.
const FOOTER: &str = r"
void main() {
    vec2 fragCoord = vec2(gl_FragCoord.x, iResolution.y - gl_FragCoord.y);
    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    shaderlens_fragColor = color;
}
";

/// Number of wrapped-source lines that precede the caller body.
fn body_line_offset() -> u32 {
    // HEADER ends with a newline, then the `#line 1` directive.
    HEADER.lines().count() as u32 + 1
}

/// Produces a complete fragment program from a Shadertoy-style body.
///
/// The body is inserted verbatim between [`HEADER`] and [`FOOTER`]; it must
/// define `void mainImage(out vec4 fragColor, in vec2 fragCoord)`.
pub fn wrap_fragment(body: &str) -> String {
    let mut wrapped = String::with_capacity(HEADER.len() + body.len() + FOOTER.len() + 16);
    wrapped.push_str(HEADER);
    wrapped.push_str("#line 1\n");
    wrapped.push_str(body);
    if !body.ends_with('\n') {
        wrapped.push('\n');
    }
    wrapped.push_str(FOOTER);
    wrapped
}

/// Runs a GLSL stage through naga's front end and validator.
///
/// Errors are rendered to a single human-readable diagnostic. Locations inside
/// a wrapped fragment body are reported relative to the body.
pub fn validate_glsl(stage: StageKind, source: &str) -> Result<naga::Module, String> {
    let mut frontend = Frontend::default();
    let options = Options::from(naga_stage(stage));
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| describe_parse_errors(stage, source, &errors))?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| describe_error_chain(err.as_inner()))?;

    Ok(module)
}

/// Compiles the vertex stage and the wrapped fragment body offline.
///
/// Used by tooling to check a shader without acquiring a GPU context.
pub fn check_fragment(body: &str) -> Result<(), RendererError> {
    validate_glsl(StageKind::Vertex, VERTEX_SHADER_GLSL)
        .map_err(|log| RendererError::compile(StageKind::Vertex, log))?;
    validate_glsl(StageKind::Fragment, &wrap_fragment(body))
        .map_err(|log| RendererError::compile(StageKind::Fragment, log))?;
    Ok(())
}

pub(crate) fn naga_stage(stage: StageKind) -> naga::ShaderStage {
    match stage {
        StageKind::Vertex => naga::ShaderStage::Vertex,
        StageKind::Fragment => naga::ShaderStage::Fragment,
    }
}

/// One-based line of the wrapped fragment source where [`FOOTER`] begins, if
/// `source` came out of [`wrap_fragment`].
fn footer_start_line(source: &str) -> Option<u32> {
    if !source.ends_with(FOOTER) {
        return None;
    }
    let before = &source[..source.len() - FOOTER.len()];
    Some(before.lines().count() as u32 + 1)
}

fn describe_parse_errors(stage: StageKind, source: &str, errors: &ParseErrors) -> String {
    let (offset, footer) = match stage {
        StageKind::Fragment => (body_line_offset(), footer_start_line(source)),
        StageKind::Vertex => (0, None),
    };
    let mut messages = Vec::with_capacity(errors.errors.len());
    for error in &errors.errors {
        let message = error.kind.to_string();
        if !error.meta.is_defined() {
            messages.push(message);
            continue;
        }
        let location = error.meta.location(source);
        let (line, position) = (location.line_number, location.line_position);
        match footer {
            Some(start) if line >= start => {
                if message.contains("mainImage") {
                    messages.push(format!(
                        "shader does not define `void mainImage(out vec4 fragColor, in vec2 fragCoord)`: {message}"
                    ));
                } else {
                    messages.push(format!("wrapper line {}: {message}", line - start + 1));
                }
            }
            _ if line > offset => {
                messages.push(format!("line {}:{position}: {message}", line - offset));
            }
            _ => messages.push(format!("prelude line {line}: {message}")),
        }
    }
    if messages.is_empty() {
        messages.push("unknown GLSL parse error".to_string());
    }
    messages.join("\n")
}

fn describe_error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
