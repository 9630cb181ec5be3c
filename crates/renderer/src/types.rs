use std::fmt;

/// Physical pixel dimensions of a drawable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimised windows, unsized canvases).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Graphics API generations a surface may be asked for, most capable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextApi {
    /// Vulkan, Metal or DX12.
    Modern,
    /// OpenGL / GLES.
    Legacy,
}

impl ContextApi {
    /// Order in which a renderer core tries to acquire a context.
    pub const PREFERENCE: [ContextApi; 2] = [ContextApi::Modern, ContextApi::Legacy];
}

impl fmt::Display for ContextApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextApi::Modern => f.write_str("modern"),
            ContextApi::Legacy => f.write_str("legacy"),
        }
    }
}

/// User restriction on which API generations may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiPreference {
    /// Try modern first, fall back to legacy.
    #[default]
    Auto,
    /// Only accept a modern context.
    Modern,
    /// Only accept a legacy context.
    Legacy,
}

impl ApiPreference {
    pub fn allows(self, api: ContextApi) -> bool {
        match self {
            ApiPreference::Auto => true,
            ApiPreference::Modern => api == ContextApi::Modern,
            ApiPreference::Legacy => api == ContextApi::Legacy,
        }
    }
}

/// GPU adapter power preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Pipeline stage a piece of GLSL is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            StageKind::Vertex => "shaderlens vertex",
            StageKind::Fragment => "shaderlens fragment",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Per-draw values exposed to the shader as `iResolution` and `iTime`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
}

impl FrameUniforms {
    pub fn new(size: PixelSize, time: f32) -> Self {
        Self {
            resolution: [size.width as f32, size.height as f32],
            time,
        }
    }
}
