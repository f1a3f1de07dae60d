use std::fmt;

use crate::decode::DecodedImage;

/// Pipeline step a shader source targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn to_naga(self) -> wgpu::naga::ShaderStage {
        match self {
            ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
            ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Rasterizer polygon mode toggled from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    #[default]
    Fill,
    Wireframe,
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillMode::Fill => f.write_str("fill"),
            FillMode::Wireframe => f.write_str("wireframe"),
        }
    }
}

/// How wireframe mode is realised on the current device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireframeStrategy {
    /// Same triangle indices, rasterized with `PolygonMode::Line`.
    PolygonLine,
    /// Triangle edges expanded into a separate line-list index buffer, for
    /// devices without `POLYGON_MODE_LINE` (GLES, WebGL).
    EdgeList,
}

impl WireframeStrategy {
    pub(crate) fn for_features(features: wgpu::Features) -> Self {
        if features.contains(wgpu::Features::POLYGON_MODE_LINE) {
            WireframeStrategy::PolygonLine
        } else {
            WireframeStrategy::EdgeList
        }
    }
}

/// Texture coordinate addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    Clamp,
}

impl WrapMode {
    pub(crate) fn address_mode(self) -> wgpu::AddressMode {
        match self {
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
            WrapMode::Clamp => wgpu::AddressMode::ClampToEdge,
        }
    }
}

/// Texel filtering for magnification, minification and mip selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Linear,
    Nearest,
}

impl FilterMode {
    pub(crate) fn filter_mode(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Linear => wgpu::FilterMode::Linear,
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
        }
    }
}

/// Graphics API the context is created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// OpenGL / OpenGL ES through EGL or WGL.
    #[default]
    Gl,
    /// Whatever primary backend the platform offers; used when no GL driver
    /// is installed.
    Auto,
}

impl BackendChoice {
    pub(crate) fn backends(self) -> wgpu::Backends {
        match self {
            BackendChoice::Gl => wgpu::Backends::GL,
            BackendChoice::Auto => wgpu::Backends::all(),
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendChoice::Gl => f.write_str("gl"),
            BackendChoice::Auto => f.write_str("auto"),
        }
    }
}

/// Presentation pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VsyncMode {
    /// Wait for vertical blank (FIFO).
    #[default]
    On,
    /// Present as soon as a frame is ready when the surface allows it.
    Off,
}

/// Which built-in variant to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SceneKind {
    /// Constant fill color.
    Static,
    /// Green channel driven by the oscillating color uniform.
    #[default]
    Animated,
    /// Quad sampling the loaded image.
    Textured,
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneKind::Static => f.write_str("static"),
            SceneKind::Animated => f.write_str("animated"),
            SceneKind::Textured => f.write_str("textured"),
        }
    }
}

/// Sampler configuration applied when the texture is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerOptions {
    pub wrap: WrapMode,
    pub filter: FilterMode,
}

/// Immutable configuration passed to the renderer at start-up.
///
/// Mirrors CLI flags and the optional config file. The decoded image is
/// carried here so decode failures surface before any window exists.
#[derive(Clone)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    pub title: String,
    pub backend: BackendChoice,
    pub vsync: VsyncMode,
    pub scene: SceneKind,
    /// Pixels for the textured scene.
    pub image: Option<DecodedImage>,
    pub sampler: SamplerOptions,
    /// Background color the color buffer is cleared to every frame.
    pub clear_color: [f64; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (800, 600),
            title: "quadlab".to_string(),
            backend: BackendChoice::default(),
            vsync: VsyncMode::default(),
            scene: SceneKind::default(),
            image: None,
            sampler: SamplerOptions::default(),
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

impl fmt::Debug for RendererConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererConfig")
            .field("surface_size", &self.surface_size)
            .field("title", &self.title)
            .field("backend", &self.backend)
            .field("vsync", &self.vsync)
            .field("scene", &self.scene)
            .field(
                "image",
                &self.image.as_ref().map(|image| (image.width, image.height)),
            )
            .field("sampler", &self.sampler)
            .field("clear_color", &self.clear_color)
            .finish()
    }
}

/// Dark teal background.
pub const DEFAULT_CLEAR_COLOR: [f64; 4] = [0.2, 0.3, 0.3, 1.0];
