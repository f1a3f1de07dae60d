//! Windowed quad renderer over wgpu's OpenGL backend.
//!
//! The crate opens one window, compiles a GLSL vertex/fragment pair, uploads
//! a quad mesh (and optionally a texture) and redraws it every frame until
//! the window is closed. The flow is:
//!
//! ```text
//!   quadlab CLI
//!        │ RendererConfig
//!        ▼
//!   Renderer::run ──▶ Scene::builtin ──▶ run_window ──▶ winit event loop
//!                                             │
//!                      RenderContext::begin_frame ──▶ GpuState::render
//! ```
//!
//! Everything that can be checked without a GPU lives outside `gpu`:
//! shader parsing in [`compile`], mesh validation in [`geometry`], image
//! decoding in [`decode`] and the per-frame input/clock logic in [`runtime`].
//! GPU objects are owned by a single state struct and released in reverse
//! order of creation when the loop ends.

pub mod compile;
pub mod decode;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod runtime;
pub mod scene;
pub mod types;
mod window;

pub use compile::{compile, parse_and_validate, CompiledShader};
pub use decode::{decode_image, DecodedImage};
pub use error::{
    BootstrapError, CompileError, Diagnostic, LayoutError, LinkError, ReadbackError, RenderError,
    UploadError,
};
pub use geometry::{MeshData, VertexAttribute, VertexLayout};
pub use gpu::{link, ColorUniform, DrawCall, Mesh, PipelineTarget, Program, Texture};
pub use runtime::{
    ControlKey, FixedTimeSource, FramePlan, LoopState, RenderContext, SystemTimeSource, TimeSource,
};
pub use scene::Scene;
pub use types::{
    BackendChoice, FillMode, FilterMode, RendererConfig, SamplerOptions, SceneKind, ShaderStage,
    VsyncMode, WireframeStrategy, WrapMode,
};

/// Entry point that owns the configuration for one run.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the window and renders until it is closed.
    ///
    /// Fails before any window exists when the textured scene has no image.
    /// Must be called on the main thread.
    pub fn run(&self) -> Result<(), RenderError> {
        if self.config.scene == SceneKind::Textured && self.config.image.is_none() {
            return Err(UploadError::MissingImage.into());
        }
        let scene = Scene::builtin(self.config.scene)?;
        tracing::info!(
            scene = %self.config.scene,
            backend = %self.config.backend,
            width = self.config.surface_size.0,
            height = self.config.surface_size.1,
            "starting renderer"
        );
        window::run_window(&self.config, &scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textured_scene_without_image_fails_before_windowing() {
        let renderer = Renderer::new(RendererConfig {
            scene: SceneKind::Textured,
            ..RendererConfig::default()
        });
        let err = renderer.run().unwrap_err();
        assert!(matches!(err, RenderError::Upload(UploadError::MissingImage)));
    }

    #[test]
    fn defaults_match_reference_window() {
        let config = RendererConfig::default();
        assert_eq!(config.surface_size, (800, 600));
        assert_eq!(config.clear_color, [0.2, 0.3, 0.3, 1.0]);
        assert_eq!(config.backend, BackendChoice::Gl);
        assert_eq!(config.scene, SceneKind::Animated);
    }
}
