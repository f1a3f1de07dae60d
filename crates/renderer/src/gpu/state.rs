use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};
use winit::dpi::PhysicalSize;

use crate::compile::compile;
use crate::error::{RenderError, UploadError};
use crate::runtime::FramePlan;
use crate::scene::Scene;
use crate::types::{RendererConfig, ShaderStage};

use super::context::GpuContext;
use super::mesh::Mesh;
use super::pipeline::{link, PipelineTarget, Program};
use super::texture::Texture;
use super::uniforms::UniformBlock;

/// Every GPU object the window needs, in reverse order of acquisition.
///
/// Fields drop top to bottom, so bind groups and the texture go first and
/// the device and surface go last.
pub(crate) struct GpuState {
    texture_bind_group: Option<wgpu::BindGroup>,
    texture: Option<Texture>,
    uniforms: UniformBlock,
    mesh: Mesh,
    program: Program,
    context: GpuContext,
    clear_color: wgpu::Color,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        size: PhysicalSize<u32>,
        config: &RendererConfig,
        scene: &Scene,
    ) -> Result<Self, RenderError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, config.backend, config.vsync)?;
        let device = &context.device;

        let vertex = compile(device, scene.vertex_source, ShaderStage::Vertex)?;
        let fragment = compile(device, scene.fragment_source, ShaderStage::Fragment)?;
        let program = link(
            device,
            &vertex,
            &fragment,
            &PipelineTarget {
                format: context.format(),
                layout: scene.mesh.layout(),
                wireframe: context.wireframe,
            },
        )?;
        // Stages are not needed once the pipelines exist.
        drop(vertex);
        drop(fragment);

        let mesh = Mesh::upload(device, &scene.mesh, context.wireframe)?;
        let uniforms = UniformBlock::new(device, program.uniform_layout());

        let (texture, texture_bind_group) = match program.texture_layout() {
            Some(layout) => {
                let image = config.image.as_ref().ok_or(UploadError::MissingImage)?;
                let texture = Texture::load(
                    device,
                    &context.queue,
                    &image.pixels,
                    image.width,
                    image.height,
                    config.sampler,
                )?;
                let bind_group = texture.bind_group(device, layout);
                (Some(texture), Some(bind_group))
            }
            None => (None, None),
        };

        let [r, g, b, a] = config.clear_color;
        info!(
            scene = %scene.kind,
            texture = ?texture.as_ref().map(Texture::size),
            wireframe = ?context.wireframe,
            "renderer ready"
        );

        Ok(Self {
            texture_bind_group,
            texture,
            uniforms,
            mesh,
            program,
            context,
            clear_color: wgpu::Color { r, g, b, a },
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    /// Clears, draws the mesh with the planned fill mode, and presents.
    pub(crate) fn render(&mut self, plan: &FramePlan) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if self.program.interface().uses_color_uniform {
            self.uniforms.set(&self.context.queue, plan.color);
        }

        let draw = self.mesh.draw_call(plan.fill_mode);
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(self.program.pipeline(plan.fill_mode));
            pass.set_bind_group(0, self.uniforms.bind_group(), &[]);
            if let Some(bind_group) = &self.texture_bind_group {
                pass.set_bind_group(1, bind_group, &[]);
            }
            pass.set_vertex_buffer(0, self.mesh.vertex_buffer().slice(..));
            pass.set_index_buffer(
                self.mesh.index_buffer(draw.list).slice(..),
                wgpu::IndexFormat::Uint32,
            );
            pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl Drop for GpuState {
    fn drop(&mut self) {
        debug!(
            texture = self.texture.is_some(),
            indices = self.mesh.index_count(),
            "releasing GPU resources"
        );
    }
}
