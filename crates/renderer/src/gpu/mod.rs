//! wgpu side of the renderer.
//!
//! - `context` creates the instance, device and surface for a window.
//! - `pipeline` links compiled stages into fill and wireframe pipelines.
//! - `mesh` and `texture` own immutable GPU buffers and images.
//! - `uniforms` holds the pulsing color block.
//! - `state` ties them together for the window loop.

mod context;
mod mesh;
mod pipeline;
mod readback;
mod state;
mod texture;
mod uniforms;

pub use mesh::{DrawCall, IndexList, Mesh};
pub use pipeline::{check_interface, link, PipelineTarget, Program, ProgramInterface};
pub use texture::{mip_chain, MipLevel, Texture};
pub use uniforms::{oscillate, ColorUniform};

pub(crate) use state::GpuState;

#[cfg(test)]
pub(crate) mod testing {
    use crate::types::WireframeStrategy;

    pub(crate) struct HeadlessGpu {
        pub device: wgpu::Device,
        pub queue: wgpu::Queue,
        pub wireframe: WireframeStrategy,
    }

    /// Device without a surface, or `None` on machines with no adapter.
    pub(crate) fn headless() -> Option<HeadlessGpu> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok()?;
        let wireframe = WireframeStrategy::for_features(adapter.features());
        let required_features = match wireframe {
            WireframeStrategy::PolygonLine => wgpu::Features::POLYGON_MODE_LINE,
            WireframeStrategy::EdgeList => wgpu::Features::empty(),
        };
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("test device"),
            required_features,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .ok()?;
        Some(HeadlessGpu {
            device,
            queue,
            wireframe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::uniforms::UniformBlock;
    use crate::compile::compile;
    use crate::scene::Scene;
    use crate::types::{FillMode, SceneKind, ShaderStage};

    fn draw_offscreen(
        gpu: &testing::HeadlessGpu,
        program: &Program,
        mesh: &Mesh,
        uniforms: &UniformBlock,
        mode: FillMode,
    ) {
        let target = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: 64,
                height: 64,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let draw = mesh.draw_call(mode);
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("offscreen pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(program.pipeline(mode));
            pass.set_bind_group(0, uniforms.bind_group(), &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer().slice(..));
            pass.set_index_buffer(
                mesh.index_buffer(draw.list).slice(..),
                wgpu::IndexFormat::Uint32,
            );
            pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }
        gpu.queue.submit(Some(encoder.finish()));
    }

    #[test]
    fn builtin_scenes_compile_and_link_on_device() {
        let Some(gpu) = testing::headless() else {
            return;
        };
        for kind in [SceneKind::Static, SceneKind::Animated, SceneKind::Textured] {
            let scene = Scene::builtin(kind).unwrap();
            let vertex = compile(&gpu.device, scene.vertex_source, ShaderStage::Vertex).unwrap();
            let fragment =
                compile(&gpu.device, scene.fragment_source, ShaderStage::Fragment).unwrap();
            let program = link(
                &gpu.device,
                &vertex,
                &fragment,
                &PipelineTarget {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    layout: scene.mesh.layout(),
                    wireframe: gpu.wireframe,
                },
            )
            .unwrap_or_else(|err| panic!("{kind}: {err}"));
            assert_eq!(program.interface().uses_texture, kind == SceneKind::Textured);
        }
    }

    #[test]
    fn drawing_in_both_fill_modes_leaves_mesh_buffers_intact() {
        let Some(gpu) = testing::headless() else {
            return;
        };
        let scene = Scene::builtin(SceneKind::Static).unwrap();
        let vertex = compile(&gpu.device, scene.vertex_source, ShaderStage::Vertex).unwrap();
        let fragment = compile(&gpu.device, scene.fragment_source, ShaderStage::Fragment).unwrap();
        let program = link(
            &gpu.device,
            &vertex,
            &fragment,
            &PipelineTarget {
                format: wgpu::TextureFormat::Rgba8Unorm,
                layout: scene.mesh.layout(),
                wireframe: gpu.wireframe,
            },
        )
        .unwrap();
        let mesh = Mesh::upload(&gpu.device, &scene.mesh, gpu.wireframe).unwrap();
        let uniforms = UniformBlock::new(&gpu.device, program.uniform_layout());

        for mode in [FillMode::Fill, FillMode::Wireframe, FillMode::Fill] {
            draw_offscreen(&gpu, &program, &mesh, &uniforms, mode);
        }

        let (vertices, indices) = mesh.read_back(&gpu.device, &gpu.queue).unwrap();
        assert_eq!(vertices, scene.mesh.vertices());
        assert_eq!(indices, scene.mesh.indices());
        assert_eq!(indices, [0, 1, 3, 1, 2, 3]);
    }

    #[test]
    fn swapped_stages_fail_to_link() {
        let Some(gpu) = testing::headless() else {
            return;
        };
        let scene = Scene::builtin(SceneKind::Static).unwrap();
        let vertex = compile(&gpu.device, scene.vertex_source, ShaderStage::Vertex).unwrap();
        let fragment = compile(&gpu.device, scene.fragment_source, ShaderStage::Fragment).unwrap();
        let err = link(
            &gpu.device,
            &fragment,
            &vertex,
            &PipelineTarget {
                format: wgpu::TextureFormat::Rgba8Unorm,
                layout: scene.mesh.layout(),
                wireframe: gpu.wireframe,
            },
        )
        .unwrap_err();
        assert!(err.log.contains("expected a vertex shader"), "log was: {}", err.log);
    }

    #[test]
    fn broken_source_fails_before_reaching_device() {
        let Some(gpu) = testing::headless() else {
            return;
        };
        let broken = "#version 450\nvoid main() { gl_Position = vec4(0.0) }\n";
        let err = compile(&gpu.device, broken, ShaderStage::Vertex).unwrap_err();
        assert_eq!(err.stage, ShaderStage::Vertex);
        assert!(!err.log.is_empty());
    }
}
