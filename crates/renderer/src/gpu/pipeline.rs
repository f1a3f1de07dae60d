use wgpu::naga;

use crate::compile::CompiledShader;
use crate::error::{Diagnostic, LinkError};
use crate::geometry::VertexLayout;
use crate::types::{FillMode, ShaderStage, WireframeStrategy};

/// Bind group holding the color uniform block.
pub(crate) const UNIFORM_GROUP: u32 = 0;
pub(crate) const UNIFORM_BINDING: u32 = 0;
/// Bind group holding the sampled texture and its sampler.
pub(crate) const TEXTURE_GROUP: u32 = 1;
pub(crate) const TEXTURE_BINDING: u32 = 0;
pub(crate) const SAMPLER_BINDING: u32 = 1;

/// What the linked stages consume, as reflected from their IR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    /// `(location, components)` for every vertex stage input.
    pub vertex_inputs: Vec<(u32, u32)>,
    /// Locations passed from the vertex to the fragment stage.
    pub varyings: Vec<u32>,
    pub uses_color_uniform: bool,
    pub uses_texture: bool,
}

/// Output format and vertex feed the program is linked against.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTarget<'a> {
    pub format: wgpu::TextureFormat,
    pub layout: &'a VertexLayout,
    pub wireframe: WireframeStrategy,
}

/// A linked vertex/fragment pair with one pipeline per fill mode.
pub struct Program {
    fill: wgpu::RenderPipeline,
    wireframe: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: Option<wgpu::BindGroupLayout>,
    interface: ProgramInterface,
}

impl Program {
    pub fn pipeline(&self, mode: FillMode) -> &wgpu::RenderPipeline {
        match mode {
            FillMode::Fill => &self.fill,
            FillMode::Wireframe => &self.wireframe,
        }
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    pub(crate) fn uniform_layout(&self) -> &wgpu::BindGroupLayout {
        &self.uniform_layout
    }

    pub(crate) fn texture_layout(&self) -> Option<&wgpu::BindGroupLayout> {
        self.texture_layout.as_ref()
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

/// Links a vertex and a fragment shader into render pipelines.
///
/// The stage interface is checked against the reflected IR first, so a
/// mismatch names the offending location. Pipeline creation then runs in a
/// validation error scope and any device complaint becomes a [`LinkError`].
pub fn link(
    device: &wgpu::Device,
    vertex: &CompiledShader,
    fragment: &CompiledShader,
    target: &PipelineTarget<'_>,
) -> Result<Program, LinkError> {
    for (shader, expected) in [(vertex, ShaderStage::Vertex), (fragment, ShaderStage::Fragment)] {
        if shader.stage() != expected {
            return Err(LinkError::single(format!(
                "expected a {expected} shader, got a {} shader",
                shader.stage()
            )));
        }
    }

    let interface = check_interface(vertex.ir(), fragment.ir(), target.layout)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("color uniform layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: UNIFORM_BINDING,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });
    let texture_layout = interface.uses_texture.then(|| {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture layout"),
            entries: &texture_layout_entries(),
        })
    });

    let mut bind_group_layouts = vec![&uniform_layout];
    bind_group_layouts.extend(texture_layout.as_ref());
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("program layout"),
        bind_group_layouts: &bind_group_layouts,
        push_constant_ranges: &[],
    });

    let attributes = target.layout.wgpu_attributes();
    let build = |label: &str, topology: wgpu::PrimitiveTopology, polygon_mode: wgpu::PolygonMode| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex.module(),
                entry_point: Some("main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: target.layout.stride(),
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: fragment.module(),
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        })
    };

    let fill = build(
        "fill pipeline",
        wgpu::PrimitiveTopology::TriangleList,
        wgpu::PolygonMode::Fill,
    );
    let wireframe = match target.wireframe {
        WireframeStrategy::PolygonLine => build(
            "wireframe pipeline",
            wgpu::PrimitiveTopology::TriangleList,
            wgpu::PolygonMode::Line,
        ),
        WireframeStrategy::EdgeList => build(
            "wireframe pipeline",
            wgpu::PrimitiveTopology::LineList,
            wgpu::PolygonMode::Fill,
        ),
    };

    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(LinkError::single(error.to_string()));
    }

    tracing::debug!(
        inputs = interface.vertex_inputs.len(),
        varyings = interface.varyings.len(),
        uniform = interface.uses_color_uniform,
        texture = interface.uses_texture,
        wireframe = ?target.wireframe,
        "linked shader program"
    );

    Ok(Program {
        fill,
        wireframe,
        uniform_layout,
        texture_layout,
        interface,
    })
}

fn texture_layout_entries() -> [wgpu::BindGroupLayoutEntry; 2] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: TEXTURE_BINDING,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: SAMPLER_BINDING,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ]
}

/// Checks that the two stages and the vertex layout agree with each other.
///
/// Every vertex input must be fed by the layout with the same component
/// count, every fragment input must be written by the vertex stage with the
/// same type, and resources may only sit at the bindings the renderer fills.
pub fn check_interface(
    vertex: &naga::Module,
    fragment: &naga::Module,
    layout: &VertexLayout,
) -> Result<ProgramInterface, LinkError> {
    let mut diagnostics = Vec::new();

    let vertex_entry = entry_point(vertex, naga::ShaderStage::Vertex)?;
    let fragment_entry = entry_point(fragment, naga::ShaderStage::Fragment)?;

    let vertex_inputs = stage_inputs(vertex, vertex_entry);
    let vertex_outputs = stage_outputs(vertex, vertex_entry);
    let fragment_inputs = stage_inputs(fragment, fragment_entry);

    let mut interface = ProgramInterface::default();

    for (location, inner) in &vertex_inputs {
        let expected = components(inner);
        match layout.components_at(*location) {
            None => diagnostics.push(Diagnostic::unpositioned(format!(
                "vertex input at location {location} is not fed by the vertex layout"
            ))),
            Some(provided) if Some(provided) != expected => {
                diagnostics.push(Diagnostic::unpositioned(format!(
                    "vertex input at location {location} expects {} components, layout provides {provided}",
                    expected.map_or_else(|| "non-float".to_string(), |n| n.to_string()),
                )))
            }
            Some(provided) => interface.vertex_inputs.push((*location, provided)),
        }
    }

    for (location, inner) in &fragment_inputs {
        match vertex_outputs.iter().find(|(out, _)| out == location) {
            None => diagnostics.push(Diagnostic::unpositioned(format!(
                "fragment input at location {location} is not written by the vertex shader"
            ))),
            Some((_, written)) if written != inner => {
                diagnostics.push(Diagnostic::unpositioned(format!(
                    "fragment input at location {location} has type {}, vertex output has type {}",
                    type_name(inner),
                    type_name(written),
                )))
            }
            Some(_) => interface.varyings.push(*location),
        }
    }

    let mut has_image = false;
    let mut has_sampler = false;
    for module in [vertex, fragment] {
        for (_, global) in module.global_variables.iter() {
            let Some(binding) = &global.binding else {
                continue;
            };
            let place = (binding.group, binding.binding);
            match (global.space, &module.types[global.ty].inner) {
                (naga::AddressSpace::Uniform, _) if place == (UNIFORM_GROUP, UNIFORM_BINDING) => {
                    interface.uses_color_uniform = true;
                }
                (naga::AddressSpace::Handle, naga::TypeInner::Image { .. })
                    if place == (TEXTURE_GROUP, TEXTURE_BINDING) =>
                {
                    has_image = true;
                }
                (naga::AddressSpace::Handle, naga::TypeInner::Sampler { comparison: false })
                    if place == (TEXTURE_GROUP, SAMPLER_BINDING) =>
                {
                    has_sampler = true;
                }
                _ => diagnostics.push(Diagnostic::unpositioned(format!(
                    "resource {} at set {} binding {} is not provided by the renderer",
                    global.name.as_deref().unwrap_or("<unnamed>"),
                    binding.group,
                    binding.binding,
                ))),
            }
        }
    }
    if has_image != has_sampler {
        diagnostics.push(Diagnostic::unpositioned(
            "texture and sampler must be declared together",
        ));
    }
    interface.uses_texture = has_image && has_sampler;

    if diagnostics.is_empty() {
        Ok(interface)
    } else {
        Err(LinkError::new(diagnostics))
    }
}

fn entry_point(
    module: &naga::Module,
    stage: naga::ShaderStage,
) -> Result<&naga::Function, LinkError> {
    module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage)
        .map(|entry| &entry.function)
        .ok_or_else(|| LinkError::single(format!("no {stage:?} entry point to link")))
}

fn stage_inputs(module: &naga::Module, function: &naga::Function) -> Vec<(u32, naga::TypeInner)> {
    let mut inputs = Vec::new();
    for argument in &function.arguments {
        collect_locations(module, argument.ty, argument.binding.as_ref(), &mut inputs);
    }
    inputs.sort_by_key(|(location, _)| *location);
    inputs
}

fn stage_outputs(module: &naga::Module, function: &naga::Function) -> Vec<(u32, naga::TypeInner)> {
    let mut outputs = Vec::new();
    if let Some(result) = &function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut outputs);
    }
    outputs
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<(u32, naga::TypeInner)>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.push((*location, module.types[ty].inner.clone()));
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn components(inner: &naga::TypeInner) -> Option<u32> {
    match inner {
        naga::TypeInner::Scalar(scalar) if scalar.kind == naga::ScalarKind::Float => Some(1),
        naga::TypeInner::Vector { size, scalar } if scalar.kind == naga::ScalarKind::Float => {
            Some(*size as u32)
        }
        _ => None,
    }
}

fn type_name(inner: &naga::TypeInner) -> String {
    match inner {
        naga::TypeInner::Scalar(scalar) => format!("{:?}{}", scalar.kind, scalar.width * 8),
        naga::TypeInner::Vector { size, scalar } => {
            format!("vec{}<{:?}{}>", *size as u32, scalar.kind, scalar.width * 8)
        }
        other => format!("{other:?}"),
    }
}
