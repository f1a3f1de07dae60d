use crate::error::LayoutError;
use crate::geometry::{MeshData, VertexAttribute, VertexLayout};
use crate::types::SceneKind;

/// Shader pair plus mesh for one of the built-in variants.
#[derive(Debug, Clone)]
pub struct Scene {
    pub kind: SceneKind,
    pub vertex_source: &'static str,
    pub fragment_source: &'static str,
    pub mesh: MeshData,
}

impl Scene {
    pub fn builtin(kind: SceneKind) -> Result<Self, LayoutError> {
        let scene = match kind {
            SceneKind::Static => Self {
                kind,
                vertex_source: QUAD_VERTEX_GLSL,
                fragment_source: STATIC_FRAGMENT_GLSL,
                mesh: quad_mesh()?,
            },
            SceneKind::Animated => Self {
                kind,
                vertex_source: QUAD_VERTEX_GLSL,
                fragment_source: ANIMATED_FRAGMENT_GLSL,
                mesh: quad_mesh()?,
            },
            SceneKind::Textured => Self {
                kind,
                vertex_source: TEXTURED_VERTEX_GLSL,
                fragment_source: TEXTURED_FRAGMENT_GLSL,
                mesh: textured_quad_mesh()?,
            },
        };
        Ok(scene)
    }
}

/// Two triangles sharing the 1-3 diagonal.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

/// Corners in clockwise order from top right.
pub const QUAD_POSITIONS: [[f32; 3]; 4] = [
    [0.5, 0.5, 0.0],
    [0.5, -0.5, 0.0],
    [-0.5, -0.5, 0.0],
    [-0.5, 0.5, 0.0],
];

/// Texture coordinates per corner; `v` grows downward to match image rows.
const QUAD_TEX_COORDS: [[f32; 2]; 4] = [[1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]];

pub fn quad_mesh() -> Result<MeshData, LayoutError> {
    let layout = VertexLayout::packed(vec![VertexAttribute::new(0, 3, 0)])?;
    let vertices = QUAD_POSITIONS.iter().flatten().copied().collect();
    MeshData::new(vertices, QUAD_INDICES.to_vec(), layout)
}

pub fn textured_quad_mesh() -> Result<MeshData, LayoutError> {
    let layout = VertexLayout::packed(vec![
        VertexAttribute::new(0, 3, 0),
        VertexAttribute::new(1, 2, 12),
    ])?;
    let vertices = QUAD_POSITIONS
        .iter()
        .zip(QUAD_TEX_COORDS.iter())
        .flat_map(|(position, uv)| position.iter().chain(uv.iter()).copied())
        .collect();
    MeshData::new(vertices, QUAD_INDICES.to_vec(), layout)
}

const QUAD_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec3 a_position;

void main() {
    gl_Position = vec4(a_position, 1.0);
}
";

const STATIC_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) out vec4 frag_colour;

void main() {
    frag_colour = vec4(1.0, 0.5, 0.2, 1.0);
}
";

/// The block layout must match [`crate::gpu::ColorUniform`].
const ANIMATED_FRAGMENT_GLSL: &str = r"#version 450
layout(std140, set = 0, binding = 0) uniform ColorParams {
    vec4 our_color;
} params;

layout(location = 0) out vec4 frag_colour;

void main() {
    frag_colour = params.our_color;
}
";

const TEXTURED_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_tex_coord;

layout(location = 0) out vec2 v_tex_coord;

void main() {
    gl_Position = vec4(a_position, 1.0);
    v_tex_coord = a_tex_coord;
}
";

const TEXTURED_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_tex_coord;
layout(location = 0) out vec4 frag_colour;

layout(set = 1, binding = 0) uniform texture2D u_texture;
layout(set = 1, binding = 1) uniform sampler u_sampler;

void main() {
    frag_colour = texture(sampler2D(u_texture, u_sampler), v_tex_coord);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::parse_and_validate;
    use crate::types::ShaderStage;

    #[test]
    fn every_builtin_scene_compiles() {
        for kind in [SceneKind::Static, SceneKind::Animated, SceneKind::Textured] {
            let scene = Scene::builtin(kind).unwrap();
            parse_and_validate(scene.vertex_source, ShaderStage::Vertex)
                .unwrap_or_else(|err| panic!("{kind} vertex: {err}"));
            parse_and_validate(scene.fragment_source, ShaderStage::Fragment)
                .unwrap_or_else(|err| panic!("{kind} fragment: {err}"));
        }
    }

    #[test]
    fn quad_matches_reference_corners() {
        let mesh = quad_mesh().unwrap();
        assert_eq!(
            mesh.vertices(),
            &[0.5, 0.5, 0.0, 0.5, -0.5, 0.0, -0.5, -0.5, 0.0, -0.5, 0.5, 0.0]
        );
        assert_eq!(mesh.indices(), &[0, 1, 3, 1, 2, 3]);
    }

    #[test]
    fn textured_quad_interleaves_uvs() {
        let mesh = textured_quad_mesh().unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.layout().stride(), 20);
        assert_eq!(&mesh.vertices()[..5], &[0.5, 0.5, 0.0, 1.0, 0.0]);
        assert_eq!(&mesh.vertices()[15..], &[-0.5, 0.5, 0.0, 0.0, 0.0]);
    }
}
