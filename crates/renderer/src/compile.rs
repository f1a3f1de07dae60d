use std::borrow::Cow;

use wgpu::naga::{self, front::glsl, valid};

use crate::error::{CompileError, Diagnostic};
use crate::types::ShaderStage;

/// A shader stage that parsed, validated, and was accepted by the device.
///
/// Keeps the naga IR around so `link` can check the stage interface. Drop it
/// once the program is linked; the program holds no reference to it.
pub struct CompiledShader {
    stage: ShaderStage,
    module: wgpu::ShaderModule,
    ir: naga::Module,
}

impl CompiledShader {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub(crate) fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    pub(crate) fn ir(&self) -> &naga::Module {
        &self.ir
    }
}

impl std::fmt::Debug for CompiledShader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledShader")
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

/// Compiles GLSL for one stage.
///
/// Source is parsed and validated up front so failures carry positioned
/// diagnostics; the device then builds its own module inside a validation
/// error scope, and anything it rejects is reported the same way.
pub fn compile(
    device: &wgpu::Device,
    source: &str,
    stage: ShaderStage,
) -> Result<CompiledShader, CompileError> {
    let ir = parse_and_validate(source, stage)?;

    let label = format!("{stage} shader");
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage: stage.to_naga(),
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(CompileError::new(
            stage,
            vec![Diagnostic::unpositioned(error.to_string())],
            source,
        ));
    }

    tracing::debug!(%stage, "compiled shader");
    Ok(CompiledShader { stage, module, ir })
}

/// Front half of [`compile`]: GLSL to validated IR, no device required.
pub fn parse_and_validate(source: &str, stage: ShaderStage) -> Result<naga::Module, CompileError> {
    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(stage.to_naga()), source)
        .map_err(|errors| {
            let diagnostics = errors
                .errors
                .iter()
                .map(|error| positioned(error.meta, source, error.kind.to_string()))
                .collect();
            CompileError::new(stage, diagnostics, source)
        })?;

    let mut validator = valid::Validator::new(valid::ValidationFlags::all(), valid::Capabilities::all());
    validator.validate(&module).map_err(|error| {
        let message = error_chain(error.as_inner());
        let diagnostic = match error.spans().next() {
            Some((span, _)) => positioned(*span, source, message),
            None => Diagnostic::unpositioned(message),
        };
        CompileError::new(stage, vec![diagnostic], source)
    })?;

    if !module
        .entry_points
        .iter()
        .any(|entry| entry.stage == stage.to_naga())
    {
        return Err(CompileError::new(
            stage,
            vec![Diagnostic::unpositioned(format!("no {stage} entry point"))],
            source,
        ));
    }

    Ok(module)
}

fn positioned(span: naga::Span, source: &str, message: String) -> Diagnostic {
    if !span.is_defined() {
        return Diagnostic::unpositioned(message);
    }
    let location = span.location(source);
    Diagnostic {
        line: location.line_number,
        column: location.line_position,
        message,
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"#version 450
layout(location = 0) in vec3 a_position;

void main() {
    gl_Position = vec4(a_position, 1.0);
}
";

    const FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 frag_colour;

void main() {
    frag_colour = vec4(1.0, 0.5, 0.2, 1.0);
}
";

    #[test]
    fn valid_stages_parse() {
        let vertex = parse_and_validate(VERTEX, ShaderStage::Vertex).unwrap();
        assert_eq!(vertex.entry_points.len(), 1);
        let fragment = parse_and_validate(FRAGMENT, ShaderStage::Fragment).unwrap();
        assert_eq!(fragment.entry_points.len(), 1);
    }

    #[test]
    fn missing_semicolon_reports_stage_and_log() {
        let broken = VERTEX.replace("1.0);", "1.0)");
        let err = parse_and_validate(&broken, ShaderStage::Vertex).unwrap_err();
        assert_eq!(err.stage, ShaderStage::Vertex);
        assert!(!err.log.is_empty());
        assert!(!err.diagnostics.is_empty());
        assert_eq!(err.source_text, broken);
        assert!(
            err.log.contains("gl_Position = vec4(a_position, 1.0)"),
            "log was: {}",
            err.log
        );
        assert!(err.to_string().starts_with("failed to compile vertex shader"));
    }

    #[test]
    fn injected_token_appears_in_log() {
        let broken = FRAGMENT.replace(
            "frag_colour = vec4(1.0, 0.5, 0.2, 1.0);",
            "frag_colour = vec4(1.0, 0.5, 0.2, 1.0) * injected_bogus_token;",
        );
        let err = parse_and_validate(&broken, ShaderStage::Fragment).unwrap_err();
        assert_eq!(err.stage, ShaderStage::Fragment);
        assert!(err.log.contains("injected_bogus_token"), "log was: {}", err.log);
    }

    #[test]
    fn error_chain_joins_causes() {
        #[derive(Debug, thiserror::Error)]
        #[error("outer")]
        struct Outer(#[source] Inner);
        #[derive(Debug, thiserror::Error)]
        #[error("inner")]
        struct Inner;

        assert_eq!(error_chain(&Outer(Inner)), "outer: inner");
    }
}
