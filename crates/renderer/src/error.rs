use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::ShaderStage;

/// Upper bound on the info-log text carried by shader errors.
pub const MAX_LOG_LEN: usize = 16 * 1024;

/// A single compiler or linker finding, positioned in the offending source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line number; `0` when the finding has no source position.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn unpositioned(message: impl Into<String>) -> Self {
        Self {
            line: 0,
            column: 0,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "ERROR: {}", self.message)
        } else {
            write!(f, "ERROR: 0:{}:{}: {}", self.line, self.column, self.message)
        }
    }
}

/// Renders diagnostics into an info-log, quoting the source line each one
/// points at. The result never exceeds [`MAX_LOG_LEN`] bytes.
pub fn render_log(diagnostics: &[Diagnostic], source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut log = String::new();
    for diagnostic in diagnostics {
        log.push_str(&diagnostic.to_string());
        log.push('\n');
        if diagnostic.line > 0 {
            let index = diagnostic.line as usize - 1;
            if let Some(text) = lines.get(index) {
                // A finding on a line's first token is usually caused by the
                // statement before it, e.g. a missing `;`.
                if at_line_start(text, diagnostic.column) {
                    if let Some(previous) = lines[..index]
                        .iter()
                        .rev()
                        .find(|line| !line.trim().is_empty())
                    {
                        quote(&mut log, previous);
                    }
                }
                quote(&mut log, text);
            }
        }
    }
    truncate_log(log)
}

fn quote(log: &mut String, line: &str) {
    log.push_str("    ");
    log.push_str(line.trim_end());
    log.push('\n');
}

fn at_line_start(line: &str, column: u32) -> bool {
    line.chars()
        .take(column.saturating_sub(1) as usize)
        .all(char::is_whitespace)
}

fn truncate_log(mut log: String) -> String {
    if log.len() <= MAX_LOG_LEN {
        return log;
    }
    let mut cut = MAX_LOG_LEN;
    while !log.is_char_boundary(cut) {
        cut -= 1;
    }
    log.truncate(cut);
    log.push_str("\n[log truncated]");
    log
}

/// Window or rendering context could not be created.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to create event loop: {0}")]
    EventLoop(String),
    #[error("failed to create window: {0}")]
    Window(String),
    #[error("failed to create rendering surface: {0}")]
    Surface(String),
    #[error("no suitable GPU adapter for backend {backend}: {reason}")]
    Adapter { backend: String, reason: String },
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("GPU max texture dimension is {max}, requested surface is {width}x{height}")]
    SurfaceTooLarge { max: u32, width: u32, height: u32 },
}

/// A shader stage failed to compile.
#[derive(Debug, Error)]
#[error("failed to compile {stage} shader:\n{log}")]
pub struct CompileError {
    pub stage: ShaderStage,
    pub diagnostics: Vec<Diagnostic>,
    /// Info-log text rendered from `diagnostics`.
    pub log: String,
    /// Source text that was handed to the compiler.
    pub source_text: String,
}

impl CompileError {
    pub(crate) fn new(stage: ShaderStage, diagnostics: Vec<Diagnostic>, source: &str) -> Self {
        let log = render_log(&diagnostics, source);
        Self {
            stage,
            diagnostics,
            log,
            source_text: source.to_owned(),
        }
    }
}

/// Compiled stages could not be combined into a program.
#[derive(Debug, Error)]
#[error("failed to link shader program:\n{log}")]
pub struct LinkError {
    pub diagnostics: Vec<Diagnostic>,
    pub log: String,
}

impl LinkError {
    pub(crate) fn new(diagnostics: Vec<Diagnostic>) -> Self {
        let log = render_log(&diagnostics, "");
        Self { diagnostics, log }
    }

    pub(crate) fn single(message: impl Into<String>) -> Self {
        Self::new(vec![Diagnostic::unpositioned(message)])
    }
}

/// Vertex, index, or attribute data disagree with each other.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("vertex layout declares no attributes")]
    NoAttributes,
    #[error("attribute slot {slot} has {components} components; expected 1 to 4")]
    ComponentCount { slot: u32, components: u32 },
    #[error("attribute slot {slot} offset {offset} is not 4-byte aligned")]
    MisalignedOffset { slot: u32, offset: u64 },
    #[error("attribute slot {slot} at offset {offset} runs past the addressable range")]
    OffsetOverflow { slot: u32, offset: u64 },
    #[error("attribute slot {slot} is declared more than once")]
    DuplicateSlot { slot: u32 },
    #[error("attribute slots {first} and {second} overlap in the vertex stride")]
    OverlappingAttributes { first: u32, second: u32 },
    #[error("stride {stride} bytes is smaller than the attribute extent {extent} bytes")]
    StrideTooSmall { stride: u64, extent: u64 },
    #[error("stride {stride} bytes is not a multiple of 4")]
    MisalignedStride { stride: u64 },
    #[error("{floats} vertex floats do not divide into vertices of {per_vertex} floats")]
    RaggedVertices { floats: usize, per_vertex: usize },
    #[error("mesh has no vertices")]
    NoVertices,
    #[error("mesh has no indices")]
    NoIndices,
    #[error("{count} indices do not form whole triangles")]
    PartialTriangle { count: usize },
    #[error("index {value} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        position: usize,
        value: u32,
        vertex_count: usize,
    },
    #[error("GPU rejected mesh buffers: {0}")]
    Device(String),
}

/// Texture pixels could not be decoded or uploaded.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("texture dimensions must be positive, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} bytes; {width}x{height} RGBA8 needs {expected}")]
    ByteCount {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("texture {width}x{height} exceeds the device limit of {max}")]
    TooLarge { width: u32, height: u32, max: u32 },
    #[error("failed to decode image at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("textured scene needs an image but none was supplied")]
    MissingImage,
    #[error("GPU rejected texture upload: {0}")]
    Device(String),
}

/// GPU data could not be copied back to the CPU.
#[derive(Debug, Error)]
pub enum ReadbackError {
    #[error("failed to map staging buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
    #[error("staging buffer callback was dropped before completing")]
    Disconnected,
}

/// Everything that can stop the renderer from reaching or staying in its loop.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("surface out of memory")]
    SurfaceOutOfMemory,
    #[error("surface failed: {0}")]
    Surface(String),
    #[error("window event loop error: {0}")]
    EventLoop(String),
}
