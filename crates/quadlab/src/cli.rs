use std::path::PathBuf;

use clap::Parser;
use renderer::{BackendChoice, FilterMode, SceneKind, VsyncMode, WrapMode};

#[derive(Parser, Debug)]
#[command(
    name = "quadlab",
    author,
    version,
    about = "Draws a quad through OpenGL shaders in a desktop window"
)]
pub struct Cli {
    /// Image to texture the quad with (PNG, JPEG, BMP or GIF).
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// Which quad to draw: `static`, `animated` or `textured`.
    /// Defaults to `textured` when IMAGE is given, otherwise `animated`.
    #[arg(long, value_name = "SCENE", value_parser = parse_scene, env = "QUADLAB_SCENE")]
    pub scene: Option<SceneKind>,

    /// Initial window size (e.g. `800x600`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Window title.
    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Graphics backend: `gl` (default) or `auto`.
    #[arg(long, value_name = "BACKEND", value_parser = parse_backend, env = "QUADLAB_BACKEND")]
    pub backend: Option<BackendChoice>,

    /// Wait for vertical blank between frames: `on` (default) or `off`.
    #[arg(long, value_name = "on|off", value_parser = parse_vsync)]
    pub vsync: Option<VsyncMode>,

    /// Texture wrapping outside [0, 1]: `repeat` (default) or `clamp`.
    #[arg(long, value_name = "MODE", value_parser = parse_wrap)]
    pub wrap: Option<WrapMode>,

    /// Texture filtering: `linear` (default) or `nearest`.
    #[arg(long, value_name = "MODE", value_parser = parse_filter)]
    pub filter: Option<FilterMode>,

    /// TOML file supplying any of the settings above; flags take precedence.
    #[arg(long, value_name = "FILE", env = "QUADLAB_CONFIG")]
    pub config: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn normalized(value: &str, what: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{what} must not be empty"));
    }
    Ok(trimmed.to_ascii_lowercase())
}

pub fn parse_scene(value: &str) -> Result<SceneKind, String> {
    match normalized(value, "scene")?.as_str() {
        "static" | "orange" => Ok(SceneKind::Static),
        "animated" | "pulse" => Ok(SceneKind::Animated),
        "textured" | "texture" => Ok(SceneKind::Textured),
        other => Err(format!(
            "unknown scene '{other}'; expected static, animated, or textured"
        )),
    }
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid window width".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid window height".to_string())?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_backend(value: &str) -> Result<BackendChoice, String> {
    match normalized(value, "backend")?.as_str() {
        "gl" | "opengl" | "gles" => Ok(BackendChoice::Gl),
        "auto" | "any" => Ok(BackendChoice::Auto),
        other => Err(format!("unknown backend '{other}'; expected gl or auto")),
    }
}

pub fn parse_vsync(value: &str) -> Result<VsyncMode, String> {
    match normalized(value, "vsync")?.as_str() {
        "on" | "true" | "1" | "fifo" => Ok(VsyncMode::On),
        "off" | "false" | "0" | "immediate" => Ok(VsyncMode::Off),
        other => Err(format!("unknown vsync mode '{other}'; expected on or off")),
    }
}

pub fn parse_wrap(value: &str) -> Result<WrapMode, String> {
    match normalized(value, "wrap mode")?.as_str() {
        "repeat" => Ok(WrapMode::Repeat),
        "clamp" | "clamp-to-edge" => Ok(WrapMode::Clamp),
        other => Err(format!("unknown wrap mode '{other}'; expected repeat or clamp")),
    }
}

pub fn parse_filter(value: &str) -> Result<FilterMode, String> {
    match normalized(value, "filter")?.as_str() {
        "linear" => Ok(FilterMode::Linear),
        "nearest" => Ok(FilterMode::Nearest),
        other => Err(format!("unknown filter '{other}'; expected linear or nearest")),
    }
}
