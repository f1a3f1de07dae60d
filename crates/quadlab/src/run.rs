use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use renderer::{decode_image, Renderer, RendererConfig, SamplerOptions, SceneKind};
use tracing_subscriber::EnvFilter;

use crate::cli::{self, Cli};
use crate::config::FileConfig;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let (mut config, image_path) = resolve(&cli, &file)?;
    tracing::debug!(?config, image = ?image_path, "resolved settings");

    if let Some(path) = image_path {
        if config.scene == SceneKind::Textured {
            let image = decode_image(&path)
                .with_context(|| format!("failed to load texture image {}", path.display()))?;
            config.image = Some(image);
        } else {
            tracing::warn!(
                path = %path.display(),
                scene = %config.scene,
                "image ignored by the selected scene"
            );
        }
    }

    Renderer::new(config).run().context("renderer stopped with an error")
}

/// Merges CLI flags over the config file over the built-in defaults.
pub fn resolve(cli: &Cli, file: &FileConfig) -> Result<(RendererConfig, Option<PathBuf>)> {
    let defaults = RendererConfig::default();

    let image = cli.image.clone().or_else(|| file.image.clone());

    let scene = match cli.scene {
        Some(scene) => scene,
        None => match file.scene.as_deref() {
            Some(value) => from_file(value, "scene", cli::parse_scene)?,
            None if image.is_some() => SceneKind::Textured,
            None => SceneKind::Animated,
        },
    };
    if scene == SceneKind::Textured && image.is_none() {
        bail!("the textured scene needs an IMAGE path");
    }

    let surface_size = match cli.size {
        Some(size) => size,
        None => optional(file.size.as_deref(), "size", cli::parse_size)?
            .unwrap_or(defaults.surface_size),
    };
    let backend = match cli.backend {
        Some(backend) => backend,
        None => optional(file.backend.as_deref(), "backend", cli::parse_backend)?
            .unwrap_or(defaults.backend),
    };
    let vsync = match cli.vsync {
        Some(vsync) => vsync,
        None => optional(file.vsync.as_deref(), "vsync", cli::parse_vsync)?
            .unwrap_or(defaults.vsync),
    };
    let wrap = match cli.wrap {
        Some(wrap) => wrap,
        None => optional(file.wrap.as_deref(), "wrap", cli::parse_wrap)?.unwrap_or_default(),
    };
    let filter = match cli.filter {
        Some(filter) => filter,
        None => optional(file.filter.as_deref(), "filter", cli::parse_filter)?.unwrap_or_default(),
    };

    let config = RendererConfig {
        surface_size,
        title: cli
            .title
            .clone()
            .or_else(|| file.title.clone())
            .unwrap_or(defaults.title),
        backend,
        vsync,
        scene,
        image: None,
        sampler: SamplerOptions { wrap, filter },
        clear_color: file.clear_color.unwrap_or(defaults.clear_color),
    };
    Ok((config, image))
}

fn from_file<T>(value: &str, key: &str, parse: fn(&str) -> Result<T, String>) -> Result<T> {
    parse(value).map_err(|err| anyhow::anyhow!("invalid `{key}` in config file: {err}"))
}

fn optional<T>(
    value: Option<&str>,
    key: &str,
    parse: fn(&str) -> Result<T, String>,
) -> Result<Option<T>> {
    value.map(|value| from_file(value, key, parse)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use renderer::{BackendChoice, WrapMode};

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["quadlab"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn scene_defaults_follow_image_presence() {
        let (config, image) = resolve(&cli(&[]), &FileConfig::default()).unwrap();
        assert_eq!(config.scene, SceneKind::Animated);
        assert_eq!(image, None);

        let (config, image) = resolve(&cli(&["wall.png"]), &FileConfig::default()).unwrap();
        assert_eq!(config.scene, SceneKind::Textured);
        assert_eq!(image, Some(PathBuf::from("wall.png")));
    }

    #[test]
    fn textured_without_image_is_rejected() {
        let err = resolve(&cli(&["--scene", "textured"]), &FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("IMAGE"));
    }

    #[test]
    fn flags_override_file_values() {
        let file = FileConfig {
            size: Some("320x240".into()),
            wrap: Some("clamp".into()),
            backend: Some("auto".into()),
            title: Some("from file".into()),
            ..FileConfig::default()
        };
        let (config, _) = resolve(&cli(&["--size", "1024x768", "--scene", "static"]), &file).unwrap();
        assert_eq!(config.surface_size, (1024, 768));
        assert_eq!(config.sampler.wrap, WrapMode::Clamp);
        assert_eq!(config.backend, BackendChoice::Auto);
        assert_eq!(config.title, "from file");
    }

    #[test]
    fn invalid_file_value_names_the_key() {
        let file = FileConfig {
            vsync: Some("sometimes".into()),
            ..FileConfig::default()
        };
        let err = resolve(&cli(&["--scene", "static"]), &file).unwrap_err();
        assert!(err.to_string().contains("`vsync`"));
    }
}
