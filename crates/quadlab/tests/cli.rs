use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn quadlab(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quadlab"))
        .args(args)
        .env_remove("QUADLAB_SCENE")
        .env_remove("QUADLAB_BACKEND")
        .env_remove("QUADLAB_CONFIG")
        .env("RUST_LOG", "error")
        .output()
        .expect("failed to run quadlab binary")
}

#[test]
fn help_lists_scene_flag() {
    let output = quadlab(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--scene"));
    assert!(stdout.contains("IMAGE"));
}

#[test]
fn missing_image_fails_before_window() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("container.jpg");
    let output = quadlab(&[missing.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load texture image"));
}

#[test]
fn undecodable_image_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.png");
    fs::write(&path, b"not a png").unwrap();
    let output = quadlab(&[path.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn textured_scene_requires_image() {
    let output = quadlab(&["--scene", "textured"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("IMAGE"));
}

#[test]
fn rejects_unknown_scene() {
    let output = quadlab(&["--scene", "cube"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown scene"));
}

#[test]
fn malformed_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quadlab.toml");
    fs::write(&path, "size = [800, 600\n").unwrap();
    let output = quadlab(&["--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse config file"));
}
