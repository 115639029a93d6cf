use anyhow::{Context, Result};
use meanface_vision::align::EyeAnchors;
use meanface_vision::{CanvasSize, PipelineOptions};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<&'static Path> =
    Lazy::new(|| Path::new(option_env!("MEANFACE_CONFIG_PATH").unwrap_or("meanface.toml")));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output canvas width in pixels.
    pub width: u32,
    /// Output canvas height in pixels.
    pub height: u32,
    /// Left outer eye corner target, as fractions of the canvas.
    pub left_eye: [f64; 2],
    /// Right outer eye corner target, as fractions of the canvas.
    pub right_eye: [f64; 2],
    pub output: PathBuf,
    /// Worker threads; rayon picks one per core when unset.
    pub threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: CanvasSize::DEFAULT.width,
            height: CanvasSize::DEFAULT.height,
            left_eye: [0.3, 1.0 / 3.0],
            right_eye: [0.7, 1.0 / 3.0],
            output: PathBuf::from("average_face.jpg"),
            threads: None,
        }
    }
}

impl Config {
    pub fn canvas(&self) -> Result<CanvasSize> {
        CanvasSize::new(self.width, self.height).context("invalid output size")
    }

    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        let canvas = self.canvas()?;
        for (name, eye) in [("left_eye", self.left_eye), ("right_eye", self.right_eye)] {
            if !eye.iter().all(|v| (0.0..=1.0).contains(v)) {
                anyhow::bail!("{} must lie within the canvas, got {:?}", name, eye);
            }
        }
        let anchors = EyeAnchors::from_fractions(canvas, self.left_eye, self.right_eye);
        if anchors.left == anchors.right {
            anyhow::bail!(
                "left_eye and right_eye map to the same pixel ({}, {})",
                anchors.left.x,
                anchors.left.y
            );
        }
        Ok(PipelineOptions { canvas, anchors })
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}
