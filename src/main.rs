use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use meanface::{config, dataset, output, Error, Pipeline};

#[derive(Parser)]
#[command(name = "meanface")]
#[command(version, about = "Average a set of aligned face photographs")]
struct Cli {
    /// Config file (defaults to meanface.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Average every face in a directory of images and landmark files
    Average {
        /// Directory holding `<name>.jpg` and `<name>.jpg.txt` pairs
        dir: PathBuf,
        /// Output canvas width
        #[arg(long)]
        width: Option<u32>,
        /// Output canvas height
        #[arg(long)]
        height: Option<u32>,
        /// Output image path; the extension picks the format
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the mean shape and triangulation as JSON
        #[arg(long)]
        shape_out: Option<PathBuf>,
        /// Worker threads
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },
    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Average {
            dir,
            width,
            height,
            output,
            shape_out,
            threads,
        } => {
            if let Some(w) = width {
                cfg.width = w;
            }
            if let Some(h) = height {
                cfg.height = h;
            }
            if let Some(o) = output {
                cfg.output = o;
            }
            if threads.is_some() {
                cfg.threads = threads;
            }
            average(&cfg, &dir, shape_out.as_deref())
        }
        Commands::Config { init } => show_config(&cfg, init, cli.config.as_deref()),
    }
}

fn average(cfg: &config::Config, dir: &Path, shape_out: Option<&Path>) -> Result<()> {
    let options = cfg.pipeline_options()?;
    if let Some(n) = cfg.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let pairs = dataset::discover(dir)?;
    info!("Found {} face(s) in {}", pairs.len(), dir.display());
    let faces = dataset::load_faces(&pairs)?;

    let pipeline = Pipeline::new(options);
    let average = pipeline.run(&faces).map_err(|e| match e {
        Error::Face { index, source } => anyhow::Error::new(*source)
            .context(format!("Failed to process {}", pairs[index].image.display())),
        other => anyhow::Error::new(other),
    })?;

    output::write_image_atomic(&average.image.to_rgb8(), &cfg.output)?;
    if let Some(path) = shape_out {
        output::write_shape_json(&average, options.canvas, path)?;
    }

    info!(
        "✓ Averaged {} face(s) into {}",
        average.faces,
        cfg.output.display()
    );
    Ok(())
}

fn show_config(cfg: &config::Config, init: bool, path: Option<&Path>) -> Result<()> {
    cfg.pipeline_options()?;
    print!("{}", toml::to_string_pretty(cfg)?);
    if init {
        config::save_config(cfg, path)?;
        let path = path.unwrap_or(&config::CONFIG_PATH);
        info!("Wrote config to {}", path.display());
    }
    Ok(())
}
