// vidmark command line interface
// Offline tooling around masks, tracking responses and configuration

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use vidmark_core::AnnotatorConfig;

#[derive(Parser)]
#[command(name = "vidmark")]
#[command(about = "Video object annotation tooling", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a transport mask and describe it
    DecodeMask {
        /// Encoded mask, `@file` or `-` for stdin
        input: String,

        /// Resample to this width before reporting
        #[arg(long, requires = "height")]
        width: Option<usize>,

        /// Resample to this height before reporting
        #[arg(long, requires = "width")]
        height: Option<usize>,

        /// Write the bitmap as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Encode a CSV bitmap for transport
    EncodeMask {
        csv: PathBuf,

        #[arg(long)]
        width: Option<usize>,

        #[arg(long)]
        height: Option<usize>,
    },

    /// Replay a saved tracking response against a frame list
    Ingest {
        /// Frame list: the video JSON document or one label per line
        #[arg(long)]
        frames: PathBuf,

        /// Saved tracking response (JSON)
        #[arg(long)]
        response: PathBuf,

        /// Video name (required for plain frame lists)
        #[arg(long)]
        video: Option<String>,

        /// Annotation id to register, defaults to the response's object id
        #[arg(long)]
        object: Option<String>,

        /// Frame the object was prompted on
        #[arg(long, default_value = "0")]
        initial_frame: usize,
    },

    /// Submit a CSV mask to the tracking backend
    Submit {
        #[arg(long)]
        video: String,

        /// Frame label the mask was drawn on
        #[arg(long)]
        frame: String,

        /// Annotation id, e.g. Door_1
        #[arg(long)]
        object: String,

        #[arg(long)]
        description: Option<String>,

        /// Override the configured endpoint
        #[arg(long)]
        endpoint: Option<String>,

        csv: PathBuf,
    },

    /// Load a frame from disk and report its encoder input tensor
    InspectFrame {
        #[arg(long)]
        dir: PathBuf,

        label: String,
    },

    /// Print the effective configuration
    Config {
        /// Output format (json, toml)
        #[arg(long, short, default_value = "toml")]
        format: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AnnotatorConfig> {
    let mut config = match path {
        Some(path) => AnnotatorConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnnotatorConfig::default(),
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.log_level()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    debug!("Effective log level: {}", level);

    match cli.command {
        Commands::DecodeMask {
            input,
            width,
            height,
            csv,
        } => {
            let upscale = width.zip(height);
            let bitmap = commands::decode_mask(&input, upscale, csv.as_deref())?;
            commands::print_bitmap_summary(&bitmap);
        }
        Commands::EncodeMask { csv, width, height } => {
            println!("{}", commands::encode_mask(&csv, width, height)?);
        }
        Commands::Ingest {
            frames,
            response,
            video,
            object,
            initial_frame,
        } => {
            let video = commands::load_video(&frames, video.as_deref())?;
            let report =
                commands::ingest(&video, &response, object.as_deref(), initial_frame)?;
            commands::print_boxes(&video)?;
            for label in &report.skipped_labels {
                warn!("Unresolved frame label: {}", label);
            }
            println!(
                "applied {} boxes for {} ({} unresolved, {} malformed)",
                report.applied,
                report.object_id,
                report.skipped_labels.len(),
                report.malformed
            );
        }
        Commands::Submit {
            video,
            frame,
            object,
            description,
            endpoint,
            csv,
        } => {
            let mut config = config;
            if let Some(endpoint) = endpoint {
                config.tracking.endpoint = endpoint;
            }
            let request =
                commands::build_request(&video, &frame, &object, description.as_deref(), &csv)?;
            let response = commands::submit(&config, request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::InspectFrame { dir, label } => {
            let inspection = commands::inspect_frame(&config, &dir, &label).await?;
            println!("image: {}x{}", inspection.width, inspection.height);
            println!("tensor: {:?}", inspection.tensor_shape);
            println!("mean: {:.4}", inspection.tensor_mean);
        }
        Commands::Config { format } => {
            println!("{}", commands::render_config(&config, &format)?);
        }
    }

    Ok(())
}
