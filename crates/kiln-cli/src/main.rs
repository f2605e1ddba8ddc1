//! Kiln CLI - Command-line interface for Hunyuan 3D model generation

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{env, generate, providers};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Generate 3D models with Tencent Hunyuan 3D", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a 3D model from a prompt or image
    Generate {
        /// Text prompt describing the model
        #[arg(long, short)]
        prompt: Option<String>,

        /// Local front image (uploaded to COS before submission)
        #[arg(long, short)]
        image: Option<PathBuf>,

        /// Publicly reachable front image URL
        #[arg(long)]
        image_url: Option<String>,

        /// Left view image (requires an image input)
        #[arg(long)]
        left: Option<PathBuf>,

        /// Right view image (requires an image input)
        #[arg(long)]
        right: Option<PathBuf>,

        /// Back view image (requires an image input)
        #[arg(long)]
        back: Option<PathBuf>,

        /// Base output directory
        #[arg(long, short, default_value = "output/hunyuan3d")]
        output: PathBuf,

        /// Initial seconds between status checks
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Seconds to wait for the job before giving up
        #[arg(long)]
        timeout: Option<u64>,

        /// Provider to use (http, sdk)
        #[arg(long)]
        provider: Option<String>,

        /// Write directly into the output directory instead of a timestamped subdirectory
        #[arg(long)]
        no_timestamp: bool,
    },

    /// Check credential environment variables
    Env {
        /// Also require the COS storage variables used for image uploads
        #[arg(long)]
        storage: bool,
    },

    /// List providers and whether this build supports them
    Providers,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            prompt,
            image,
            image_url,
            left,
            right,
            back,
            output,
            poll_interval,
            timeout,
            provider,
            no_timestamp,
        } => generate::run(generate::GenerateArgs {
            prompt,
            image,
            image_url,
            left,
            right,
            back,
            output,
            poll_interval,
            timeout,
            provider,
            no_timestamp,
        }),
        Commands::Env { storage } => env::run(storage),
        Commands::Providers => providers::run(),
    }
}
