//! KeyReel CLI: export keyframed still-frame scenes to video.
//!
//! Usage:
//!   keyreel export <SCENE_DIR>   Export a directory of keyframe images
//!   keyreel check                Check encoder and scratch storage
//!   keyreel config               Show or initialize the config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod scene;

#[derive(Parser)]
#[command(
    name = "keyreel",
    about = "Export keyframed scenes to video, one still per keyframe",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene directory to video
    ///
    /// Every `<id>.png` / `<id>.jpg` file in the directory is one keyframe,
    /// exported in ascending id order.
    Export {
        /// Directory holding one image per keyframe
        scene: PathBuf,

        /// Output file path (a `file://` URL is accepted)
        #[arg(short, long)]
        output: Option<String>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Output width
        #[arg(long)]
        width: Option<u32>,

        /// Output height
        #[arg(long)]
        height: Option<u32>,

        /// Height of the simulated window chrome above and below the scene
        #[arg(long, default_value = "40")]
        chrome: u32,

        /// Encoder executable to use instead of the discovered one
        #[arg(long)]
        encoder: Option<PathBuf>,
    },

    /// Check encoder discovery and scratch storage
    Check,

    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with `--init`
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = keyreel_common::config::AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    keyreel_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Export {
            scene,
            output,
            fps,
            width,
            height,
            chrome,
            encoder,
        } => {
            commands::export::run(
                config,
                commands::export::ExportArgs {
                    scene,
                    output,
                    fps,
                    width,
                    height,
                    chrome,
                    encoder,
                },
            )
            .await
        }
        Commands::Check => commands::check::run(&config),
        Commands::Config { init, force } => commands::config::run(&config, init, force),
    }
}
