//! Export a still-frame scene to video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use keyreel_common::config::AppConfig;
use keyreel_export_engine::{ExportEvent, ExportOutcome, Exporter};
use keyreel_scene_core::{KeyframeSource, RenderSurface};
use tokio::sync::broadcast::error::RecvError;

use crate::scene::StillFrameScene;

pub struct ExportArgs {
    pub scene: PathBuf,
    pub output: Option<String>,
    pub fps: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub chrome: u32,
    pub encoder: Option<PathBuf>,
}

pub async fn run(mut config: AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    if let Some(encoder) = args.encoder {
        config.encoder.path = Some(encoder);
    }

    let exporter = Exporter::from_config(&config);
    if let Some(output) = &args.output {
        exporter.set_export_path(output);
    }
    if let Some(fps) = args.fps {
        if !exporter.set_frame_rate(fps) {
            anyhow::bail!("Invalid frame rate {fps}: must be at least 2");
        }
    }
    let width = args.width.unwrap_or(config.export.width);
    let height = args.height.unwrap_or(config.export.height);

    let scene = Arc::new(StillFrameScene::open(&args.scene, args.chrome)?);
    let (scene_width, scene_height) = scene.scene_size();

    println!("Exporting scene: {}", args.scene.display());
    println!(
        "  Keyframes: {} ({}x{})",
        scene.keyframe_count(),
        scene_width,
        scene_height
    );
    println!("  Output: {}", exporter.export_path().display());
    println!("  Resolution: {width}x{height} @ {} fps", exporter.frame_rate());

    let source: Arc<dyn KeyframeSource> = scene.clone();
    let surface: Arc<dyn RenderSurface> = scene;
    let mut events = exporter.subscribe();
    if let Err(e) = exporter.start_export(Some(source), Some(surface), width, height) {
        anyhow::bail!("{} ({e})", exporter.status());
    }

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ExportEvent::Progress(progress)) => {
                    let eta = progress
                        .eta_secs
                        .map(|s| format!("{s:.1}s"))
                        .unwrap_or_else(|| "--".to_string());
                    print!(
                        "\r  Progress: frame {}/{} (keyframe {}), ETA {}    ",
                        progress.frame, progress.total, progress.keyframe, eta
                    );
                    let _ = std::io::stdout().flush();
                }
                Ok(ExportEvent::StatusChanged(status)) if status == "Generating video..." => {
                    println!("\n  Encoding...");
                }
                Ok(ExportEvent::Finished(outcome)) => break Some(outcome),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break None,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\n  Stopping export...");
                exporter.stop_export().await;
            }
        }
    };

    println!();
    match outcome {
        Some(ExportOutcome::Completed {
            output_path,
            frames,
            elapsed_secs,
        }) => {
            println!(
                "Export complete: {} ({frames} frames in {elapsed_secs:.1}s)",
                output_path.display()
            );
            Ok(())
        }
        Some(ExportOutcome::Cancelled { frames_captured }) => {
            println!("Export cancelled after {frames_captured} frames");
            Ok(())
        }
        Some(failed @ ExportOutcome::Failed { .. }) => {
            anyhow::bail!("{}\n{}", failed.status(), failed.message())
        }
        None => anyhow::bail!("Export ended without a result"),
    }
}
