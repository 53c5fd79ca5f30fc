//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::DeviceBlueprint;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        transport = ?blueprint.link.transport,
        visual_driver = ?blueprint.sources.visual.driver,
        thermal_driver = ?blueprint.sources.thermal.driver,
        depth = blueprint.fusion.depth.enabled,
        calibration = blueprint.calibration.enabled,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        max_ticks: (args.max_ticks != 0).then_some(args.max_ticks),
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
    });

    info!("Starting pipeline...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        ticks = stats.ticks,
        frames_sent = stats.session.frames_sent,
        duration_secs = stats.duration.as_secs_f64(),
        tick_rate = format!("{:.2}", stats.tick_rate()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("EyeCan finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping pipeline...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &DeviceBlueprint) {
    let fusion = &blueprint.fusion;
    println!("\n=== Configuration Summary ===\n");
    println!("Fusion:");
    println!("  Scale factor: {} cm/px", fusion.scale_factor);
    println!(
        "  Thresholds: outer {} cm, inner {} cm",
        fusion.outer_threshold_cm, fusion.inner_threshold_cm
    );
    if fusion.depth.enabled {
        println!(
            "  Depth: slope {}, offset {}, hazard height {} cm",
            fusion.depth.slope, fusion.depth.offset, fusion.hazard_height_offset_cm
        );
    } else {
        println!("  Depth: disabled");
    }
    if blueprint.calibration.enabled {
        println!(
            "  Calibration: {} cm lift, {} attempts per stage",
            blueprint.calibration.hand_height_cm, blueprint.calibration.max_attempts
        );
    }

    let sources = &blueprint.sources;
    println!("\nSources:");
    println!(
        "  Visual: {:?}, {} hand(s), {}x{} hazard frame",
        sources.visual.driver,
        sources.visual.max_hands,
        sources.visual.frame_width,
        sources.visual.frame_height
    );
    println!(
        "  Thermal: {:?}, > {} °C, up to {} hazards",
        sources.thermal.driver, sources.thermal.hazard_temp_c, sources.thermal.max_hazards
    );

    let link = &blueprint.link;
    println!("\nLink:");
    println!("  Transport: {:?}", link.transport);
    println!("  Peer filter: {}", link.peer_name_filter);
    if !link.peers.is_empty() {
        println!("  Peers: {}", link.peers.join(", "));
    }

    println!();
}
