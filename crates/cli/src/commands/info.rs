//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::DeviceBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    fusion: FusionInfo,
    sources: Vec<SourceInfo>,
    link: LinkInfo,
}

#[derive(Serialize)]
struct FusionInfo {
    scale_factor: f64,
    outer_threshold_cm: f64,
    inner_threshold_cm: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<DepthInfo>,
}

#[derive(Serialize)]
struct DepthInfo {
    slope: f64,
    offset: f64,
    hazard_height_offset_cm: f64,
    calibrated_at_startup: bool,
}

#[derive(Serialize)]
struct SourceInfo {
    id: String,
    driver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay_path: Option<String>,
    limit: usize,
    max_consecutive_faults: u32,
}

#[derive(Serialize)]
struct LinkInfo {
    transport: String,
    peer_name_filter: String,
    scan_window_ms: u64,
    connect_timeout_ms: u64,
    backoff_ms: u64,
    settle_ms: u64,
    shutdown_grace_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    peers: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &DeviceBlueprint) -> ConfigInfo {
    let fusion = &blueprint.fusion;
    let visual = &blueprint.sources.visual;
    let thermal = &blueprint.sources.thermal;
    let link = &blueprint.link;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        fusion: FusionInfo {
            scale_factor: fusion.scale_factor,
            outer_threshold_cm: fusion.outer_threshold_cm,
            inner_threshold_cm: fusion.inner_threshold_cm,
            depth: fusion.depth.enabled.then(|| DepthInfo {
                slope: fusion.depth.slope,
                offset: fusion.depth.offset,
                hazard_height_offset_cm: fusion.hazard_height_offset_cm,
                calibrated_at_startup: blueprint.calibration.enabled,
            }),
        },
        sources: vec![
            SourceInfo {
                id: "visual".to_string(),
                driver: format!("{:?}", visual.driver),
                replay_path: visual.replay_path.as_ref().map(|p| p.display().to_string()),
                limit: visual.max_hands,
                max_consecutive_faults: visual.max_consecutive_faults,
            },
            SourceInfo {
                id: "thermal".to_string(),
                driver: format!("{:?}", thermal.driver),
                replay_path: thermal.replay_path.as_ref().map(|p| p.display().to_string()),
                limit: thermal.max_hazards,
                max_consecutive_faults: thermal.max_consecutive_faults,
            },
        ],
        link: LinkInfo {
            transport: format!("{:?}", link.transport),
            peer_name_filter: link.peer_name_filter.clone(),
            scan_window_ms: link.scan_window_ms,
            connect_timeout_ms: link.connect_timeout_ms,
            backoff_ms: link.backoff_ms,
            settle_ms: link.settle_ms,
            shutdown_grace_ms: link.shutdown_grace_ms,
            peers: link.peers.clone(),
        },
    }
}

fn print_config_info(blueprint: &DeviceBlueprint) {
    let info = build_config_info(blueprint);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  EyeCan Configuration                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📐 Fusion");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Scale: {} cm/px", info.fusion.scale_factor);
    println!(
        "   ├─ Thresholds: outer {} cm / inner {} cm",
        info.fusion.outer_threshold_cm, info.fusion.inner_threshold_cm
    );
    match &info.fusion.depth {
        Some(depth) => println!(
            "   └─ Depth: slope {} offset {} (hazard height {} cm{})",
            depth.slope,
            depth.offset,
            depth.hazard_height_offset_cm,
            if depth.calibrated_at_startup { ", calibrated at startup" } else { "" }
        ),
        None => println!("   └─ Depth: disabled"),
    }

    println!("\n📷 Sources ({})", info.sources.len());
    for (i, source) in info.sources.iter().enumerate() {
        let prefix = if i == info.sources.len() - 1 { "└─" } else { "├─" };
        let replay = source
            .replay_path
            .as_ref()
            .map(|p| format!(" from {p}"))
            .unwrap_or_default();
        println!(
            "   {} {} ({}{}), limit {}, retire after {} faults",
            prefix, source.id, source.driver, replay, source.limit, source.max_consecutive_faults
        );
    }

    let link = &info.link;
    println!("\n📡 Link");
    println!("   ├─ Transport: {}", link.transport);
    println!("   ├─ Peer filter: {}", link.peer_name_filter);
    println!(
        "   ├─ Timing: scan {} ms, connect {} ms, backoff {} ms, settle {} ms",
        link.scan_window_ms, link.connect_timeout_ms, link.backoff_ms, link.settle_ms
    );
    if link.peers.is_empty() {
        println!("   └─ Shutdown grace: {} ms", link.shutdown_grace_ms);
    } else {
        println!("   ├─ Shutdown grace: {} ms", link.shutdown_grace_ms);
        println!("   └─ Peers: {}", link.peers.join(", "));
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_info_json() {
        let mut blueprint = DeviceBlueprint::default();
        blueprint.fusion.depth.enabled = false;
        blueprint.link.peers = vec!["127.0.0.1:7878".into()];

        let json = serde_json::to_value(build_config_info(&blueprint)).unwrap();
        assert!(json["fusion"].get("depth").is_none());
        assert_eq!(json["sources"][1]["id"], "thermal");
        assert_eq!(json["sources"][1]["limit"], 9);
        assert_eq!(json["link"]["peer_name_filter"], "BLE-Server-EyeCan");
        assert_eq!(json["link"]["peers"][0], "127.0.0.1:7878");
    }

    #[test]
    fn test_info_missing_file() {
        let args = InfoArgs {
            config: "/nonexistent/eyecan.toml".into(),
            json: true,
        };
        assert!(run_info(&args).is_err());
    }
}
