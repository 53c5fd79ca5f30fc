//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DeviceBlueprint, SourceDriver, TransportKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    transport: String,
    visual_driver: String,
    thermal_driver: String,
    depth_enabled: bool,
    calibration_enabled: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    transport: format!("{:?}", blueprint.link.transport),
                    visual_driver: format!("{:?}", blueprint.sources.visual.driver),
                    thermal_driver: format!("{:?}", blueprint.sources.thermal.driver),
                    depth_enabled: blueprint.fusion.depth.enabled,
                    calibration_enabled: blueprint.calibration.enabled,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &DeviceBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.link.transport == TransportKind::Log {
        warnings.push("link.transport is 'log' - frames are only written to the log".to_string());
    }
    if blueprint.link.transport == TransportKind::Log && !blueprint.link.peers.is_empty() {
        warnings.push("link.peers is ignored by the 'log' transport".to_string());
    }

    for (section, driver) in [
        ("sources.visual", blueprint.sources.visual.driver),
        ("sources.thermal", blueprint.sources.thermal.driver),
    ] {
        if driver == SourceDriver::Simulated {
            warnings.push(format!("{section} uses the simulated driver"));
        }
    }

    if blueprint.calibration.enabled && blueprint.sources.visual.driver == SourceDriver::Simulated {
        warnings.push(
            "calibration with the simulated hand detector cannot fit a model - the configured depth model will be used"
                .to_string(),
        );
    }

    if !blueprint.fusion.depth.enabled && blueprint.fusion.hazard_height_offset_cm > 0.0 {
        warnings.push(
            "fusion.hazard_height_offset_cm has no effect while depth is disabled".to_string(),
        );
    }

    if blueprint.simulation.hazards.is_empty()
        && blueprint.sources.thermal.driver == SourceDriver::Simulated
    {
        warnings.push("simulation.hazards is empty - every report will be clear".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Transport: {}", summary.transport);
            println!("  Visual driver: {}", summary.visual_driver);
            println!("  Thermal driver: {}", summary.thermal_driver);
            println!("  Depth: {}", if summary.depth_enabled { "enabled" } else { "disabled" });
            println!(
                "  Calibration: {}",
                if summary.calibration_enabled { "enabled" } else { "disabled" }
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
