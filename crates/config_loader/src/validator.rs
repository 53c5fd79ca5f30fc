//! 配置校验模块
//!
//! 校验规则：
//! - 数值范围 (validator derive, 见 contracts::DeviceBlueprint)
//! - inner_threshold_cm <= outer_threshold_cm
//! - 标定需要启用深度融合
//! - replay 驱动需要 replay_path
//! - tcp_bridge 需要合法的 peers 地址
//! - 仿真热源位于热成像帧内

use std::net::SocketAddr;

use contracts::{ContractError, DeviceBlueprint, SourceDriver, TransportKind};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 DeviceBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_thresholds(blueprint)?;
    validate_calibration(blueprint)?;
    validate_drivers(blueprint)?;
    validate_link(blueprint)?;
    validate_simulation(blueprint)?;
    Ok(())
}

/// 校验字段范围
fn validate_ranges(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let (field, message) = first_error(&errors, "")
            .unwrap_or_else(|| ("<root>".to_string(), "invalid value".to_string()));
        ContractError::config_validation(field, message)
    })
}

/// Depth-first search for the first failing field, in sorted key order
fn first_error(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (name, kind) in entries {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(err) = field_errors.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| describe_params(&err.code, &err.params));
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                if let Some(found) = first_error(nested, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    if let Some(found) = first_error(nested, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn describe_params(
    code: &str,
    params: &std::collections::HashMap<std::borrow::Cow<'static, str>, serde_json::Value>,
) -> String {
    let mut bounds: Vec<String> = params
        .iter()
        .filter(|(key, _)| key.as_ref() != "value")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    bounds.sort();

    let got = params
        .get("value")
        .map(|v| format!(", got {v}"))
        .unwrap_or_default();

    if bounds.is_empty() {
        format!("{code} check failed{got}")
    } else {
        format!("{code} check failed ({}){got}", bounds.join(", "))
    }
}

/// 校验阈值顺序
fn validate_thresholds(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    let fusion = &blueprint.fusion;
    if fusion.inner_threshold_cm > fusion.outer_threshold_cm {
        return Err(ContractError::config_validation(
            "fusion.inner_threshold_cm / fusion.outer_threshold_cm",
            format!(
                "inner_threshold_cm ({}) must be <= outer_threshold_cm ({})",
                fusion.inner_threshold_cm, fusion.outer_threshold_cm
            ),
        ));
    }
    Ok(())
}

/// 校验标定配置
fn validate_calibration(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    if blueprint.calibration.enabled && !blueprint.fusion.depth.enabled {
        return Err(ContractError::config_validation(
            "calibration.enabled",
            "depth calibration requires fusion.depth.enabled = true",
        ));
    }
    Ok(())
}

/// 校验驱动配置
fn validate_drivers(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    let visual = &blueprint.sources.visual;
    let thermal = &blueprint.sources.thermal;
    let sources = [
        ("sources.visual", visual.driver, visual.replay_path.is_some()),
        ("sources.thermal", thermal.driver, thermal.replay_path.is_some()),
    ];

    for (section, driver, has_path) in sources {
        if driver == SourceDriver::Replay && !has_path {
            return Err(ContractError::config_validation(
                format!("{section}.replay_path"),
                "replay driver requires a recording path",
            ));
        }
    }
    Ok(())
}

/// 校验链路配置
fn validate_link(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    let link = &blueprint.link;
    if link.transport != TransportKind::TcpBridge {
        return Ok(());
    }

    if link.peers.is_empty() {
        return Err(ContractError::config_validation(
            "link.peers",
            "tcp_bridge transport requires at least one peer",
        ));
    }

    for (idx, peer) in link.peers.iter().enumerate() {
        if peer.parse::<SocketAddr>().is_err() {
            return Err(ContractError::config_validation(
                format!("link.peers[{idx}]"),
                format!("'{peer}' is not a socket address"),
            ));
        }
    }
    Ok(())
}

/// 校验仿真热源
fn validate_simulation(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    let width = blueprint.sources.visual.frame_width as usize;
    let height = blueprint.sources.visual.frame_height as usize;

    for (idx, hazard) in blueprint.simulation.hazards.iter().enumerate() {
        let [x0, y0] = hazard.min;
        let [x1, y1] = hazard.max;
        if x0 > x1 || y0 > y1 {
            return Err(ContractError::config_validation(
                format!("simulation.hazards[{idx}]"),
                "min corner must not exceed max corner",
            ));
        }
        if x1 >= width || y1 >= height {
            return Err(ContractError::config_validation(
                format!("simulation.hazards[{idx}].max"),
                format!("corner ({x1}, {y1}) lies outside the {width}x{height} frame"),
            ));
        }
    }

    for (idx, [x, y]) in blueprint.simulation.hand_path.iter().enumerate() {
        if !(0.0..=1.0).contains(x) || !(0.0..=1.0).contains(y) {
            return Err(ContractError::config_validation(
                format!("simulation.hand_path[{idx}]"),
                "waypoints are normalized and must lie in 0.0..=1.0",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SimulatedHazard;

    #[test]
    fn test_valid_config() {
        assert!(validate(&DeviceBlueprint::default()).is_ok());
    }

    #[test]
    fn test_range_error_reports_path() {
        let mut bp = DeviceBlueprint::default();
        bp.fusion.scale_factor = -1.0;
        let err = validate(&bp).unwrap_err();
        match err {
            ContractError::ConfigValidation { field, .. } => {
                assert_eq!(field, "fusion.scale_factor")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inverted_thresholds() {
        let mut bp = DeviceBlueprint::default();
        bp.fusion.inner_threshold_cm = 12.0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("must be <= outer_threshold_cm"), "got: {err}");
    }

    #[test]
    fn test_calibration_requires_depth() {
        let mut bp = DeviceBlueprint::default();
        bp.calibration.enabled = true;
        bp.fusion.depth.enabled = false;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("requires fusion.depth.enabled"), "got: {err}");
    }

    #[test]
    fn test_replay_requires_path() {
        let mut bp = DeviceBlueprint::default();
        bp.sources.thermal.driver = SourceDriver::Replay;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("sources.thermal.replay_path"), "got: {err}");

        bp.sources.thermal.replay_path = Some("thermal.jsonl".into());
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_tcp_bridge_requires_peers() {
        let mut bp = DeviceBlueprint::default();
        bp.link.transport = TransportKind::TcpBridge;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("at least one peer"), "got: {err}");

        bp.link.peers = vec!["not-an-address".into()];
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("not a socket address"), "got: {err}");

        bp.link.peers = vec!["127.0.0.1:7878".into()];
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_simulated_hazard_outside_frame() {
        let mut bp = DeviceBlueprint::default();
        bp.simulation.hazards.push(SimulatedHazard {
            min: [70, 50],
            max: [90, 60],
            temperature_c: 80.0,
        });
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("outside the 80x62 frame"), "got: {err}");
    }

    #[test]
    fn test_hand_path_must_be_normalized() {
        let mut bp = DeviceBlueprint::default();
        bp.simulation.hand_path = vec![[1.5, 0.2]];
        assert!(validate(&bp).is_err());
    }
}
