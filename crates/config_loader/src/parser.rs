//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, DeviceBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<DeviceBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<DeviceBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<DeviceBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TransportKind;

    #[test]
    fn test_parse_toml_empty_uses_defaults() {
        let bp = parse_toml("").unwrap();
        assert_eq!(bp.fusion.outer_threshold_cm, 10.0);
        assert_eq!(bp.sources.thermal.max_hazards, 9);
        assert_eq!(bp.link.transport, TransportKind::Log);
    }

    #[test]
    fn test_parse_toml_partial_section() {
        let content = r#"
[fusion]
scale_factor = 1.25

[fusion.depth]
enabled = false

[link]
transport = "tcp_bridge"
peers = ["127.0.0.1:7878"]
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.fusion.scale_factor, 1.25);
        assert_eq!(bp.fusion.inner_threshold_cm, 5.0);
        assert!(!bp.fusion.depth.enabled);
        assert_eq!(bp.fusion.depth.slope, 232.0);
        assert_eq!(bp.link.transport, TransportKind::TcpBridge);
        assert_eq!(bp.link.peers, vec!["127.0.0.1:7878".to_string()]);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "sources": { "visual": { "max_hands": 2 } } }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.sources.visual.max_hands, 2);
        assert_eq!(bp.sources.visual.frame_width, 80);
    }

    #[test]
    fn test_parse_error_keeps_source() {
        let err = parse_toml("[fusion\nscale_factor = ").unwrap_err();
        match err {
            ContractError::ConfigParse { message, source } => {
                assert!(message.starts_with("TOML parse error"));
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let err = parse_toml("[link]\ntransport = \"carrier_pigeon\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
