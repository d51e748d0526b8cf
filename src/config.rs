use serde::{Deserialize, Serialize};
use std::fs;

use crate::core_types::Points;
use crate::ledger::SettlementPolicy;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Escrow engine settings (bonus, default price, settlement policy)
    #[serde(default)]
    pub escrow: EscrowConfig,
    /// Balance-change audit log
    #[serde(default)]
    pub audit: AuditConfig,
    /// PostgreSQL connection URL for the durability mirror
    #[serde(default)]
    pub postgres_url: Option<String>,
}

/// Escrow engine configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EscrowConfig {
    /// Flat bonus credited to BOTH parties when an exchange completes.
    #[serde(default = "default_completion_bonus")]
    pub completion_bonus: Points,
    /// Price applied to a request when the caller does not quote one.
    #[serde(default = "default_price")]
    pub default_price: Points,
    /// Whether settlement additionally charges the transferred amount from
    /// the sender's available balance (the marketplace's settlement rule;
    /// the escrowed amount itself always goes to the receiver).
    #[serde(default = "default_charge_sender")]
    pub charge_sender_on_settle: bool,
}

fn default_completion_bonus() -> Points {
    10
}

fn default_price() -> Points {
    5
}

fn default_charge_sender() -> bool {
    true
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            completion_bonus: default_completion_bonus(),
            default_price: default_price(),
            charge_sender_on_settle: default_charge_sender(),
        }
    }
}

impl EscrowConfig {
    /// Build the settlement policy handed to the ledger.
    pub fn settlement_policy(&self) -> SettlementPolicy {
        SettlementPolicy {
            completion_bonus: self.completion_bonus,
            charge_sender_on_settle: self.charge_sender_on_settle,
        }
    }
}

/// Balance-change audit log configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "./data/audit/balance_log.csv".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "skillswap.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            escrow: EscrowConfig::default(),
            audit: AuditConfig::default(),
            postgres_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_defaults() {
        let cfg = EscrowConfig::default();
        assert_eq!(cfg.completion_bonus, 10);
        assert_eq!(cfg.default_price, 5);
        assert!(cfg.charge_sender_on_settle);
    }

    #[test]
    fn test_minimal_yaml_fills_escrow_defaults() {
        let yaml = r#"
log_level: "debug"
log_dir: "./logs"
log_file: "test.log"
use_json: false
rotation: "never"
"#;
        let cfg: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.escrow.completion_bonus, 10);
        assert!(!cfg.audit.enabled);
        assert!(cfg.postgres_url.is_none());
    }

    #[test]
    fn test_escrow_overrides() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "test.log"
use_json: true
rotation: "hourly"
escrow:
  completion_bonus: 1
  charge_sender_on_settle: false
"#;
        let cfg: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.escrow.completion_bonus, 1);
        assert_eq!(cfg.escrow.default_price, 5);
        let policy = cfg.escrow.settlement_policy();
        assert!(!policy.charge_sender_on_settle);
    }
}
