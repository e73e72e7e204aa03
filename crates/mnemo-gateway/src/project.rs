//! Project scope derivation.
//!
//! Tool calls are scoped to an effective project id so separate codebases
//! never see each other's memories. In `auto` mode the id is derived from
//! the project directory; `manual` and `global` fall back to the configured
//! default user id.

use sha2::{Digest, Sha256};
use tracing::info;

use mnemo_config::{GatewayConfig, ProjectIdMode};

/// Derive the effective project id for this gateway process.
pub fn derive_project_id(config: &GatewayConfig) -> String {
    match config.project_id_mode {
        ProjectIdMode::Manual | ProjectIdMode::Global => config.default_user_id.clone(),
        ProjectIdMode::Auto => {
            let dir = config
                .project_dir
                .clone()
                .or_else(|| {
                    std::env::current_dir()
                        .ok()
                        .map(|p| p.to_string_lossy().into_owned())
                })
                .unwrap_or_else(|| config.default_user_id.clone());

            let project_id = hash_project_path(&dir);
            info!(project_id = %project_id, dir = %dir, "auto-detected project id");
            project_id
        }
    }
}

/// `prj_` plus the first 8 hex characters of the path's SHA-256.
pub fn hash_project_path(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    format!("prj_{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_format() {
        let id = hash_project_path("/home/alice/projects/widget");
        assert!(id.starts_with("prj_"));
        assert_eq!(id.len(), 4 + 8);
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(
            hash_project_path("/srv/app"),
            hash_project_path("/srv/app")
        );
        assert_ne!(hash_project_path("/srv/app"), hash_project_path("/srv/api"));
    }

    #[test]
    fn test_manual_mode_uses_default_user() {
        let config = GatewayConfig {
            project_id_mode: ProjectIdMode::Manual,
            default_user_id: "team-shared".to_string(),
            ..GatewayConfig::default()
        };
        assert_eq!(derive_project_id(&config), "team-shared");
    }

    #[test]
    fn test_auto_mode_hashes_configured_dir() {
        let config = GatewayConfig {
            project_id_mode: ProjectIdMode::Auto,
            project_dir: Some("/home/alice/widget".to_string()),
            ..GatewayConfig::default()
        };
        assert_eq!(
            derive_project_id(&config),
            hash_project_path("/home/alice/widget")
        );
    }
}
