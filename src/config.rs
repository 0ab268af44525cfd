//! YAML configuration loading.
//!
//! Out of THE CORE's invariant scope (spec.md treats config loading as an
//! external collaborator) but still real code, grounded in
//! `original_source/src/agent_rad_tools/config.py`: the same three sections
//! (`pacs`, `scp`, `output`) with the same defaults, read with `serde_yaml`
//! instead of hand-written parsing.

use crate::ae_title::{OurAETitle, RemoteAETitle};
use crate::error::LoaderError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PacsConfig {
    pub host: String,
    pub port: u16,
    pub ae_title: RemoteAETitle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScpConfig {
    #[serde(default = "default_scp_ae_title")]
    pub ae_title: OurAETitle,
    #[serde(default = "default_scp_port")]
    pub port: u16,
}

impl Default for ScpConfig {
    fn default() -> Self {
        Self {
            ae_title: default_scp_ae_title(),
            port: default_scp_port(),
        }
    }
}

fn default_scp_ae_title() -> OurAETitle {
    OurAETitle::from_static("AHJO-loader")
}

fn default_scp_port() -> u16 {
    9012
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: Utf8PathBuf,
    /// How long the Orchestrator waits after `move_study` returns for
    /// trailing C-STORE associations to drain (spec.md §4.F step 4, §9
    /// grace-sleep open question — see DESIGN.md).
    #[serde(with = "humantime_serde", default = "default_grace_period")]
    pub move_grace_period: std::time::Duration,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            move_grace_period: default_grace_period(),
        }
    }
}

fn default_base_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("/data/research")
}

fn default_grace_period() -> std::time::Duration {
    std::time::Duration::from_secs(1)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pacs: PacsConfig,
    #[serde(default)]
    pub scp: ScpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn from_file(path: &Utf8Path) -> Result<Self, LoaderError> {
        let text = fs_err::read_to_string(path).map_err(|e| LoaderError::ConfigRead {
            path: path.to_owned(),
            source: e,
        })?;
        serde_yaml::from_str(&text).map_err(|e| LoaderError::ConfigParse {
            path: path.to_owned(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let yaml = r#"
pacs:
  host: archive.example.org
  port: 11112
  ae_title: ARCHIVE
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pacs.host, "archive.example.org");
        assert_eq!(config.scp.ae_title.as_str(), "AHJO-loader");
        assert_eq!(config.scp.port, 9012);
        assert_eq!(config.output.base_dir.as_str(), "/data/research");
        assert_eq!(config.output.move_grace_period, std::time::Duration::from_secs(1));
    }

    #[test]
    fn parses_full_config() {
        let yaml = r#"
pacs:
  host: archive.example.org
  port: 11112
  ae_title: ARCHIVE
scp:
  ae_title: MY-LOADER
  port: 9999
output:
  base_dir: /srv/research
  move_grace_period: 2s
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scp.ae_title.as_str(), "MY-LOADER");
        assert_eq!(config.scp.port, 9999);
        assert_eq!(config.output.base_dir.as_str(), "/srv/research");
        assert_eq!(config.output.move_grace_period, std::time::Duration::from_secs(2));
    }

    #[test]
    fn missing_required_key_fails() {
        let yaml = r#"
pacs:
  host: archive.example.org
"#;
        let result: Result<Config, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }
}
