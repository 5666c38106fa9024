//! TOML 設定ファイル
//!
//! ```toml
//! [engine]
//! path = "./minimax_engine"
//! args = []
//! quit_grace_ms = 1000
//!
//! [session]
//! timeout_secs = 5.0
//! fen = "7k/8/8/8/8/8/4Q3/5K2 w - - 0 1"
//! go = "go"
//! strict = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::engine::{DEFAULT_QUIT_GRACE, EngineConfig};
use crate::session::{DEFAULT_FEN, DEFAULT_GO_COMMAND, DEFAULT_TIMEOUT, SessionConfig};

pub const DEFAULT_ENGINE_PATH: &str = "./minimax_engine";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub session: SessionSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_quit_grace_ms")]
    pub quit_grace_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    #[serde(default = "default_fen")]
    pub fen: String,
    #[serde(default = "default_go")]
    pub go: String,
    /// 応答待ちが 1 つでも一致しなければ失敗扱いにする
    #[serde(default)]
    pub strict: bool,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from(DEFAULT_ENGINE_PATH)
}

fn default_quit_grace_ms() -> u64 {
    DEFAULT_QUIT_GRACE.as_millis() as u64
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

fn default_fen() -> String {
    DEFAULT_FEN.to_string()
}

fn default_go() -> String {
    DEFAULT_GO_COMMAND.to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            args: Vec::new(),
            quit_grace_ms: default_quit_grace_ms(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            fen: default_fen(),
            go: default_go(),
            strict: false,
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: HarnessConfig = toml::from_str(text).context("invalid harness config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        timeout_from_secs(self.session.timeout_secs)?;
        if self.session.go.trim().is_empty() {
            bail!("session.go must not be empty");
        }
        Ok(())
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        let engine = EngineConfig {
            path: self.engine.path.clone(),
            args: self.engine.args.clone(),
            quit_grace: Duration::from_millis(self.engine.quit_grace_ms),
        };
        Ok(SessionConfig {
            engine,
            timeout: timeout_from_secs(self.session.timeout_secs)?,
            fen: self.session.fen.clone(),
            go_command: self.session.go.clone(),
        })
    }
}

/// 秒数（小数可）を Duration に変換する。負数・NaN・無限大は拒否。
pub fn timeout_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| anyhow::anyhow!("invalid timeout {secs}s: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = HarnessConfig::from_toml_str("").unwrap();
        let session = cfg.session_config().unwrap();

        assert_eq!(session.engine.path, PathBuf::from("./minimax_engine"));
        assert!(session.engine.args.is_empty());
        assert_eq!(session.engine.quit_grace, DEFAULT_QUIT_GRACE);
        assert_eq!(session.timeout, Duration::from_secs(5));
        assert_eq!(session.fen, DEFAULT_FEN);
        assert_eq!(session.go_command, "go");
        assert!(!cfg.session.strict);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let cfg = HarnessConfig::from_toml_str(
            r#"
            [engine]
            path = "/opt/engines/stockfish"
            args = ["--uci"]

            [session]
            timeout_secs = 0.5
            go = "go movetime 300"
            strict = true
            "#,
        )
        .unwrap();
        let session = cfg.session_config().unwrap();

        assert_eq!(session.engine.path, PathBuf::from("/opt/engines/stockfish"));
        assert_eq!(session.engine.args, vec!["--uci".to_string()]);
        assert_eq!(session.timeout, Duration::from_millis(500));
        assert_eq!(session.go_command, "go movetime 300");
        assert_eq!(session.fen, DEFAULT_FEN);
        assert!(cfg.session.strict);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(HarnessConfig::from_toml_str("[session]\ntimeout = 5\n").is_err());
        assert!(HarnessConfig::from_toml_str("[logging]\nlevel = \"debug\"\n").is_err());
    }

    #[test]
    fn negative_timeout_is_rejected() {
        assert!(HarnessConfig::from_toml_str("[session]\ntimeout_secs = -1.0\n").is_err());
        assert!(timeout_from_secs(f64::NAN).is_err());
        assert!(timeout_from_secs(f64::INFINITY).is_err());
        assert_eq!(timeout_from_secs(0.0).unwrap(), Duration::ZERO);
    }

    #[test]
    fn empty_go_command_is_rejected() {
        assert!(HarnessConfig::from_toml_str("[session]\ngo = \"  \"\n").is_err());
    }
}
