use std::fs;
use std::path::Path;

use crate::chat::OrchestratorOptions;
use crate::llm::LlmClientConfig;
use crate::mcp::McpServerConfig;
use crate::{CalendarError, Result};

/// Everything the chat service needs to start
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub llm: LlmClientConfig,
    pub mcp: McpServerConfig,
    pub chat: OrchestratorOptions,
}

impl AppConfig {
    /// Load configuration from a TOML file (path via AICALENDAR_CONFIG or ./aicalendar.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("AICALENDAR_CONFIG").unwrap_or_else(|_| "aicalendar.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "config", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<AppToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "config", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Overlay a TOML document onto env-driven defaults; parse errors are returned
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let t = toml::from_str::<AppToml>(s).map_err(|e| CalendarError::Config(e.to_string()))?;
        Ok(t.overlay(Self::default()))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AppToml {
    llm: Option<LlmToml>,
    mcp: Option<McpToml>,
    chat: Option<ChatToml>,
}

impl AppToml {
    fn overlay(self, mut base: AppConfig) -> AppConfig {
        if let Some(l) = self.llm {
            l.apply(&mut base.llm);
        }
        if let Some(m) = self.mcp {
            m.apply(&mut base.mcp);
        }
        if let Some(c) = self.chat {
            c.apply(&mut base.chat);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LlmToml {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    request_timeout_ms: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}
impl LlmToml {
    fn apply(self, l: &mut LlmClientConfig) {
        if let Some(v) = self.base_url {
            l.base_url = v;
        }
        if let Some(v) = self.model {
            l.model = v;
        }
        if let Some(v) = self.api_key.filter(|s| !s.is_empty()) {
            l.api_key = Some(v);
        }
        if let Some(v) = self.request_timeout_ms {
            l.request_timeout_ms = v;
        }
        if let Some(v) = self.temperature {
            l.temperature = v.clamp(0.0, 2.0);
        }
        if let Some(v) = self.max_tokens {
            l.max_tokens = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct McpToml {
    name: Option<String>,
    command: Option<String>,
    args: Option<Vec<String>>,
    env: Option<std::collections::HashMap<String, String>>,
    cwd: Option<String>,
    protocol_version: Option<String>,
    request_timeout_ms: Option<u64>,
}
impl McpToml {
    fn apply(self, m: &mut McpServerConfig) {
        if let Some(v) = self.name {
            m.name = v;
        }
        if let Some(v) = self.command {
            m.command = v;
        }
        if let Some(v) = self.args {
            m.args = v;
        }
        if let Some(v) = self.env {
            m.env = Some(v);
        }
        if let Some(v) = self.cwd {
            m.cwd = Some(v);
        }
        if let Some(v) = self.protocol_version {
            m.protocol_version = Some(v);
        }
        if let Some(v) = self.request_timeout_ms {
            m.request_timeout_ms = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ChatToml {
    llm_timeout_ms: Option<u64>,
    tool_timeout_ms: Option<u64>,
}
impl ChatToml {
    fn apply(self, c: &mut OrchestratorOptions) {
        if let Some(v) = self.llm_timeout_ms {
            c.llm_timeout_ms = v;
        }
        if let Some(v) = self.tool_timeout_ms {
            c.tool_timeout_ms = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_follow_env() {
        std::env::set_var("LLM_MODEL", "openai/gpt-4o-mini");
        std::env::set_var("CHAT_TOOL_TIMEOUT_MS", "1500");
        let cfg = AppConfig::default();
        std::env::remove_var("LLM_MODEL");
        std::env::remove_var("CHAT_TOOL_TIMEOUT_MS");

        assert_eq!(cfg.llm.model, "openai/gpt-4o-mini");
        assert_eq!(cfg.chat.tool_timeout_ms, 1500);
    }

    #[test]
    #[serial]
    fn toml_overlays_only_given_fields() {
        std::env::remove_var("LLM_BASE_URL");
        let cfg = AppConfig::from_toml_str(
            r#"
            [llm]
            model = "openai/gpt-4.1-mini"
            temperature = 5.0

            [mcp]
            command = "/usr/local/bin/aicalendar-mcp"
            args = ["--verbose"]

            [chat]
            llm_timeout_ms = 10000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.llm.model, "openai/gpt-4.1-mini");
        assert_eq!(cfg.llm.temperature, 2.0);
        assert_eq!(cfg.llm.base_url, "https://models.github.ai/inference");
        assert_eq!(cfg.mcp.command, "/usr/local/bin/aicalendar-mcp");
        assert_eq!(cfg.mcp.args, vec!["--verbose".to_string()]);
        assert_eq!(cfg.chat.llm_timeout_ms, 10_000);
    }

    #[test]
    #[serial]
    fn bad_toml_is_a_config_error() {
        let err = AppConfig::from_toml_str("[llm\nmodel = 3").unwrap_err();
        assert!(matches!(err, CalendarError::Config(_)));
    }

    #[test]
    #[serial]
    fn load_without_file_uses_defaults() {
        std::env::set_var("AICALENDAR_CONFIG", "/nonexistent/aicalendar.toml");
        let cfg = AppConfig::load();
        std::env::remove_var("AICALENDAR_CONFIG");
        assert_eq!(cfg.mcp.name, "aicalendar-mcp");
    }
}
