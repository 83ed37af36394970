//! `duet.toml` configuration

use anyhow::{Context, Result, anyhow, bail};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "duet.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuetConfig {
    pub llm: LlmConfig,
    pub knowledge: KnowledgeConfig,
    pub orchestrator: OrchestratorConfig,
}

/// OpenAI-compatible endpoint shared by both agents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: duet_core::providers::openai::DEFAULT_BASE_URL.to_string(),
            api_key: "${OPENAI_API_KEY}".to_string(),
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// API key, or an error naming what is missing
    pub fn require_api_key(&self) -> Result<&str> {
        if self.api_key.trim().is_empty() {
            bail!("OPENAI_API_KEY not found in .env file or environment variables");
        }
        Ok(&self.api_key)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub agent_name: String,
    pub bind: String,
    pub data_dir: PathBuf,
    /// Empty keeps the index in memory
    pub index_dir: String,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub model: String,
    /// Answer with the LLM; otherwise return retrieved passages verbatim
    pub synthesize: bool,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            agent_name: "KnowledgeAgentLlama".to_string(),
            bind: "0.0.0.0:8001".to_string(),
            data_dir: PathBuf::from("data"),
            index_dir: String::new(),
            top_k: 3,
            chunk_size: 1000,
            chunk_overlap: 200,
            model: "gpt-3.5-turbo".to_string(),
            synthesize: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub agent_name: String,
    pub knowledge_agent_name: String,
    pub knowledge_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_iterations: usize,
    pub request_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agent_name: "OrchestratorAgentLangchain".to_string(),
            knowledge_agent_name: "KnowledgeAgentLlama".to_string(),
            knowledge_url: "http://localhost:8001/a2a_exchange".to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.0,
            max_iterations: 8,
            request_timeout_secs: 30,
        }
    }
}

impl OrchestratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DuetConfig {
    /// Load `path`, or `duet.toml` in the working directory if it exists,
    /// or defaults. `${VAR}` references are expanded from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Self::from_toml("");
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Self::from_toml_with(content, |name| std::env::var(name).ok())
    }

    fn from_toml_with(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.expand_env(&lookup)?;
        Ok(config)
    }

    fn expand_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        let fields = [
            &mut self.llm.base_url,
            &mut self.llm.api_key,
            &mut self.knowledge.agent_name,
            &mut self.knowledge.bind,
            &mut self.knowledge.index_dir,
            &mut self.knowledge.model,
            &mut self.orchestrator.agent_name,
            &mut self.orchestrator.knowledge_agent_name,
            &mut self.orchestrator.knowledge_url,
            &mut self.orchestrator.model,
        ];
        for field in fields {
            *field = expand_vars(field, lookup)?;
        }
        let data_dir = expand_vars(&self.knowledge.data_dir.to_string_lossy(), lookup)?;
        self.knowledge.data_dir = PathBuf::from(data_dir);
        Ok(())
    }
}

/// Replace `${NAME}` with the value of `NAME`; unset variables expand to
/// the empty string. Text without a closing brace is kept as is.
fn expand_vars(text: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| anyhow!("Invalid regex: {}", e))?;

    let expanded = re.replace_all(text, |caps: &Captures| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| {
            warn!("Environment variable '{}' is not set", name);
            String::new()
        })
    });
    Ok(expanded.into_owned())
}
