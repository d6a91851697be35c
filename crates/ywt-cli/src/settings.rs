//! Layered run settings: defaults, then the TOML file, then env and flags

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use ywt_core::RunConfig;
use ywt_llm::LlmConfig;

/// Contents of the `--config` file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FileConfig {
    pub(crate) run: RunConfig,
    pub(crate) llm: LlmConfig,
}

impl FileConfig {
    pub(crate) fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration file")
    }

    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub(crate) personas: Option<usize>,
    pub(crate) step_limit: Option<usize>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) no_timeout: bool,
    pub(crate) concurrency: Option<usize>,
    pub(crate) model: Option<String>,
    pub(crate) api_key: Option<String>,
    pub(crate) base_url: Option<String>,
}

impl Overrides {
    /// Merge onto the file layer and validate the result
    pub(crate) fn apply(self, file: FileConfig) -> anyhow::Result<FileConfig> {
        let FileConfig { mut run, mut llm } = file;

        if let Some(n) = self.personas {
            run = run.with_target_entity_count(n);
        }
        if let Some(limit) = self.step_limit {
            run = run.with_step_limit(limit);
        }
        if let Some(workers) = self.concurrency {
            run = run.with_max_concurrency(workers);
        }
        if self.no_timeout {
            run = run.with_timeout(None);
        } else if let Some(secs) = self.timeout_secs {
            run = run.with_timeout(Some(Duration::from_secs(secs)));
        }

        if let Some(model) = self.model {
            llm.model = model;
        }
        if let Some(key) = self.api_key {
            llm.api_key = Some(key);
        }
        if let Some(url) = self.base_url {
            llm.base_url = url;
        }

        run.validate()?;
        Ok(FileConfig { run, llm })
    }
}
