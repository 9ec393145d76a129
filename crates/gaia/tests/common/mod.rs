//! Common test utilities for gaia CLI integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Variables that would leak a real endpoint into the tests
const MODEL_ENV: &[&str] = &[
    "MODEL_ENDPOINT",
    "MODEL_KEY",
    "MODEL_NAME",
    "MODEL_API_VERSION",
    "OPENAI_API_KEY",
    "TAVILY_API_KEY",
    "RUST_LOG",
];

/// Isolated home directory for one test
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".gaia");

        Ok(Self { temp_dir, data_dir })
    }

    /// Default config location under the fake home
    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Path to a file in the temp directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Command with HOME and working directory pointed at the temp dir
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_gaia"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.current_dir(self.temp_dir.path());
        for var in MODEL_ENV {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Write a config whose model endpoint is `api_base`
    pub fn create_config(&self, api_base: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let config = serde_json::json!({
            "model": {
                "flavor": "openai",
                "api_key": "test-api-key",
                "api_base": api_base,
                "model": "test-model"
            },
            "agent": { "max_round_trips": 3 }
        });
        std::fs::write(self.config_file(), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
