//! Engine configuration.
//!
//! Budgets for generation and evaluation, loadable from a TOML file:
//!
//! ```toml
//! [grammar]
//! max_depth = 64
//! generate_retries = 1000
//!
//! [vm]
//! max_steps = 2048
//! max_outputs = 256
//! min_lp = -10.0
//! max_recursion = 64
//! max_run_program = 10000
//! ```
//!
//! Every field is optional; missing fields take their `Default` values.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// Budgets for tree generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Maximum tree depth before generation raises depth-exceeded.
    pub max_depth: usize,

    /// Attempts made by `generate` before depth-exceeded becomes fatal.
    pub generate_retries: usize,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            generate_retries: 1000,
        }
    }
}

/// Budgets for a single evaluation through a `VirtualMachinePool`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Total number of states the pool will run.
    pub max_steps: usize,
    /// Number of completed outputs after which the pool stops.
    pub max_outputs: usize,
    /// Paths whose log-probability falls below this floor are never enqueued.
    pub min_lp: f64,
    /// Recursive calls allowed along one path.
    pub max_recursion: usize,
    /// Instructions one path may execute.
    pub max_run_program: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_steps: 2048,
            max_outputs: 256,
            min_lp: -10.0,
            max_recursion: 64,
            max_run_program: 10_000,
        }
    }
}

impl VmConfig {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_outputs(mut self, max_outputs: usize) -> Self {
        self.max_outputs = max_outputs;
        self
    }

    pub fn with_min_lp(mut self, min_lp: f64) -> Self {
        self.min_lp = min_lp;
        self
    }

    pub fn with_max_recursion(mut self, max_recursion: usize) -> Self {
        self.max_recursion = max_recursion;
        self
    }

    pub fn with_max_run_program(mut self, max_run_program: usize) -> Self {
        self.max_run_program = max_run_program;
        self
    }

    /// No pruning: useful when a test needs the full output distribution.
    pub fn unbounded() -> Self {
        Self {
            max_steps: usize::MAX,
            max_outputs: usize::MAX,
            min_lp: f64::NEG_INFINITY,
            ..Self::default()
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grammar: GrammarConfig,
    pub vm: VmConfig,
}

/// Errors that can occur while loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// File could not be read
    Io(std::io::Error),
    /// File is not valid TOML for this schema
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Failed to read config: {}", e),
            Self::Parse(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e)
    }
}

impl EngineConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
