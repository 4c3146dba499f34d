//! Run configuration via TOML files.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults of a full-size training run.
//!
//! ```toml
//! [model]
//! bit = 64
//! n_layers = 5
//!
//! [optimizer]
//! kind = "adam"
//! learning_rate = 1.2e-5
//!
//! [evaluation]
//! measure_retrieval = true
//! top_k = 100
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::inference::Execution;

/// Complete run configuration.
///
/// # Examples
///
/// ```
/// use cellhash_core::CellHashConfig;
///
/// let config = CellHashConfig::from_str("[model]\nbit = 32").unwrap();
/// assert_eq!(config.model.bit, 32);
/// assert_eq!(config.model.n_layers, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CellHashConfig {
    pub model: ModelConfig,
    pub loss: LossConfig,
    pub optimizer: OptimizerConfig,
    pub training: TrainingConfig,
    pub evaluation: EvaluationConfig,
}

impl CellHashConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;

        Ok(Self {
            model: ModelConfig::try_from(&raw.model)?,
            loss: LossConfig::try_from(&raw.loss)?,
            optimizer: OptimizerConfig::try_from(&raw.optimizer)?,
            training: TrainingConfig::try_from(&raw.training)?,
            evaluation: EvaluationConfig::try_from(&raw.evaluation)?,
        })
    }
}

/// Encoder and hash-center shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Code length; a power of two
    pub bit: usize,
    /// Encoder profile: 3, 4 or 5 hidden stages
    pub n_layers: usize,
    /// Multiplier on every hidden width
    pub width_scale: f32,
    /// Seed for parameter initialisation, sampled hash centers and shuffling
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            bit: default_bit(),
            n_layers: default_n_layers(),
            width_scale: default_width_scale(),
            seed: default_seed(),
        }
    }
}

impl ModelConfig {
    fn try_from(raw: &RawModel) -> Result<Self, ConfigError> {
        if raw.bit == 0 || !raw.bit.is_power_of_two() {
            return Err(ConfigError::Parse(format!(
                "model.bit must be a power of two, got {}",
                raw.bit
            )));
        }
        if !(3..=5).contains(&raw.n_layers) {
            return Err(ConfigError::Parse(format!(
                "model.n_layers must be 3, 4 or 5, got {}",
                raw.n_layers
            )));
        }
        if !raw.width_scale.is_finite() || raw.width_scale <= 0.0 {
            return Err(ConfigError::Parse("model.width_scale must be positive".into()));
        }

        Ok(Self {
            bit: raw.bit,
            n_layers: raw.n_layers,
            width_scale: raw.width_scale,
            seed: raw.seed,
        })
    }
}

/// Hash loss weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossConfig {
    /// Weight of the quantization term
    pub lambda: f32,
    /// Class-balance `beta`
    pub beta: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            lambda: default_lambda(),
            beta: default_beta(),
        }
    }
}

impl LossConfig {
    fn try_from(raw: &RawLoss) -> Result<Self, ConfigError> {
        if !raw.lambda.is_finite() || raw.lambda < 0.0 {
            return Err(ConfigError::Parse("loss.lambda must be ≥ 0".into()));
        }
        if !raw.beta.is_finite() || !(0.0..1.0).contains(&raw.beta) {
            return Err(ConfigError::Parse("loss.beta must lie in [0, 1)".into()));
        }

        Ok(Self {
            lambda: raw.lambda,
            beta: raw.beta,
        })
    }
}

/// Optimizer family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

/// Optimizer and step schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerConfig {
    pub kind: OptimizerKind,
    pub learning_rate: f32,
    pub weight_decay: f32,
    /// SGD only
    pub momentum: f32,
    /// Learning-rate multiplier applied every `decay_every` epochs
    pub lr_decay: f32,
    pub decay_every: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            kind: OptimizerKind::Adam,
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            momentum: default_momentum(),
            lr_decay: default_lr_decay(),
            decay_every: default_decay_every(),
        }
    }
}

impl OptimizerConfig {
    fn try_from(raw: &RawOptimizer) -> Result<Self, ConfigError> {
        let kind = match raw.kind.as_str() {
            "adam" => OptimizerKind::Adam,
            "sgd" => OptimizerKind::Sgd,
            other => {
                return Err(ConfigError::Parse(format!(
                    "optimizer.kind must be \"adam\" or \"sgd\", got \"{}\"",
                    other
                )))
            }
        };
        if !raw.learning_rate.is_finite() || raw.learning_rate <= 0.0 {
            return Err(ConfigError::Parse(
                "optimizer.learning_rate must be positive".into(),
            ));
        }
        if !raw.weight_decay.is_finite() || raw.weight_decay < 0.0 {
            return Err(ConfigError::Parse("optimizer.weight_decay must be ≥ 0".into()));
        }
        if !(0.0..1.0).contains(&raw.momentum) {
            return Err(ConfigError::Parse("optimizer.momentum must lie in [0, 1)".into()));
        }
        if !raw.lr_decay.is_finite() || raw.lr_decay <= 0.0 {
            return Err(ConfigError::Parse("optimizer.lr_decay must be positive".into()));
        }
        if raw.decay_every == 0 {
            return Err(ConfigError::Parse(
                "optimizer.decay_every must be non-zero".into(),
            ));
        }

        Ok(Self {
            kind,
            learning_rate: raw.learning_rate,
            weight_decay: raw.weight_decay,
            momentum: raw.momentum,
            lr_decay: raw.lr_decay,
            decay_every: raw.decay_every,
        })
    }
}

/// Epoch loop settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingConfig {
    pub max_epochs: usize,
    pub batch_size: usize,
    pub check_val_every_n_epoch: usize,
    /// Validations without median-F1 improvement before stopping
    pub early_stopping_patience: Option<usize>,
    pub log_dir: PathBuf,
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: default_max_epochs(),
            batch_size: default_batch_size(),
            check_val_every_n_epoch: default_check_val_every_n_epoch(),
            early_stopping_patience: None,
            log_dir: PathBuf::from(default_log_dir()),
            checkpoint_dir: None,
        }
    }
}

impl TrainingConfig {
    fn try_from(raw: &RawTraining) -> Result<Self, ConfigError> {
        if raw.max_epochs == 0 {
            return Err(ConfigError::Parse("training.max_epochs must be ≥ 1".into()));
        }
        if raw.batch_size == 0 {
            return Err(ConfigError::Parse("training.batch_size must be ≥ 1".into()));
        }
        if raw.check_val_every_n_epoch == 0 {
            return Err(ConfigError::Parse(
                "training.check_val_every_n_epoch must be ≥ 1".into(),
            ));
        }
        if raw.early_stopping_patience == Some(0) {
            return Err(ConfigError::Parse(
                "training.early_stopping_patience must be ≥ 1 when set".into(),
            ));
        }

        Ok(Self {
            max_epochs: raw.max_epochs,
            batch_size: raw.batch_size,
            check_val_every_n_epoch: raw.check_val_every_n_epoch,
            early_stopping_patience: raw.early_stopping_patience,
            log_dir: PathBuf::from(&raw.log_dir),
            checkpoint_dir: raw.checkpoint_dir.as_ref().map(PathBuf::from),
        })
    }
}

/// Evaluation and retrieval settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EvaluationConfig {
    pub measure_retrieval: bool,
    /// MAP cutoff; `None` ranks the whole database
    pub top_k: Option<usize>,
    pub execution: Execution,
    /// Where retrieval artifacts are written, when set
    pub output_dir: Option<PathBuf>,
}

impl EvaluationConfig {
    fn try_from(raw: &RawEvaluation) -> Result<Self, ConfigError> {
        if raw.top_k == Some(0) {
            return Err(ConfigError::Parse("evaluation.top_k must be ≥ 1 when set".into()));
        }
        let execution = match raw.execution.as_str() {
            "sequential" => Execution::Sequential,
            "parallel" => Execution::Parallel,
            other => {
                return Err(ConfigError::Parse(format!(
                    "evaluation.execution must be \"sequential\" or \"parallel\", got \"{}\"",
                    other
                )))
            }
        };

        Ok(Self {
            measure_retrieval: raw.measure_retrieval,
            top_k: raw.top_k,
            execution,
            output_dir: raw.output_dir.as_ref().map(PathBuf::from),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    model: RawModel,
    #[serde(default)]
    loss: RawLoss,
    #[serde(default)]
    optimizer: RawOptimizer,
    #[serde(default)]
    training: RawTraining,
    #[serde(default)]
    evaluation: RawEvaluation,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(default = "default_bit")]
    bit: usize,
    #[serde(default = "default_n_layers")]
    n_layers: usize,
    #[serde(default = "default_width_scale")]
    width_scale: f32,
    #[serde(default = "default_seed")]
    seed: u64,
}

impl Default for RawModel {
    fn default() -> Self {
        Self {
            bit: default_bit(),
            n_layers: default_n_layers(),
            width_scale: default_width_scale(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLoss {
    #[serde(default = "default_lambda")]
    lambda: f32,
    #[serde(default = "default_beta")]
    beta: f64,
}

impl Default for RawLoss {
    fn default() -> Self {
        Self {
            lambda: default_lambda(),
            beta: default_beta(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawOptimizer {
    #[serde(default = "default_optimizer_kind")]
    kind: String,
    #[serde(default = "default_learning_rate")]
    learning_rate: f32,
    #[serde(default = "default_weight_decay")]
    weight_decay: f32,
    #[serde(default = "default_momentum")]
    momentum: f32,
    #[serde(default = "default_lr_decay")]
    lr_decay: f32,
    #[serde(default = "default_decay_every")]
    decay_every: usize,
}

impl Default for RawOptimizer {
    fn default() -> Self {
        Self {
            kind: default_optimizer_kind(),
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            momentum: default_momentum(),
            lr_decay: default_lr_decay(),
            decay_every: default_decay_every(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTraining {
    #[serde(default = "default_max_epochs")]
    max_epochs: usize,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "default_check_val_every_n_epoch")]
    check_val_every_n_epoch: usize,
    #[serde(default)]
    early_stopping_patience: Option<usize>,
    #[serde(default = "default_log_dir")]
    log_dir: String,
    #[serde(default)]
    checkpoint_dir: Option<String>,
}

impl Default for RawTraining {
    fn default() -> Self {
        Self {
            max_epochs: default_max_epochs(),
            batch_size: default_batch_size(),
            check_val_every_n_epoch: default_check_val_every_n_epoch(),
            early_stopping_patience: None,
            log_dir: default_log_dir(),
            checkpoint_dir: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    #[serde(default)]
    measure_retrieval: bool,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default = "default_execution")]
    execution: String,
    #[serde(default)]
    output_dir: Option<String>,
}

impl Default for RawEvaluation {
    fn default() -> Self {
        Self {
            measure_retrieval: false,
            top_k: None,
            execution: default_execution(),
            output_dir: None,
        }
    }
}

fn default_bit() -> usize {
    64
}

fn default_n_layers() -> usize {
    5
}

fn default_width_scale() -> f32 {
    1.0
}

fn default_seed() -> u64 {
    42
}

fn default_lambda() -> f32 {
    0.001
}

fn default_beta() -> f64 {
    0.9999
}

fn default_optimizer_kind() -> String {
    "adam".to_string()
}

fn default_learning_rate() -> f32 {
    1.2e-5
}

fn default_weight_decay() -> f32 {
    1e-4
}

fn default_momentum() -> f32 {
    0.9
}

fn default_lr_decay() -> f32 {
    0.5
}

fn default_decay_every() -> usize {
    100
}

fn default_max_epochs() -> usize {
    301
}

fn default_batch_size() -> usize {
    128
}

fn default_check_val_every_n_epoch() -> usize {
    10
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_execution() -> String {
    "sequential".to_string()
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {}", err),
            ConfigError::Parse(err) => write!(f, "Parse error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}
