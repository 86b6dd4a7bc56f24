//! Serializable backtest configuration.
//!
//! A `BacktestConfig` is everything needed to reproduce one run: ticker, date
//! range, strategy selector plus parameters, and the account settings. It is
//! validated before any data is fetched; an invalid config never reaches the
//! simulator.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quantlab_core::engine::EngineConfig;
use quantlab_core::signals::{SignalError, Strategy, StrategyType};
use quantlab_core::sizer::DEFAULT_RISK_FRACTION;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// The only bar timeframe the engine simulates.
pub const DAILY_TIMEFRAME: &str = "1d";

/// Errors from config parsing and validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("ticker must not be empty")]
    EmptyTicker,
    #[error("end_date ({end}) must be after start_date ({start})")]
    DateOrder { start: NaiveDate, end: NaiveDate },
    #[error("initial_cash must be positive, got {0}")]
    InitialCash(f64),
    #[error("commission_per_unit must be non-negative, got {0}")]
    Commission(f64),
    #[error("risk_fraction must be in (0, 1], got {0}")]
    RiskFraction(f64),
    #[error("unsupported timeframe '{0}' (only \"1d\" is supported)")]
    Timeframe(String),
    #[error("strategy error: {0}")]
    Strategy(#[from] SignalError),
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Strategy name, e.g. "sma_cross" or "donchian".
    pub strategy_type: String,
    #[serde(default)]
    pub strategy_params: BTreeMap<String, f64>,
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    #[serde(default, alias = "commission")]
    pub commission_per_unit: f64,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_risk_fraction")]
    pub risk_fraction: f64,
}

fn default_initial_cash() -> f64 {
    100_000.0
}

fn default_timeframe() -> String {
    DAILY_TIMEFRAME.to_string()
}

fn default_risk_fraction() -> f64 {
    DEFAULT_RISK_FRACTION
}

impl BacktestConfig {
    /// Config with every optional field at its default.
    pub fn new(
        ticker: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        strategy_type: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            start_date,
            end_date,
            strategy_type: strategy_type.into(),
            strategy_params: BTreeMap::new(),
            initial_cash: default_initial_cash(),
            commission_per_unit: 0.0,
            timeframe: default_timeframe(),
            risk_fraction: default_risk_fraction(),
        }
    }

    /// Builder-style strategy parameter.
    pub fn param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.strategy_params.insert(key.into(), value);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every field constraint and that the strategy can be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticker.trim().is_empty() {
            return Err(ConfigError::EmptyTicker);
        }
        if self.end_date <= self.start_date {
            return Err(ConfigError::DateOrder {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(ConfigError::InitialCash(self.initial_cash));
        }
        if !(self.commission_per_unit.is_finite() && self.commission_per_unit >= 0.0) {
            return Err(ConfigError::Commission(self.commission_per_unit));
        }
        if !(self.risk_fraction > 0.0 && self.risk_fraction <= 1.0) {
            return Err(ConfigError::RiskFraction(self.risk_fraction));
        }
        if self.timeframe != DAILY_TIMEFRAME {
            return Err(ConfigError::Timeframe(self.timeframe.clone()));
        }
        self.strategy()?;
        Ok(())
    }

    pub fn strategy_kind(&self) -> Result<StrategyType, ConfigError> {
        Ok(StrategyType::from_str(&self.strategy_type)?)
    }

    /// Build the typed strategy from `strategy_type` and `strategy_params`.
    pub fn strategy(&self) -> Result<Strategy, ConfigError> {
        Ok(Strategy::from_params(
            self.strategy_kind()?,
            &self.strategy_params,
        )?)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.ticker.trim().to_uppercase(), self.initial_cash)
            .with_commission(self.commission_per_unit)
            .with_risk_fraction(self.risk_fraction)
    }

    /// Deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
