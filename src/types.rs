//! Core data types shared by the simulator, orchestrator and exporters.
//!
//! Field names serialize in the camelCase form used by saved run files.

use serde::{Deserialize, Serialize};

use crate::config::lenient;

/// Parameters shared across every path in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalParams {
    /// Trades simulated per path (zero yields only the initial point)
    #[serde(rename = "numberOfTrades", deserialize_with = "lenient::count")]
    pub number_of_trades: usize,
    #[serde(rename = "initialEquity", deserialize_with = "lenient::number")]
    pub initial_equity: f64,
    /// Cost per aggressive (market) fill
    #[serde(rename = "aggressiveCommission", deserialize_with = "lenient::number")]
    pub aggressive_commission: f64,
    /// Cost per passive (limit) fill, usually negative for a rebate
    #[serde(rename = "passiveCommission", deserialize_with = "lenient::number")]
    pub passive_commission: f64,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            number_of_trades: 10_000,
            initial_equity: 30_000.0,
            aggressive_commission: 0.15,
            passive_commission: -0.15,
        }
    }
}

/// One named strategy configuration that may spawn several paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderProfile {
    pub id: String,
    pub name: String,
    #[serde(rename = "pathCount", deserialize_with = "lenient::count")]
    pub path_count: usize,
    #[serde(rename = "riskRewardRatio", deserialize_with = "lenient::number")]
    pub risk_reward_ratio: f64,
    /// Probability of a winning trade, 0-1
    #[serde(rename = "winRate", deserialize_with = "lenient::number")]
    pub win_rate: f64,
    #[serde(rename = "riskTakenPerTradeTicks", deserialize_with = "lenient::number")]
    pub risk_taken_per_trade_ticks: f64,
    /// Fraction of fills that are passive rather than aggressive, 0-1
    #[serde(rename = "passiveAggressiveRate", deserialize_with = "lenient::number")]
    pub passive_aggressive_rate: f64,
    /// Ticks lost per slipped fill
    #[serde(deserialize_with = "lenient::number")]
    pub slippage: f64,
    /// Probability that a single fill slips, 0-1
    #[serde(rename = "executionSlippageErrorRate", deserialize_with = "lenient::number")]
    pub execution_slippage_error_rate: f64,
    #[serde(rename = "riskManagementErrorRate", deserialize_with = "lenient::number")]
    pub risk_management_error_rate: f64,
    /// Loss scale applied when a risk-management error fires (> 1)
    #[serde(rename = "riskManagementErrorMultiplier", deserialize_with = "lenient::number")]
    pub risk_management_error_multiplier: f64,
}

impl Default for TraderProfile {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Trader 1".to_string(),
            path_count: 5,
            risk_reward_ratio: 2.0,
            win_rate: 0.5,
            risk_taken_per_trade_ticks: 5.0,
            passive_aggressive_rate: 0.5,
            slippage: 1.0,
            execution_slippage_error_rate: 0.1,
            risk_management_error_rate: 0.05,
            risk_management_error_multiplier: 2.0,
        }
    }
}

impl TraderProfile {
    /// Default profile with a fresh random id, named after its 1-based position
    pub fn with_position(position: usize) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: id[..9].to_string(),
            name: format!("Trader {}", position),
            ..Default::default()
        }
    }

    /// Merge the stochastic fields of this profile with the run-wide params
    pub fn merge(&self, global: &GlobalParams) -> SimulationParams {
        SimulationParams {
            number_of_trades: global.number_of_trades,
            initial_equity: global.initial_equity,
            aggressive_commission: global.aggressive_commission,
            passive_commission: global.passive_commission,
            risk_reward_ratio: self.risk_reward_ratio,
            win_rate: self.win_rate,
            risk_taken_per_trade_ticks: self.risk_taken_per_trade_ticks,
            passive_aggressive_rate: self.passive_aggressive_rate,
            slippage: self.slippage,
            execution_slippage_error_rate: self.execution_slippage_error_rate,
            risk_management_error_rate: self.risk_management_error_rate,
            risk_management_error_multiplier: self.risk_management_error_multiplier,
        }
    }
}

/// Everything a single path needs: global params plus one profile's
/// stochastic fields (identity and path count stripped)
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub number_of_trades: usize,
    pub initial_equity: f64,
    pub aggressive_commission: f64,
    pub passive_commission: f64,
    pub risk_reward_ratio: f64,
    pub win_rate: f64,
    pub risk_taken_per_trade_ticks: f64,
    pub passive_aggressive_rate: f64,
    pub slippage: f64,
    pub execution_slippage_error_rate: f64,
    pub risk_management_error_rate: f64,
    pub risk_management_error_multiplier: f64,
}

/// One independent path to simulate
#[derive(Debug, Clone)]
pub struct SimulationTask {
    pub profile_id: String,
    /// "<profile name> #<path index>", unique within a run
    pub label: String,
    pub params: SimulationParams,
}

/// One point on an equity path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(rename = "tradeNumber")]
    pub trade_number: usize,
    pub equity: f64,
    pub pnl: f64,
}

/// Complete output of one simulated path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(rename = "traderId")]
    pub label: String,
    #[serde(rename = "profileId")]
    pub profile_id: String,
    pub data: Vec<TradeRecord>,
    #[serde(rename = "finalEquity")]
    pub final_equity: f64,
}

impl SimulationResult {
    pub fn initial_equity(&self) -> f64 {
        self.data.first().map(|r| r.equity).unwrap_or(self.final_equity)
    }

    /// Final equity minus starting equity
    pub fn net_pnl(&self) -> f64 {
        self.final_equity - self.initial_equity()
    }

    pub fn trade_count(&self) -> usize {
        self.data.len().saturating_sub(1)
    }
}
