//! Path simulator
//!
//! Walks one equity path trade by trade. Every decision (outcome, risk
//! error, slippage per fill, passive/aggressive per fill) is its own uniform
//! draw against its own probability, so the effects compound the same way
//! they would on a real account.

use rand::Rng;

use crate::types::{SimulationParams, SimulationResult, TradeRecord};

/// Price increment of the simulated instrument
pub const TICK_SIZE: f64 = 0.01;

/// Shares traded per position
pub const POSITION_SIZE: f64 = 100.0;

/// Currency value of one tick for the whole position ($1 for 100 shares)
pub const TICK_VALUE: f64 = TICK_SIZE * POSITION_SIZE;

/// Breakdown of a single simulated trade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeOutcome {
    pub is_win: bool,
    /// Loss was scaled by the risk-management error multiplier
    pub risk_error: bool,
    /// Slipped fills, 0-2
    pub slippage_hits: u8,
    /// Passive fills, 0-2 (the rest were aggressive)
    pub passive_fills: u8,
    /// Tick PnL before slippage
    pub gross_ticks: f64,
    /// Tick PnL after slippage
    pub net_ticks: f64,
    pub commission: f64,
    /// Currency PnL after slippage and commission
    pub pnl: f64,
}

/// Simulate one trade.
///
/// Draw order: outcome, risk error (losses only), entry slippage, exit
/// slippage, entry fill side, exit fill side.
pub fn simulate_trade<R: Rng + ?Sized>(params: &SimulationParams, rng: &mut R) -> TradeOutcome {
    let is_win = rng.gen::<f64>() < params.win_rate;

    let mut risk_error = false;
    let gross_ticks = if is_win {
        params.risk_taken_per_trade_ticks * params.risk_reward_ratio
    } else {
        let mut current_risk = params.risk_taken_per_trade_ticks;
        if rng.gen::<f64>() < params.risk_management_error_rate {
            current_risk *= params.risk_management_error_multiplier;
            risk_error = true;
        }
        -current_risk
    };

    let mut slippage_hits = 0u8;
    let mut slippage_ticks = 0.0;
    for _ in 0..2 {
        if rng.gen::<f64>() < params.execution_slippage_error_rate {
            slippage_ticks += params.slippage;
            slippage_hits += 1;
        }
    }
    let net_ticks = gross_ticks - slippage_ticks;

    let mut passive_fills = 0u8;
    let mut commission = 0.0;
    for _ in 0..2 {
        if rng.gen::<f64>() < params.passive_aggressive_rate {
            commission += params.passive_commission;
            passive_fills += 1;
        } else {
            commission += params.aggressive_commission;
        }
    }

    TradeOutcome {
        is_win,
        risk_error,
        slippage_hits,
        passive_fills,
        gross_ticks,
        net_ticks,
        commission,
        pnl: net_ticks * TICK_VALUE - commission,
    }
}

const MAX_PREALLOCATED_RECORDS: usize = 1 << 20;

/// Simulate a full equity path.
///
/// The result always holds `number_of_trades + 1` records, the first being
/// the untouched starting equity.
pub fn simulate<R: Rng + ?Sized>(
    params: &SimulationParams,
    label: &str,
    profile_id: &str,
    rng: &mut R,
) -> SimulationResult {
    let mut equity = params.initial_equity;
    let capacity = params.number_of_trades.saturating_add(1);
    let mut data = Vec::with_capacity(capacity.min(MAX_PREALLOCATED_RECORDS));

    data.push(TradeRecord {
        trade_number: 0,
        equity,
        pnl: 0.0,
    });

    for trade_number in 1..=params.number_of_trades {
        let outcome = simulate_trade(params, rng);
        equity += outcome.pnl;
        data.push(TradeRecord {
            trade_number,
            equity,
            pnl: outcome.pnl,
        });
    }

    SimulationResult {
        label: label.to_string(),
        profile_id: profile_id.to_string(),
        data,
        final_equity: equity,
    }
}

/// Simulate a path with a fresh generator seeded from OS entropy
pub fn simulate_with_entropy(params: &SimulationParams, label: &str, profile_id: &str) -> SimulationResult {
    use rand::SeedableRng;

    let mut rng = rand::rngs::StdRng::from_entropy();
    simulate(params, label, profile_id, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GlobalParams, TraderProfile};
    use rand::rngs::mock::StepRng;
    use rand::RngCore;

    /// Replays a fixed list of unit draws
    struct ScriptedRng {
        draws: Vec<f64>,
        next: usize,
    }

    impl ScriptedRng {
        fn new(draws: &[f64]) -> Self {
            Self { draws: draws.to_vec(), next: 0 }
        }
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            (self.next_u64() >> 32) as u32
        }

        fn next_u64(&mut self) -> u64 {
            let draw = self.draws[self.next % self.draws.len()];
            self.next += 1;
            // f64 sampling keeps the top 53 bits
            ((draw * (1u64 << 53) as f64) as u64) << 11
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for chunk in dest.chunks_mut(8) {
                let bytes = self.next_u64().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    fn params() -> SimulationParams {
        let global = GlobalParams {
            number_of_trades: 100,
            initial_equity: 1000.0,
            aggressive_commission: 0.15,
            passive_commission: -0.15,
        };
        TraderProfile::default().merge(&global)
    }

    /// Every draw is 0.0: everything with a non-zero probability fires
    fn all_hits() -> StepRng {
        StepRng::new(0, 0)
    }

    /// Every draw is just under 1.0: nothing below probability 1 fires
    fn all_misses() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn test_path_length_and_initial_point() {
        let result = simulate(&params(), "T #1", "p1", &mut rand::thread_rng());

        assert_eq!(result.data.len(), 101);
        assert_eq!(result.data[0], TradeRecord { trade_number: 0, equity: 1000.0, pnl: 0.0 });
        assert_eq!(result.label, "T #1");
        assert_eq!(result.profile_id, "p1");
    }

    #[test]
    fn test_running_sum_invariant() {
        let result = simulate(&params(), "T #1", "p1", &mut rand::thread_rng());

        for i in 1..result.data.len() {
            let prev = result.data[i - 1];
            let cur = result.data[i];
            assert_eq!(cur.trade_number, i);
            assert_eq!(cur.equity, prev.equity + cur.pnl);
        }
        assert_eq!(result.final_equity, result.data.last().unwrap().equity);
    }

    #[test]
    fn test_zero_trades_yields_single_point() {
        let p = SimulationParams { number_of_trades: 0, ..params() };
        let result = simulate(&p, "T #1", "p1", &mut rand::thread_rng());

        assert_eq!(result.data.len(), 1);
        assert_eq!(result.final_equity, 1000.0);
    }

    #[test]
    fn test_certain_win_gross_ticks() {
        let p = SimulationParams {
            win_rate: 1.0,
            risk_management_error_rate: 0.0,
            ..params()
        };
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let outcome = simulate_trade(&p, &mut rng);
            assert!(outcome.is_win);
            assert_eq!(outcome.gross_ticks, 10.0); // 5 ticks * 2.0 R:R
        }
    }

    #[test]
    fn test_certain_loss_gross_ticks() {
        let p = SimulationParams {
            win_rate: 0.0,
            risk_management_error_rate: 0.0,
            ..params()
        };
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let outcome = simulate_trade(&p, &mut rng);
            assert!(!outcome.is_win);
            assert!(!outcome.risk_error);
            assert_eq!(outcome.gross_ticks, -5.0);
        }
    }

    #[test]
    fn test_all_draws_hit() {
        // Win, both fills slip, both fills passive
        let outcome = simulate_trade(&params(), &mut all_hits());

        assert!(outcome.is_win);
        assert_eq!(outcome.slippage_hits, 2);
        assert_eq!(outcome.passive_fills, 2);
        assert_eq!(outcome.net_ticks, 8.0); // 10 - 2 * 1
        assert_eq!(outcome.commission, -0.3);
        assert!((outcome.pnl - 8.3).abs() < 1e-12);
    }

    #[test]
    fn test_all_draws_miss() {
        // Loss without risk error, no slippage, both fills aggressive
        let outcome = simulate_trade(&params(), &mut all_misses());

        assert!(!outcome.is_win);
        assert!(!outcome.risk_error);
        assert_eq!(outcome.slippage_hits, 0);
        assert_eq!(outcome.passive_fills, 0);
        assert_eq!(outcome.net_ticks, -5.0);
        assert!((outcome.pnl - (-5.3)).abs() < 1e-12);
    }

    #[test]
    fn test_risk_error_scales_loss() {
        // Loss, risk error fires, entry slips, exit clean, entry passive, exit aggressive
        let mut rng = ScriptedRng::new(&[0.9, 0.01, 0.05, 0.5, 0.2, 0.8]);
        let outcome = simulate_trade(&params(), &mut rng);

        assert!(!outcome.is_win);
        assert!(outcome.risk_error);
        assert_eq!(outcome.gross_ticks, -10.0);
        assert_eq!(outcome.slippage_hits, 1);
        assert_eq!(outcome.net_ticks, -11.0);
        assert_eq!(outcome.passive_fills, 1);
        assert_eq!(outcome.commission, 0.0);
        assert_eq!(outcome.pnl, -11.0);
        assert_eq!(rng.next, 6);
    }

    #[test]
    fn test_win_skips_risk_error_draw() {
        // Win consumes five draws: outcome, two slippage checks, two fill sides
        let mut rng = ScriptedRng::new(&[0.1, 0.9, 0.9, 0.9, 0.9]);
        let outcome = simulate_trade(&params(), &mut rng);

        assert!(outcome.is_win);
        assert_eq!(outcome.slippage_hits, 0);
        assert_eq!(outcome.passive_fills, 0);
        assert!((outcome.pnl - 9.7).abs() < 1e-12);
        assert_eq!(rng.next, 5);
    }

    #[test]
    fn test_deterministic_given_stream() {
        let p = params();
        let a = simulate(&p, "T #1", "p1", &mut StepRng::new(7, 0x9E37_79B9_7F4A_7C15));
        let b = simulate(&p, "T #1", "p1", &mut StepRng::new(7, 0x9E37_79B9_7F4A_7C15));
        assert_eq!(a, b);
    }

    #[test]
    fn test_entropy_paths_are_independent() {
        let p = params();
        let a = simulate_with_entropy(&p, "T #1", "p1");
        let b = simulate_with_entropy(&p, "T #2", "p1");

        assert_eq!(a.data.len(), b.data.len());
        // 100 trades with six coin flips each; identical paths would be astronomically unlikely
        assert_ne!(a.data, b.data);
    }
}
