use crate::config::StakingConfig;
use crate::models::{Projection, StakeMode, StakeRecommendation};

/// Minimum stake fraction worth recommending; below this the ticket isn't
/// actionable even though the arithmetic is non-zero (advisory only, §4.5).
const MIN_STAKE_FRACTION: f64 = 0.001;

pub struct StakeCalculator;

impl StakeCalculator {
    /// §4.5: flat or confidence-/value-weighted fractional Kelly, chosen by
    /// `cfg.mode`. `edge_pct = None` (NO_MARKET) is treated as non-positive
    /// edge — `value_weight` collapses to zero and dynamic stake is zero.
    pub fn calculate(
        projection: &Projection,
        price: Option<f64>,
        edge_pct: Option<f64>,
        cfg: &StakingConfig,
    ) -> StakeRecommendation {
        match cfg.mode {
            StakeMode::Flat => Self::flat(cfg),
            StakeMode::Dynamic => Self::dynamic(projection, price, edge_pct, cfg),
        }
    }

    fn flat(cfg: &StakingConfig) -> StakeRecommendation {
        let stake_amount = cfg.flat_size.min(cfg.bankroll);
        let stake_fraction = if cfg.bankroll > 0.0 {
            stake_amount / cfg.bankroll
        } else {
            0.0
        };
        StakeRecommendation {
            mode: StakeMode::Flat,
            stake_fraction,
            stake_amount,
            kelly_fraction: None,
            confidence_weight: None,
            value_weight: None,
            warnings: Self::warnings(stake_fraction, stake_amount, cfg),
        }
    }

    fn dynamic(
        projection: &Projection,
        price: Option<f64>,
        edge_pct: Option<f64>,
        cfg: &StakingConfig,
    ) -> StakeRecommendation {
        let p_hat = projection.p_hat;

        let kelly = match price {
            Some(o) if o > 1.0 && p_hat > 0.0 && p_hat < 1.0 => {
                let b = o - 1.0;
                let q = 1.0 - p_hat;
                cfg.kelly_fraction * ((b * p_hat - q) / b).max(0.0)
            }
            _ => 0.0,
        };

        let conf_weight = if projection.ci_width <= 0.0 {
            1.0
        } else {
            (1.0 - projection.ci_width / cfg.tau_conf).max(0.0)
        };

        // edge_pct and target_edge_pct are both percent, so this ratio is
        // dimensionless even though it reads like percent-over-percent.
        let value_weight = match edge_pct {
            Some(e) if e > 0.0 => (e / cfg.target_edge_pct).min(1.0),
            _ => 0.0,
        };

        let raw_fraction = kelly * conf_weight * value_weight;
        let stake_fraction = raw_fraction.min(cfg.stake_cap).max(0.0);
        let stake_amount = cfg.bankroll * stake_fraction;

        StakeRecommendation {
            mode: StakeMode::Dynamic,
            stake_fraction,
            stake_amount,
            kelly_fraction: Some(kelly),
            confidence_weight: Some(conf_weight),
            value_weight: Some(value_weight),
            warnings: Self::warnings(stake_fraction, stake_amount, cfg),
        }
    }

    /// Advisory, non-fatal validations (§4.5): these never error, they just
    /// annotate the recommendation for the caller to act on or ignore.
    fn warnings(stake_fraction: f64, stake_amount: f64, cfg: &StakingConfig) -> Vec<String> {
        let mut warnings = Vec::new();
        if stake_fraction > 0.0 && stake_fraction < MIN_STAKE_FRACTION {
            warnings.push("stake_below_minimum".to_string());
        }
        if stake_fraction > cfg.stake_cap {
            warnings.push("stake_exceeds_cap".to_string());
        }
        if stake_amount > cfg.bankroll {
            warnings.push("stake_exceeds_bankroll".to_string());
        }
        warnings
    }
}
