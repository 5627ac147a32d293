use statrs::distribution::{Discrete, Poisson};

use crate::core::error::ScanError;
use crate::models::{Projection, TeamRateEstimate};

/// 95% two-sided z-score, per §4.2.
const Z_95: f64 = 1.96;

/// Combines independent home/away rate estimates into a single match
/// projection under a Poisson model for total first-half goals.
pub struct MatchProjector;

impl MatchProjector {
    /// Returns `None` when either input is `INSUFFICIENT_DATA`
    /// (UNPROJECTABLE, §4.2) — the fixture becomes non-evaluable, not an
    /// error.
    pub fn project(
        home: &TeamRateEstimate,
        away: &TeamRateEstimate,
    ) -> Option<Result<Projection, ScanError>> {
        let mu_home = home.mean_fh_goals?;
        let mu_away = away.mean_fh_goals?;

        let lambda_hat = (mu_home + mu_away) / 2.0;
        let p_hat = match prob_at_least_one(lambda_hat) {
            Some(p) => p,
            None => return Some(Err(ScanError::InvalidProjection { lambda_hat, p_hat: f64::NAN })),
        };

        if lambda_hat <= 0.0 || !(0.0..1.0).contains(&p_hat) {
            return Some(Err(ScanError::InvalidProjection { lambda_hat, p_hat }));
        }

        let n = home.observations.len() + away.observations.len();
        let variance = pooled_variance(&home.observations, &away.observations, lambda_hat);

        let se = if n > 0 { (variance / n as f64).sqrt() } else { 0.0 };
        let lambda_lo = (lambda_hat - Z_95 * se).max(0.0);
        let lambda_hi = lambda_hat + Z_95 * se;

        let p_lo = prob_at_least_one(lambda_lo).unwrap_or(0.0).clamp(0.0, 1.0);
        let p_hi = prob_at_least_one(lambda_hi).unwrap_or(1.0).clamp(0.0, 1.0);
        let ci_width = p_hi - p_lo;

        Some(Ok(Projection {
            lambda_hat,
            p_hat,
            p_lo,
            p_hi,
            ci_width,
            n_home: home.n,
            n_away: away.n,
        }))
    }
}

/// p = 1 − Pr(X=0) under a Poisson(λ) model for total first-half goals.
/// Uses `statrs`'s Poisson pmf rather than a hand-rolled `1 - exp(-λ)` so
/// the projection shares its distributional assumption with the rest of
/// the dependency stack instead of re-deriving it inline.
fn prob_at_least_one(lambda: f64) -> Option<f64> {
    if lambda <= 0.0 {
        return Some(0.0);
    }
    let poisson = Poisson::new(lambda).ok()?;
    Some(1.0 - poisson.pmf(0))
}

/// Pooled sample variance of the per-match total-first-half-goal
/// observations feeding μ_home and μ_away, both referenced against the
/// combined mean λ̂ (the same λ̂ that is plugged into p̂ = 1 − e^{−λ̂}).
///
/// σ² = Σ(x_i − λ̂)² / (n − 1) over the union of both observation sets.
fn pooled_variance(home_obs: &[f64], away_obs: &[f64], lambda_hat: f64) -> f64 {
    let n = home_obs.len() + away_obs.len();
    if n < 2 {
        return 0.0;
    }
    let sum_sq: f64 = home_obs
        .iter()
        .chain(away_obs.iter())
        .map(|x| (x - lambda_hat).powi(2))
        .sum();
    sum_sq / (n as f64 - 1.0)
}
