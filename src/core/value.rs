use crate::config::ThresholdConfig;
use crate::models::{OddsQuote, Projection, Signal};

/// Reason codes are emitted in this fixed order, naming every failing gate.
const GATE_ORDER: [&str; 4] = ["lambda", "samples", "edge", "ci"];

pub struct ValueDetector;

pub struct ValueOutcome {
    pub fair_odds: f64,
    pub edge_pct: Option<f64>,
    pub signal: Signal,
}

impl ValueDetector {
    /// §4.4: fair odds, edge %, and the four stage gates. `quote` is `None`
    /// when `NO_MARKET` — `edge_ok` is then forced false but the other
    /// three gates are still evaluated and the result is still emitted.
    pub fn detect(
        projection: &Projection,
        quote: Option<&OddsQuote>,
        cfg: &ThresholdConfig,
    ) -> ValueOutcome {
        let fair_odds = 1.0 / projection.p_hat;

        let edge_pct = quote.map(|q| 100.0 * (q.price * projection.p_hat - 1.0));

        let lambda_ok = projection.lambda_hat >= cfg.lambda_threshold;
        let samples_ok =
            projection.n_home >= cfg.min_samples_home && projection.n_away >= cfg.min_samples_away;
        let edge_ok = edge_pct.map_or(false, |e| e >= cfg.min_edge_pct);
        let ci_ok = projection.ci_width <= cfg.max_prob_ci_width;

        let gates = [lambda_ok, samples_ok, edge_ok, ci_ok];
        let overall = gates.iter().all(|g| *g);
        let reasons = GATE_ORDER
            .iter()
            .zip(gates.iter())
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.to_string())
            .collect();

        ValueOutcome {
            fair_odds,
            edge_pct,
            signal: Signal {
                lambda_ok,
                samples_ok,
                edge_ok,
                ci_ok,
                overall,
                reasons,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cfg() -> ThresholdConfig {
        ThresholdConfig {
            lambda_threshold: 1.5,
            min_samples_home: 8,
            min_samples_away: 8,
            min_edge_pct: 3.0,
            max_prob_ci_width: 0.20,
            min_matches_required: 4,
        }
    }

    fn projection(lambda_hat: f64, n_home: usize, n_away: usize, ci_width: f64) -> Projection {
        let p_hat = 1.0 - (-lambda_hat).exp();
        Projection {
            lambda_hat,
            p_hat,
            p_lo: p_hat - ci_width / 2.0,
            p_hi: p_hat + ci_width / 2.0,
            ci_width,
            n_home,
            n_away,
        }
    }

    fn quote(price: f64) -> OddsQuote {
        OddsQuote {
            price,
            provider_id: "mock".into(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn s1_low_lambda_fails_only_lambda_gate() {
        // Home μ=1.1, away μ=1.0 => λ̂ = 1.05, below 1.5 threshold. Odds chosen
        // so every other gate passes — only "lambda" should fail.
        let proj = projection(1.05, 10, 12, 0.10);
        let outcome = ValueDetector::detect(&proj, Some(&quote(1.70)), &cfg());
        assert!(!outcome.signal.overall);
        assert_eq!(outcome.signal.reasons, vec!["lambda"]);
    }

    #[test]
    fn s2_all_gates_pass() {
        let proj = projection(1.70, 12, 10, 0.11);
        let outcome = ValueDetector::detect(&proj, Some(&quote(1.40)), &cfg());
        assert!(outcome.signal.overall);
        assert!(outcome.signal.reasons.is_empty());
        assert!((outcome.fair_odds - 1.0 / proj.p_hat).abs() < 1e-9);
        let expected_edge = 100.0 * (1.40 * proj.p_hat - 1.0);
        assert!((outcome.edge_pct.unwrap() - expected_edge).abs() < 1e-6);
    }

    #[test]
    fn s3_no_market_forces_edge_false_but_still_emits() {
        let proj = projection(1.70, 12, 10, 0.11);
        let outcome = ValueDetector::detect(&proj, None, &cfg());
        assert!(outcome.edge_pct.is_none());
        assert!(!outcome.signal.edge_ok);
        assert!(!outcome.signal.overall);
    }

    #[test]
    fn s4_low_samples_reason_present() {
        let proj = projection(2.0, 5, 20, 0.10);
        let outcome = ValueDetector::detect(&proj, Some(&quote(1.3)), &cfg());
        assert!(!outcome.signal.samples_ok);
        assert!(outcome.signal.reasons.contains(&"samples".to_string()));
    }

    #[test]
    fn all_four_gates_always_present() {
        let proj = projection(0.5, 1, 1, 0.9);
        let outcome = ValueDetector::detect(&proj, None, &cfg());
        assert!(!outcome.signal.lambda_ok);
        assert!(!outcome.signal.samples_ok);
        assert!(!outcome.signal.edge_ok);
        assert!(!outcome.signal.ci_ok);
    }
}
