use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{ScanConfig, StakingConfig, ThresholdConfig};
use crate::core::error::ScanError;
use crate::core::estimator::TeamRateEstimator;
use crate::core::odds::OddsResolver;
use crate::core::projector::MatchProjector;
use crate::core::stake::StakeCalculator;
use crate::core::value::ValueDetector;
use crate::models::{Fixture, FixtureStatus, ScanResult, ScanSkip, Venue};
use crate::providers::FixtureProvider;

/// Cooperative cancellation signal for one scan (§5). Cloning shares the
/// same flag; any clone can request cancellation, every clone observes it.
#[derive(Clone, Default)]
pub struct ScanCancellation(Arc<AtomicBool>);

impl ScanCancellation {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a scan actually returns: the evaluable fixtures plus a record of
/// everything that was skipped and why (§7 propagation rule — the scan
/// always returns the aggregate, individual failures never abort it).
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ScanOutcome {
    pub results: Vec<ScanResult>,
    pub skips: Vec<ScanSkip>,
}

/// Drives a horizon of fixtures through estimate → project → resolve odds
/// → detect value → stake, with bounded fan-out (§4.6, §5).
pub struct ScanOrchestrator<FP: FixtureProvider + 'static> {
    fixture_provider: Arc<FP>,
    odds_resolver: Arc<OddsResolver>,
    thresholds: ThresholdConfig,
    staking: StakingConfig,
    scan: ScanConfig,
}

impl<FP: FixtureProvider + 'static> ScanOrchestrator<FP> {
    pub fn new(
        fixture_provider: Arc<FP>,
        odds_resolver: OddsResolver,
        thresholds: ThresholdConfig,
        staking: StakingConfig,
        scan: ScanConfig,
    ) -> Self {
        Self {
            fixture_provider,
            odds_resolver: Arc::new(odds_resolver),
            thresholds,
            staking,
            scan,
        }
    }

    pub async fn scan_today(&self) -> ScanOutcome {
        let now = Utc::now();
        let start = now.date_naive().and_hms_opt(0, 0, 0).unwrap();
        let end = now.date_naive().and_hms_opt(23, 59, 59).unwrap();
        self.scan_window(Utc.from_utc_datetime(&start), Utc.from_utc_datetime(&end), None)
            .await
    }

    pub async fn scan_date(&self, date: NaiveDate) -> ScanOutcome {
        let start = date.and_hms_opt(0, 0, 0).unwrap();
        let end = date.and_hms_opt(23, 59, 59).unwrap();
        self.scan_window(Utc.from_utc_datetime(&start), Utc.from_utc_datetime(&end), None)
            .await
    }

    pub async fn scan_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> ScanOutcome {
        self.scan_window(start, end, None).await
    }

    pub async fn scan_today_cancellable(&self, cancel: ScanCancellation) -> ScanOutcome {
        let now = Utc::now();
        let start = now.date_naive().and_hms_opt(0, 0, 0).unwrap();
        let end = now.date_naive().and_hms_opt(23, 59, 59).unwrap();
        self.scan_window(
            Utc.from_utc_datetime(&start),
            Utc.from_utc_datetime(&end),
            Some(cancel),
        )
        .await
    }

    /// Default scan horizon (§6 `scan_horizon_days`) starting today.
    pub async fn scan_horizon(&self) -> ScanOutcome {
        let start = Utc::now();
        let end = start + ChronoDuration::days(self.scan.scan_horizon_days);
        self.scan_window(start, end, None).await
    }

    pub async fn scan_fixture(&self, fixture: &Fixture) -> Option<ScanResult> {
        let estimator = TeamRateEstimator::new(
            self.fixture_provider.clone(),
            self.thresholds.min_matches_required,
        );
        match self.evaluate(&estimator, fixture).await {
            Ok(Some(result)) => Some(result),
            _ => None,
        }
    }

    async fn scan_window(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        cancel: Option<ScanCancellation>,
    ) -> ScanOutcome {
        tracing::info!("scan starting for window {window_start} .. {window_end}");

        let fixtures = match self
            .fixture_provider
            .list_fixtures(window_start, window_end, Some(FixtureStatus::Scheduled))
            .await
        {
            Ok(f) => f,
            Err(e) => {
                tracing::error!("fixture discovery failed: {e}");
                return ScanOutcome::default();
            }
        };

        // One memoization table per scan (§5, §9) — never shared across scans.
        let estimator = Arc::new(TeamRateEstimator::new(
            self.fixture_provider.clone(),
            self.thresholds.min_matches_required,
        ));
        let semaphore = Arc::new(Semaphore::new(self.scan.max_concurrency.max(1)));
        let cancel = cancel.unwrap_or_default();

        let mut tasks = JoinSet::new();
        for fixture in fixtures {
            let estimator = estimator.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let odds_resolver = self.odds_resolver.clone();
            let thresholds = self.thresholds.clone();
            let staking = self.staking.clone();

            tasks.spawn(async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return None,
                };
                if cancel.is_cancelled() {
                    return None;
                }
                Some(evaluate_fixture(&estimator, &odds_resolver, &thresholds, &staking, &fixture).await)
            });
        }

        let mut results = Vec::new();
        let mut skips = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(Ok(Some(result)))) => results.push(result),
                Ok(Some(Ok(None))) => {} // unreachable: evaluate_fixture always resolves or skips
                Ok(Some(Err(skip))) => skips.push(skip),
                Ok(None) => {} // cancelled before or during evaluation
                Err(e) => tracing::error!("fixture task panicked: {e}"),
            }
        }

        results.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then_with(|| a.fixture_id.cmp(&b.fixture_id)));

        tracing::info!(
            "scan complete: {} results, {} skipped",
            results.len(),
            skips.len()
        );
        ScanOutcome { results, skips }
    }

    async fn evaluate(
        &self,
        estimator: &TeamRateEstimator<FP>,
        fixture: &Fixture,
    ) -> Result<Option<ScanResult>, ScanSkip> {
        evaluate_fixture(
            estimator,
            &self.odds_resolver,
            &self.thresholds,
            &self.staking,
            fixture,
        )
        .await
    }
}

/// One fixture's full pipeline: estimate(home) ∥ estimate(away) → project →
/// resolve odds → detect value → stake (§4.6). Every fixture ends up with
/// either `Ok(Some(result))` or `Err(skip)` — never silently dropped (§5
/// invariant: a scan completes only once every fixture has a result or a
/// recorded skip).
async fn evaluate_fixture<FP: FixtureProvider>(
    estimator: &TeamRateEstimator<FP>,
    odds_resolver: &OddsResolver,
    thresholds: &ThresholdConfig,
    staking: &StakingConfig,
    fixture: &Fixture,
) -> Result<Option<ScanResult>, ScanSkip> {
    let (home_est, away_est) = tokio::join!(
        estimator.estimate(&fixture.home_team.id, fixture.season, Venue::Home),
        estimator.estimate(&fixture.away_team.id, fixture.season, Venue::Away),
    );

    let home_est = home_est.map_err(|e| ScanSkip {
        fixture_id: fixture.id.clone(),
        reason: e.code().to_string(),
    })?;
    let away_est = away_est.map_err(|e| ScanSkip {
        fixture_id: fixture.id.clone(),
        reason: e.code().to_string(),
    })?;

    // UNPROJECTABLE (§4.2): either side's rate estimate was INSUFFICIENT_DATA.
    // Build the typed error so the skip reason can never drift from `ScanError`'s
    // own taxonomy string.
    if !home_est.is_sufficient() {
        let err = ScanError::InsufficientData {
            team_id: home_est.team_id.clone(),
            season: home_est.season,
            venue: "home",
        };
        return Err(ScanSkip { fixture_id: fixture.id.clone(), reason: err.code().to_string() });
    }
    if !away_est.is_sufficient() {
        let err = ScanError::InsufficientData {
            team_id: away_est.team_id.clone(),
            season: away_est.season,
            venue: "away",
        };
        return Err(ScanSkip { fixture_id: fixture.id.clone(), reason: err.code().to_string() });
    }

    let projection = match MatchProjector::project(&home_est, &away_est) {
        // Defensive only: both estimates were just confirmed sufficient above,
        // so `project` cannot actually return `None` here.
        None => {
            let err = ScanError::InvalidProjection { lambda_hat: f64::NAN, p_hat: f64::NAN };
            return Err(ScanSkip { fixture_id: fixture.id.clone(), reason: err.code().to_string() });
        }
        Some(Err(e)) => {
            return Err(ScanSkip {
                fixture_id: fixture.id.clone(),
                reason: e.code().to_string(),
            })
        }
        Some(Ok(p)) => p,
    };

    let quote = odds_resolver.resolve(&fixture.id).await;
    let outcome = ValueDetector::detect(&projection, quote.as_ref(), thresholds);
    let price = quote.as_ref().map(|q| q.price);
    let stake = StakeCalculator::calculate(&projection, price, outcome.edge_pct, staking);

    Ok(Some(ScanResult {
        fixture_id: fixture.id.clone(),
        league_name: fixture.league_name.clone(),
        country: fixture.country.clone(),
        home_team: fixture.home_team.name.clone(),
        away_team: fixture.away_team.name.clone(),
        kickoff: fixture.kickoff,
        projection,
        odds: quote,
        fair_odds: outcome.fair_odds,
        edge_pct: outcome.edge_pct,
        signal: outcome.signal,
        stake,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StakeMode;
    use crate::models::{FixtureStatus, Score, TeamRef};
    use crate::providers::mock::{MockFixtureProvider, MockOddsProvider};
    use std::sync::atomic::AtomicUsize;

    fn thresholds() -> ThresholdConfig {
        ThresholdConfig {
            lambda_threshold: 1.5,
            min_samples_home: 8,
            min_samples_away: 8,
            min_edge_pct: 3.0,
            max_prob_ci_width: 0.20,
            min_matches_required: 4,
        }
    }

    fn staking() -> StakingConfig {
        StakingConfig {
            mode: StakeMode::Dynamic,
            bankroll: 1000.0,
            kelly_fraction: 0.5,
            tau_conf: 0.20,
            target_edge_pct: 5.0,
            stake_cap: 0.03,
            flat_size: 10.0,
        }
    }

    fn scan_config() -> ScanConfig {
        ScanConfig {
            scan_horizon_days: 2,
            max_concurrency: 8,
            request_delay_secs: 0.0,
            request_timeout_secs: 30,
        }
    }

    fn finished(id: &str, team: &str, opponent: &str, is_home: bool, ht: (i32, i32)) -> Fixture {
        let (home, away) = if is_home {
            (
                TeamRef { id: team.into(), name: team.into() },
                TeamRef { id: opponent.into(), name: opponent.into() },
            )
        } else {
            (
                TeamRef { id: opponent.into(), name: opponent.into() },
                TeamRef { id: team.into(), name: team.into() },
            )
        };
        Fixture {
            id: id.into(),
            league_id: "L1".into(),
            league_name: "League One".into(),
            country: "Testland".into(),
            season: 2025,
            kickoff: Utc::now(),
            status: FixtureStatus::Finished,
            home_team: home,
            away_team: away,
            full_time_score: Some(Score { home: 1, away: 1 }),
            halftime_score: Some(Score { home: ht.0, away: ht.1 }),
        }
    }

    fn rich_history(team: &str, opponent: &str, is_home: bool, n: usize) -> Vec<Fixture> {
        (0..n)
            .map(|i| finished(&format!("{team}-h{i}"), team, opponent, is_home, (1, 0)))
            .collect()
    }

    #[tokio::test]
    async fn scheduled_fixture_with_sufficient_history_emits_a_result() {
        let mut provider = MockFixtureProvider::new();
        provider.add_history("home", 2025, rich_history("home", "x", true, 10));
        provider.add_history("away", 2025, rich_history("away", "x", false, 10));

        let scheduled = Fixture {
            id: "fx1".into(),
            league_id: "L1".into(),
            league_name: "League One".into(),
            country: "Testland".into(),
            season: 2025,
            kickoff: Utc::now(),
            status: FixtureStatus::Scheduled,
            home_team: TeamRef { id: "home".into(), name: "Home FC".into() },
            away_team: TeamRef { id: "away".into(), name: "Away FC".into() },
            full_time_score: None,
            halftime_score: None,
        };
        provider.add_scheduled(scheduled);
        let provider = Arc::new(provider);

        let odds = Arc::new(MockOddsProvider::new("mock").with_quote("fx1", 1.9));
        let resolver = OddsResolver::new(vec![odds]);
        let orchestrator =
            ScanOrchestrator::new(provider, resolver, thresholds(), staking(), scan_config());

        let outcome = orchestrator
            .scan_range(Utc::now() - ChronoDuration::days(1), Utc::now() + ChronoDuration::days(1))
            .await;

        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.skips.is_empty());
        assert_eq!(outcome.results[0].fixture_id, "fx1");
    }

    #[tokio::test]
    async fn s5_insufficient_history_is_omitted_with_a_skip() {
        let mut provider = MockFixtureProvider::new();
        provider.add_history("home", 2025, rich_history("home", "x", true, 3));
        provider.add_history("away", 2025, rich_history("away", "x", false, 10));

        let scheduled = Fixture {
            id: "fx2".into(),
            league_id: "L1".into(),
            league_name: "League One".into(),
            country: "Testland".into(),
            season: 2025,
            kickoff: Utc::now(),
            status: FixtureStatus::Scheduled,
            home_team: TeamRef { id: "home".into(), name: "Home FC".into() },
            away_team: TeamRef { id: "away".into(), name: "Away FC".into() },
            full_time_score: None,
            halftime_score: None,
        };
        provider.add_scheduled(scheduled);
        let provider = Arc::new(provider);

        let resolver = OddsResolver::new(vec![]);
        let orchestrator =
            ScanOrchestrator::new(provider, resolver, thresholds(), staking(), scan_config());

        let outcome = orchestrator
            .scan_range(Utc::now() - ChronoDuration::days(1), Utc::now() + ChronoDuration::days(1))
            .await;

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.skips.len(), 1);
        assert_eq!(outcome.skips[0].reason, "INSUFFICIENT_DATA");
    }

    #[tokio::test]
    async fn s6_single_flight_across_two_fixtures_sharing_a_team() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut provider = MockFixtureProvider::with_history_counting(
            "T",
            2025,
            rich_history("T", "x", true, 10),
            calls.clone(),
        );
        provider.add_history("away1", 2025, rich_history("away1", "x", false, 10));
        provider.add_history("away2", 2025, rich_history("away2", "x", false, 10));

        let base_kickoff = Utc::now();
        provider.add_scheduled(Fixture {
            id: "fxA".into(),
            league_id: "L1".into(),
            league_name: "League One".into(),
            country: "Testland".into(),
            season: 2025,
            kickoff: base_kickoff,
            status: FixtureStatus::Scheduled,
            home_team: TeamRef { id: "T".into(), name: "T FC".into() },
            away_team: TeamRef { id: "away1".into(), name: "Away1 FC".into() },
            full_time_score: None,
            halftime_score: None,
        });
        provider.add_scheduled(Fixture {
            id: "fxB".into(),
            league_id: "L1".into(),
            league_name: "League One".into(),
            country: "Testland".into(),
            season: 2025,
            kickoff: base_kickoff,
            status: FixtureStatus::Scheduled,
            home_team: TeamRef { id: "T".into(), name: "T FC".into() },
            away_team: TeamRef { id: "away2".into(), name: "Away2 FC".into() },
            full_time_score: None,
            halftime_score: None,
        });
        let provider = Arc::new(provider);

        let resolver = OddsResolver::new(vec![]);
        let orchestrator =
            ScanOrchestrator::new(provider, resolver, thresholds(), staking(), scan_config());

        let outcome = orchestrator
            .scan_range(base_kickoff - ChronoDuration::days(1), base_kickoff + ChronoDuration::days(1))
            .await;

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn results_are_sorted_by_kickoff_then_fixture_id() {
        let mut provider = MockFixtureProvider::new();
        provider.add_history("home", 2025, rich_history("home", "x", true, 10));
        provider.add_history("away", 2025, rich_history("away", "x", false, 10));

        let later = Utc::now() + ChronoDuration::hours(5);
        let earlier = Utc::now() + ChronoDuration::hours(1);

        for (id, kickoff) in [("z-late", later), ("a-early", earlier)] {
            provider.add_scheduled(Fixture {
                id: id.into(),
                league_id: "L1".into(),
                league_name: "League One".into(),
                country: "Testland".into(),
                season: 2025,
                kickoff,
                status: FixtureStatus::Scheduled,
                home_team: TeamRef { id: "home".into(), name: "Home FC".into() },
                away_team: TeamRef { id: "away".into(), name: "Away FC".into() },
                full_time_score: None,
                halftime_score: None,
            });
        }
        let provider = Arc::new(provider);

        let resolver = OddsResolver::new(vec![]);
        let orchestrator =
            ScanOrchestrator::new(provider, resolver, thresholds(), staking(), scan_config());

        let outcome = orchestrator
            .scan_range(Utc::now() - ChronoDuration::days(1), Utc::now() + ChronoDuration::days(1))
            .await;

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].fixture_id, "a-early");
        assert_eq!(outcome.results[1].fixture_id, "z-late");
    }
}
