pub mod fixtures_http;
pub mod mock;
pub mod odds_http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::core::error::ScanError;
use crate::core::odds::OddsResolver;
use crate::core::orchestrator::ScanOrchestrator;
use crate::models::{Fixture, FixtureStatus, OddsQuote};
use crate::ratelimit::ProviderLimiters;

/// External collaborator: upstream fixture data. Consumed by the core,
/// never implemented by it (§6).
#[async_trait]
pub trait FixtureProvider: Send + Sync {
    async fn list_fixtures(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        status_filter: Option<FixtureStatus>,
    ) -> Result<Vec<Fixture>, ScanError>;

    /// Last `last_n` finished fixtures for a team in a season, halftime
    /// scores populated when available.
    async fn team_history(
        &self,
        team_id: &str,
        season: i32,
        last_n: usize,
    ) -> Result<Vec<Fixture>, ScanError>;
}

/// External collaborator: live market odds. Consumed by the core.
#[async_trait]
pub trait OddsProvider: Send + Sync {
    /// Stable identifier used for priority ordering and audit (e.g. a
    /// bookmaker or exchange name).
    fn provider_id(&self) -> &str;

    async fn fh_over_05(&self, fixture_id: &str) -> Result<Option<OddsQuote>, ScanError>;
}

/// External collaborator: persisted-fixture lookup used by the service
/// surface (§6). Optional — the core's scan pipeline does not require it.
#[async_trait]
pub trait FixtureStore: Send + Sync {
    async fn get(&self, fixture_id: &str) -> anyhow::Result<Option<Fixture>>;
}

/// Selects between the real api-football-backed provider and the in-memory
/// mock at runtime (no `API_FOOTBALL_KEY` configured), so `ScanOrchestrator`
/// can stay generic over a single concrete type rather than a trait object.
pub enum AnyFixtureProvider {
    Http(fixtures_http::ApiFootballFixtureProvider),
    Mock(mock::MockFixtureProvider),
}

#[async_trait]
impl FixtureProvider for AnyFixtureProvider {
    async fn list_fixtures(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        status_filter: Option<FixtureStatus>,
    ) -> Result<Vec<Fixture>, ScanError> {
        match self {
            AnyFixtureProvider::Http(p) => p.list_fixtures(window_start, window_end, status_filter).await,
            AnyFixtureProvider::Mock(p) => p.list_fixtures(window_start, window_end, status_filter).await,
        }
    }

    async fn team_history(
        &self,
        team_id: &str,
        season: i32,
        last_n: usize,
    ) -> Result<Vec<Fixture>, ScanError> {
        match self {
            AnyFixtureProvider::Http(p) => p.team_history(team_id, season, last_n).await,
            AnyFixtureProvider::Mock(p) => p.team_history(team_id, season, last_n).await,
        }
    }
}

fn build_fixture_provider(cfg: &Config, limiters: Arc<ProviderLimiters>) -> anyhow::Result<AnyFixtureProvider> {
    let enabled = cfg.providers.enabled_fixture_providers();
    if !enabled.contains(&"api_football") {
        tracing::warn!("api_football disabled by config; falling back to the in-memory mock fixture provider");
        return Ok(AnyFixtureProvider::Mock(mock::MockFixtureProvider::new()));
    }

    match cfg.api_football_key.as_deref() {
        Some(key) if !key.is_empty() => Ok(AnyFixtureProvider::Http(
            fixtures_http::ApiFootballFixtureProvider::new(
                key.to_string(),
                limiters,
                cfg.scan.request_timeout_secs,
            )?,
        )),
        _ => {
            tracing::warn!("no API_FOOTBALL_KEY configured; falling back to the in-memory mock fixture provider");
            Ok(AnyFixtureProvider::Mock(mock::MockFixtureProvider::new()))
        }
    }
}

fn build_odds_providers(cfg: &Config, limiters: Arc<ProviderLimiters>) -> anyhow::Result<Vec<Arc<dyn OddsProvider>>> {
    let Some(key) = cfg.odds_api_key.clone().filter(|k| !k.is_empty()) else {
        tracing::warn!("no ODDS_API_KEY configured; scans will run with NO_MARKET odds for every fixture");
        return Ok(Vec::new());
    };

    cfg.providers
        .enabled_odds_providers()
        .into_iter()
        .map(|name| {
            odds_http::TheOddsApiProvider::new(name, key.clone(), limiters.clone(), cfg.scan.request_timeout_secs)
                .map(|p| Arc::new(p) as Arc<dyn OddsProvider>)
        })
        .collect()
}

/// Wires up the concrete `FixtureProvider`/`OddsProvider` stack from
/// configuration and returns a ready-to-use orchestrator (§6 provider
/// priority/enable flags, §11 supplement) alongside the shared fixture
/// provider handle, so callers can also list fixtures directly (e.g. to
/// persist them for `GET /fixtures/{id}`).
pub fn build_orchestrator(
    cfg: &Config,
) -> anyhow::Result<(ScanOrchestrator<AnyFixtureProvider>, Arc<AnyFixtureProvider>)> {
    let limiters = Arc::new(ProviderLimiters::new(Duration::from_secs_f64(
        cfg.scan.request_delay_secs.max(0.0),
    )));

    let fixture_provider = Arc::new(build_fixture_provider(cfg, limiters.clone())?);
    let odds_providers = build_odds_providers(cfg, limiters)?;
    let resolver = OddsResolver::new(odds_providers);

    let orchestrator = ScanOrchestrator::new(
        fixture_provider.clone(),
        resolver,
        cfg.thresholds.clone(),
        cfg.staking.clone(),
        cfg.scan.clone(),
    );

    Ok((orchestrator, fixture_provider))
}
