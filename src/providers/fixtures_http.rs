//! HTTP `FixtureProvider` against the api-football v3 surface (the
//! provider named throughout `original_source/live_alert_system`:
//! `BASE_URL = "https://v3.football.api-sports.io"`). Mirrors the
//! teacher's `DataFetcher` shape — a `reqwest::Client` plus a bearer key,
//! one method per upstream call, `anyhow` errors mapped into `ScanError`
//! at the trait boundary — but paced through a shared per-provider
//! limiter instead of the teacher's inter-call `tokio::time::sleep`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::core::error::ScanError;
use crate::models::{Fixture, FixtureStatus, Score, TeamRef};
use crate::providers::FixtureProvider;
use crate::ratelimit::ProviderLimiters;

const PROVIDER_ID: &str = "api_football";
const BASE_URL: &str = "https://v3.football.api-sports.io";

pub struct ApiFootballFixtureProvider {
    client: Client,
    api_key: String,
    limiters: Arc<ProviderLimiters>,
}

impl ApiFootballFixtureProvider {
    pub fn new(api_key: String, limiters: Arc<ProviderLimiters>, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, api_key, limiters })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ApiFootballEnvelope, ScanError> {
        self.limiters.acquire(PROVIDER_ID).await;

        let url = format!("{BASE_URL}{path}");
        let response = self
            .client
            .get(&url)
            .header("x-apisports-key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(ScanError::ProviderUnavailable {
                provider: PROVIDER_ID.to_string(),
                detail: format!("HTTP {}", response.status()),
            });
        }

        response
            .json::<ApiFootballEnvelope>()
            .await
            .map_err(|e| ScanError::ProviderUnavailable {
                provider: PROVIDER_ID.to_string(),
                detail: format!("decode failure: {e}"),
            })
    }
}

fn map_transport_error(e: &reqwest::Error) -> ScanError {
    if e.is_timeout() {
        ScanError::ProviderTimeout { provider: PROVIDER_ID.to_string() }
    } else {
        ScanError::ProviderUnavailable {
            provider: PROVIDER_ID.to_string(),
            detail: e.to_string(),
        }
    }
}

#[async_trait]
impl FixtureProvider for ApiFootballFixtureProvider {
    async fn list_fixtures(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        status_filter: Option<FixtureStatus>,
    ) -> Result<Vec<Fixture>, ScanError> {
        let envelope = self
            .get(
                "/fixtures",
                &[
                    ("from", window_start.format("%Y-%m-%d").to_string()),
                    ("to", window_end.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;

        Ok(envelope
            .response
            .into_iter()
            .map(RawFixture::into_fixture)
            .filter(|f| status_filter.map_or(true, |s| f.status == s))
            .filter(|f| f.kickoff >= window_start && f.kickoff <= window_end)
            .collect())
    }

    async fn team_history(
        &self,
        team_id: &str,
        season: i32,
        last_n: usize,
    ) -> Result<Vec<Fixture>, ScanError> {
        let envelope = self
            .get(
                "/fixtures",
                &[
                    ("team", team_id.to_string()),
                    ("season", season.to_string()),
                    ("status", "FT".to_string()),
                    ("last", last_n.to_string()),
                ],
            )
            .await?;

        Ok(envelope.response.into_iter().map(RawFixture::into_fixture).collect())
    }
}

// ── Upstream JSON shapes (api-football v3 "fixtures" envelope) ──────────────

#[derive(Debug, Deserialize)]
struct ApiFootballEnvelope {
    response: Vec<RawFixture>,
}

#[derive(Debug, Deserialize)]
struct RawFixture {
    fixture: RawFixtureInfo,
    league: RawLeague,
    teams: RawTeams,
    goals: RawGoals,
    score: RawScoreBlock,
}

#[derive(Debug, Deserialize)]
struct RawFixtureInfo {
    id: u64,
    date: DateTime<Utc>,
    status: RawStatus,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    short: String,
}

#[derive(Debug, Deserialize)]
struct RawLeague {
    id: u64,
    name: String,
    country: String,
    season: i32,
}

#[derive(Debug, Deserialize)]
struct RawTeams {
    home: RawTeam,
    away: RawTeam,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawGoals {
    home: Option<i32>,
    away: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RawScoreBlock {
    halftime: RawGoals,
}

impl RawFixture {
    fn into_fixture(self) -> Fixture {
        let status = match self.fixture.status.short.as_str() {
            "NS" | "TBD" => FixtureStatus::Scheduled,
            "FT" | "AET" | "PEN" => FixtureStatus::Finished,
            _ => FixtureStatus::Other,
        };

        let full_time_score = match (self.goals.home, self.goals.away) {
            (Some(home), Some(away)) => Some(Score { home, away }),
            _ => None,
        };
        let halftime_score = match (self.score.halftime.home, self.score.halftime.away) {
            (Some(home), Some(away)) => Some(Score { home, away }),
            _ => None,
        };

        Fixture {
            id: self.fixture.id.to_string(),
            league_id: self.league.id.to_string(),
            league_name: self.league.name,
            country: self.league.country,
            season: self.league.season,
            kickoff: self.fixture.date,
            status,
            home_team: TeamRef { id: self.teams.home.id.to_string(), name: self.teams.home.name },
            away_team: TeamRef { id: self.teams.away.id.to_string(), name: self.teams.away.name },
            full_time_score,
            halftime_score,
        }
    }
}
