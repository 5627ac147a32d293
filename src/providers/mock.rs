//! In-memory provider implementations used by the core's own test suite
//! and available to external callers that want to drive the pipeline
//! without a network. Not part of the public service surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::error::ScanError;
use crate::models::{Fixture, FixtureStatus, OddsQuote};
use crate::providers::{FixtureProvider, OddsProvider};

pub struct MockFixtureProvider {
    history: HashMap<(String, i32), Vec<Fixture>>,
    fixtures: Vec<Fixture>,
    call_counter: Option<Arc<AtomicUsize>>,
    fail_teams: Mutex<Vec<String>>,
}

impl MockFixtureProvider {
    pub fn new() -> Self {
        Self {
            history: HashMap::new(),
            fixtures: Vec::new(),
            call_counter: None,
            fail_teams: Mutex::new(Vec::new()),
        }
    }

    pub fn with_history(team_id: &str, season: i32, fixtures: Vec<Fixture>) -> Self {
        let mut p = Self::new();
        p.history.insert((team_id.to_string(), season), fixtures);
        p
    }

    pub fn with_history_counting(
        team_id: &str,
        season: i32,
        fixtures: Vec<Fixture>,
        counter: Arc<AtomicUsize>,
    ) -> Self {
        let mut p = Self::with_history(team_id, season, fixtures);
        p.call_counter = Some(counter);
        p
    }

    pub fn add_history(&mut self, team_id: &str, season: i32, fixtures: Vec<Fixture>) {
        self.history.insert((team_id.to_string(), season), fixtures);
    }

    pub fn add_scheduled(&mut self, fixture: Fixture) {
        self.fixtures.push(fixture);
    }

    /// Make `team_history` return `PROVIDER_UNAVAILABLE` for this team.
    pub fn fail_team(&self, team_id: &str) {
        self.fail_teams.lock().unwrap().push(team_id.to_string());
    }
}

impl Default for MockFixtureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FixtureProvider for MockFixtureProvider {
    async fn list_fixtures(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        status_filter: Option<FixtureStatus>,
    ) -> Result<Vec<Fixture>, ScanError> {
        Ok(self
            .fixtures
            .iter()
            .filter(|f| f.kickoff >= window_start && f.kickoff <= window_end)
            .filter(|f| status_filter.map_or(true, |s| f.status == s))
            .cloned()
            .collect())
    }

    async fn team_history(
        &self,
        team_id: &str,
        season: i32,
        last_n: usize,
    ) -> Result<Vec<Fixture>, ScanError> {
        if let Some(counter) = &self.call_counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail_teams.lock().unwrap().contains(&team_id.to_string()) {
            return Err(ScanError::ProviderUnavailable {
                provider: "mock".to_string(),
                detail: format!("team {team_id} unavailable"),
            });
        }
        let mut matches = self
            .history
            .get(&(team_id.to_string(), season))
            .cloned()
            .unwrap_or_default();
        matches.truncate(last_n);
        Ok(matches)
    }
}

pub struct MockOddsProvider {
    id: String,
    quotes: HashMap<String, OddsQuote>,
}

impl MockOddsProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            quotes: HashMap::new(),
        }
    }

    pub fn with_quote(mut self, fixture_id: &str, price: f64) -> Self {
        self.quotes.insert(
            fixture_id.to_string(),
            OddsQuote {
                price,
                provider_id: self.id.clone(),
                observed_at: Utc::now(),
            },
        );
        self
    }
}

#[async_trait]
impl OddsProvider for MockOddsProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn fh_over_05(&self, fixture_id: &str) -> Result<Option<OddsQuote>, ScanError> {
        Ok(self.quotes.get(fixture_id).cloned())
    }
}
