use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::error::ScanError;
use crate::models::{FixtureStatus, TeamRateEstimate, Venue};
use crate::providers::FixtureProvider;

/// Key for the scan-scoped memoization table: a team-rate estimate is
/// identical for every fixture in the scan that references the same
/// (team, season, venue) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EstimateKey {
    team_id: String,
    season: i32,
    venue: Venue,
}

enum Slot {
    InFlight(Arc<tokio::sync::Notify>),
    Done(Result<TeamRateEstimate, ScanError>),
}

/// Single-flight, scan-scoped cache of team rate estimates. Concurrent
/// callers for the same key share one upstream `team_history` call and
/// observe the same result (§5, §8 invariant 4).
pub struct TeamRateEstimator<P: FixtureProvider> {
    provider: Arc<P>,
    min_matches_required: usize,
    table: Mutex<HashMap<EstimateKey, Slot>>,
}

impl<P: FixtureProvider> TeamRateEstimator<P> {
    pub fn new(provider: Arc<P>, min_matches_required: usize) -> Self {
        Self {
            provider,
            min_matches_required,
            table: Mutex::new(HashMap::new()),
        }
    }

    pub async fn estimate(
        &self,
        team_id: &str,
        season: i32,
        venue: Venue,
    ) -> Result<TeamRateEstimate, ScanError> {
        let key = EstimateKey {
            team_id: team_id.to_string(),
            season,
            venue,
        };

        loop {
            let notify = {
                let mut table = self.table.lock().await;
                match table.get(&key) {
                    Some(Slot::Done(result)) => return result.clone(),
                    Some(Slot::InFlight(notify)) => Some(notify.clone()),
                    None => {
                        table.insert(key.clone(), Slot::InFlight(Arc::new(tokio::sync::Notify::new())));
                        None
                    }
                }
            };

            if let Some(notify) = notify {
                notify.notified().await;
                continue;
            }

            // We are the single caller that inserted InFlight: compute, then
            // publish the result and wake any concurrent waiters.
            let result = self.compute(team_id, season, venue).await;

            let mut table = self.table.lock().await;
            let notify = match table.insert(key.clone(), Slot::Done(result.clone())) {
                Some(Slot::InFlight(notify)) => notify,
                _ => Arc::new(tokio::sync::Notify::new()),
            };
            drop(table);
            notify.notify_waiters();

            return result;
        }
    }

    async fn compute(
        &self,
        team_id: &str,
        season: i32,
        venue: Venue,
    ) -> Result<TeamRateEstimate, ScanError> {
        let fixtures = self.provider.team_history(team_id, season, 50).await?;

        // Gate on fixture status, not halftime-score presence: a finished
        // fixture may still be missing its halftime score (§6), and excluding
        // it here would undercount the total and wrongly trip INSUFFICIENT_DATA.
        let all_finished: Vec<_> = fixtures
            .iter()
            .filter(|f| f.status == FixtureStatus::Finished)
            .collect();

        // Gate on the TOTAL finished count, never the venue-filtered one.
        if all_finished.len() < self.min_matches_required {
            return Ok(TeamRateEstimate {
                team_id: team_id.to_string(),
                season,
                venue,
                n: all_finished.len(),
                mean_fh_goals: None,
                source_matches: Vec::new(),
                observations: Vec::new(),
            });
        }

        let venue_matches: Vec<_> = all_finished
            .iter()
            .filter(|f| match venue {
                Venue::Home => f.home_team.id == team_id,
                Venue::Away => f.away_team.id == team_id,
            })
            .collect();

        if venue_matches.is_empty() {
            return Ok(TeamRateEstimate {
                team_id: team_id.to_string(),
                season,
                venue,
                n: all_finished.len(),
                mean_fh_goals: None,
                source_matches: Vec::new(),
                observations: Vec::new(),
            });
        }

        let observations: Vec<f64> = venue_matches
            .iter()
            .map(|f| f.first_half_goals().unwrap_or(0) as f64)
            .collect();
        let mean = observations.iter().sum::<f64>() / observations.len() as f64;

        Ok(TeamRateEstimate {
            team_id: team_id.to_string(),
            season,
            venue,
            n: all_finished.len(),
            mean_fh_goals: Some(mean),
            source_matches: venue_matches.iter().map(|f| f.id.clone()).collect(),
            observations,
        })
    }
}
