use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity is the id; the name is purely informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Home,
    Away,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Home => "home",
            Venue::Away => "away",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixtureStatus {
    Scheduled,
    Finished,
    Other,
}

/// Halftime or full-time score for a match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub home: i32,
    pub away: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: String,
    pub league_id: String,
    pub league_name: String,
    pub country: String,
    pub season: i32,
    pub kickoff: DateTime<Utc>,
    pub status: FixtureStatus,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
    pub full_time_score: Option<Score>,
    pub halftime_score: Option<Score>,
}

impl Fixture {
    /// Total first-half goals scored by both sides, when known.
    pub fn first_half_goals(&self) -> Option<i32> {
        self.halftime_score.map(|s| s.home + s.away)
    }
}

/// Per-(team, season, venue) rate estimate. `n` counts ALL finished
/// matches considered for the sample-size gate, not just the
/// venue-filtered subset used to compute `mean_fh_goals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRateEstimate {
    pub team_id: String,
    pub season: i32,
    pub venue: Venue,
    pub n: usize,
    pub mean_fh_goals: Option<f64>,
    pub source_matches: Vec<String>,
    /// Per-match first-half-goal counts underlying `mean_fh_goals`, in the
    /// same order as `source_matches`. Feeds the projector's pooled-variance
    /// confidence interval; not part of the provider-facing contract.
    pub observations: Vec<f64>,
}

impl TeamRateEstimate {
    pub fn is_sufficient(&self) -> bool {
        self.mean_fh_goals.is_some()
    }
}

/// Derived match projection. Never persisted beyond the life of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub lambda_hat: f64,
    pub p_hat: f64,
    pub p_lo: f64,
    pub p_hi: f64,
    pub ci_width: f64,
    pub n_home: usize,
    pub n_away: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub price: f64,
    pub provider_id: String,
    pub observed_at: DateTime<Utc>,
}

/// The four stage gates plus their conjunction. All four are always
/// present, even when `overall` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub lambda_ok: bool,
    pub samples_ok: bool,
    pub edge_ok: bool,
    pub ci_ok: bool,
    pub overall: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeMode {
    Dynamic,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeRecommendation {
    pub mode: StakeMode,
    pub stake_fraction: f64,
    pub stake_amount: f64,
    pub kelly_fraction: Option<f64>,
    pub confidence_weight: Option<f64>,
    pub value_weight: Option<f64>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub fixture_id: String,
    pub league_name: String,
    pub country: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub projection: Projection,
    pub odds: Option<OddsQuote>,
    pub fair_odds: f64,
    pub edge_pct: Option<f64>,
    pub signal: Signal,
    pub stake: StakeRecommendation,
}

/// Record of a fixture that could not be scanned, with the reason kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSkip {
    pub fixture_id: String,
    pub reason: String,
}
