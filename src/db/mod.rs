//! SQLite-backed `FixtureStore` (§6): persisted-fixture lookup consumed by
//! the service surface. Schema and pool-setup pattern mirror the teacher's
//! `db::create_pool` / `db::init_database_with_pool` (`CREATE TABLE IF NOT
//! EXISTS`, `sqlite:` URL with parent-dir creation), trimmed to the one
//! entity this core actually needs.

use std::env;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};

use crate::models::{Fixture, FixtureStatus, Score, TeamRef};
use crate::providers::FixtureStore;

pub async fn create_pool() -> Result<SqlitePool> {
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/fh_scanner.db".to_string());

    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(&database_url);

    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

pub async fn init_database() -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await
}

pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fixtures (
            id TEXT PRIMARY KEY,
            league_id TEXT NOT NULL,
            league_name TEXT NOT NULL,
            country TEXT NOT NULL,
            season INTEGER NOT NULL,
            kickoff TEXT NOT NULL,
            status TEXT NOT NULL,
            home_team_id TEXT NOT NULL,
            home_team_name TEXT NOT NULL,
            away_team_id TEXT NOT NULL,
            away_team_name TEXT NOT NULL,
            full_time_home INTEGER,
            full_time_away INTEGER,
            halftime_home INTEGER,
            halftime_away INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fixtures_kickoff ON fixtures (kickoff)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Insert or replace a fixture row, used both when the orchestrator
/// discovers fixtures from an upstream provider and to persist finished
/// results for the service surface's `GET /fixtures/{id}`.
pub async fn upsert_fixture(pool: &SqlitePool, fixture: &Fixture) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO fixtures (
            id, league_id, league_name, country, season, kickoff, status,
            home_team_id, home_team_name, away_team_id, away_team_name,
            full_time_home, full_time_away, halftime_home, halftime_away
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            league_id = excluded.league_id,
            league_name = excluded.league_name,
            country = excluded.country,
            season = excluded.season,
            kickoff = excluded.kickoff,
            status = excluded.status,
            home_team_id = excluded.home_team_id,
            home_team_name = excluded.home_team_name,
            away_team_id = excluded.away_team_id,
            away_team_name = excluded.away_team_name,
            full_time_home = excluded.full_time_home,
            full_time_away = excluded.full_time_away,
            halftime_home = excluded.halftime_home,
            halftime_away = excluded.halftime_away
        "#,
    )
    .bind(&fixture.id)
    .bind(&fixture.league_id)
    .bind(&fixture.league_name)
    .bind(&fixture.country)
    .bind(fixture.season)
    .bind(fixture.kickoff.to_rfc3339())
    .bind(status_str(fixture.status))
    .bind(&fixture.home_team.id)
    .bind(&fixture.home_team.name)
    .bind(&fixture.away_team.id)
    .bind(&fixture.away_team.name)
    .bind(fixture.full_time_score.map(|s| s.home))
    .bind(fixture.full_time_score.map(|s| s.away))
    .bind(fixture.halftime_score.map(|s| s.home))
    .bind(fixture.halftime_score.map(|s| s.away))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_fixtures(pool: &SqlitePool, fixtures: &[Fixture]) -> Result<()> {
    for fixture in fixtures {
        upsert_fixture(pool, fixture).await?;
    }
    Ok(())
}

pub async fn get_fixture(pool: &SqlitePool, fixture_id: &str) -> Result<Option<Fixture>> {
    let row = sqlx::query("SELECT * FROM fixtures WHERE id = ?")
        .bind(fixture_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_fixture))
}

/// Supplements §6: `GET /leagues` (present in `original_source/src/fh_over/api.py`
/// though absent from spec.md), a passthrough to the distinct leagues on file.
pub async fn list_leagues(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT DISTINCT league_name FROM fixtures ORDER BY league_name")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|r| r.get::<String, _>("league_name")).collect())
}

fn status_str(status: FixtureStatus) -> &'static str {
    match status {
        FixtureStatus::Scheduled => "scheduled",
        FixtureStatus::Finished => "finished",
        FixtureStatus::Other => "other",
    }
}

fn row_to_fixture(row: sqlx::sqlite::SqliteRow) -> Fixture {
    let status = match row.get::<String, _>("status").as_str() {
        "scheduled" => FixtureStatus::Scheduled,
        "finished" => FixtureStatus::Finished,
        _ => FixtureStatus::Other,
    };
    let kickoff: String = row.get("kickoff");
    let kickoff: DateTime<Utc> = DateTime::parse_from_rfc3339(&kickoff)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    let full_time_score = match (
        row.get::<Option<i32>, _>("full_time_home"),
        row.get::<Option<i32>, _>("full_time_away"),
    ) {
        (Some(home), Some(away)) => Some(Score { home, away }),
        _ => None,
    };
    let halftime_score = match (
        row.get::<Option<i32>, _>("halftime_home"),
        row.get::<Option<i32>, _>("halftime_away"),
    ) {
        (Some(home), Some(away)) => Some(Score { home, away }),
        _ => None,
    };

    Fixture {
        id: row.get("id"),
        league_id: row.get("league_id"),
        league_name: row.get("league_name"),
        country: row.get("country"),
        season: row.get("season"),
        kickoff,
        status,
        home_team: TeamRef {
            id: row.get("home_team_id"),
            name: row.get("home_team_name"),
        },
        away_team: TeamRef {
            id: row.get("away_team_id"),
            name: row.get("away_team_name"),
        },
        full_time_score,
        halftime_score,
    }
}

/// `FixtureStore` implementation backing the service surface (§6).
pub struct SqliteFixtureStore {
    pool: SqlitePool,
}

impl SqliteFixtureStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FixtureStore for SqliteFixtureStore {
    async fn get(&self, fixture_id: &str) -> Result<Option<Fixture>> {
        get_fixture(&self.pool, fixture_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_database_with_pool(&pool).await.unwrap();
        pool
    }

    fn sample_fixture() -> Fixture {
        Fixture {
            id: "f1".into(),
            league_id: "39".into(),
            league_name: "Premier League".into(),
            country: "England".into(),
            season: 2025,
            kickoff: Utc::now(),
            status: FixtureStatus::Scheduled,
            home_team: TeamRef { id: "h1".into(), name: "Home FC".into() },
            away_team: TeamRef { id: "a1".into(), name: "Away FC".into() },
            full_time_score: None,
            halftime_score: None,
        }
    }

    #[tokio::test]
    async fn round_trips_a_fixture() {
        let pool = memory_pool().await;
        let fixture = sample_fixture();
        upsert_fixture(&pool, &fixture).await.unwrap();

        let fetched = get_fixture(&pool, "f1").await.unwrap().unwrap();
        assert_eq!(fetched.id, fixture.id);
        assert_eq!(fetched.home_team.name, "Home FC");
        assert_eq!(fetched.status, FixtureStatus::Scheduled);
    }

    #[tokio::test]
    async fn missing_fixture_is_none() {
        let pool = memory_pool().await;
        assert!(get_fixture(&pool, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_conflict() {
        let pool = memory_pool().await;
        let mut fixture = sample_fixture();
        upsert_fixture(&pool, &fixture).await.unwrap();

        fixture.status = FixtureStatus::Finished;
        fixture.full_time_score = Some(Score { home: 2, away: 1 });
        upsert_fixture(&pool, &fixture).await.unwrap();

        let fetched = get_fixture(&pool, "f1").await.unwrap().unwrap();
        assert_eq!(fetched.status, FixtureStatus::Finished);
        assert_eq!(fetched.full_time_score, Some(Score { home: 2, away: 1 }));
    }

    #[tokio::test]
    async fn lists_distinct_leagues() {
        let pool = memory_pool().await;
        let mut a = sample_fixture();
        a.id = "f1".into();
        a.league_name = "Premier League".into();
        let mut b = sample_fixture();
        b.id = "f2".into();
        b.league_name = "La Liga".into();
        let mut c = sample_fixture();
        c.id = "f3".into();
        c.league_name = "Premier League".into();
        upsert_fixtures(&pool, &[a, b, c]).await.unwrap();

        let leagues = list_leagues(&pool).await.unwrap();
        assert_eq!(leagues, vec!["La Liga".to_string(), "Premier League".to_string()]);
    }
}
