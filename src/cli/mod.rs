//! CLI subcommands driving a one-off scan from the terminal, in the shape
//! of the teacher's `cli::generate_predictions` (plain `println!` report,
//! no separate rendering layer).

use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};

use crate::config::Config;
use crate::core::orchestrator::ScanOutcome;
use crate::providers;

pub async fn scan_today(cfg: &Config) -> Result<()> {
    println!("Scanning today's fixtures...");
    let (orchestrator, _provider) = providers::build_orchestrator(cfg)?;
    let outcome = orchestrator.scan_today().await;
    report(&outcome);
    Ok(())
}

pub async fn scan_date(cfg: &Config, date: &str) -> Result<()> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("expected YYYY-MM-DD, got '{date}'"))?;

    println!("Scanning fixtures for {date}...");
    let (orchestrator, _provider) = providers::build_orchestrator(cfg)?;
    let outcome = orchestrator.scan_date(date).await;
    report(&outcome);
    Ok(())
}

pub async fn scan_range(cfg: &Config, start: &str, end: &str) -> Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("expected YYYY-MM-DD, got '{start}'"))?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("expected YYYY-MM-DD, got '{end}'"))?;
    if end < start {
        return Err(anyhow::anyhow!("end date {end} is before start date {start}"));
    }

    println!("Scanning fixtures from {start} to {end}...");
    let (orchestrator, _provider) = providers::build_orchestrator(cfg)?;
    let window_start = Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0).unwrap());
    let window_end = Utc.from_utc_datetime(&end.and_hms_opt(23, 59, 59).unwrap());
    let outcome = orchestrator.scan_range(window_start, window_end).await;
    report(&outcome);
    Ok(())
}

fn report(outcome: &ScanOutcome) {
    if outcome.results.is_empty() && outcome.skips.is_empty() {
        println!("No scheduled fixtures found in this window.");
        return;
    }

    println!("\n{} fixture(s) evaluated, {} skipped:\n", outcome.results.len(), outcome.skips.len());

    for result in &outcome.results {
        let marker = if result.signal.overall { "VALUE" } else { "     " };
        let odds = result
            .odds
            .as_ref()
            .map(|o| format!("{:.2} ({})", o.price, o.provider_id))
            .unwrap_or_else(|| "no market".to_string());
        let edge = result.edge_pct.map(|e| format!("{e:+.2}%")).unwrap_or_else(|| "n/a".to_string());

        println!(
            "[{marker}] {} vs {} ({}, {}) — kickoff {}",
            result.home_team,
            result.away_team,
            result.league_name,
            result.country,
            result.kickoff.format("%Y-%m-%d %H:%M"),
        );
        println!(
            "        lambda_hat={:.3} p_hat={:.3} ci_width={:.3} fair_odds={:.2} market={odds} edge={edge}",
            result.projection.lambda_hat, result.projection.p_hat, result.projection.ci_width, result.fair_odds,
        );
        if result.signal.overall {
            println!(
                "        stake: {:.2} ({:.2}% of bankroll, {:?} mode)",
                result.stake.stake_amount,
                result.stake.stake_fraction * 100.0,
                result.stake.mode,
            );
        } else {
            println!("        gates failed: {}", result.signal.reasons.join(", "));
        }
    }

    if !outcome.skips.is_empty() {
        println!("\nSkipped:");
        for skip in &outcome.skips {
            println!("  {} — {}", skip.fixture_id, skip.reason);
        }
    }
}
