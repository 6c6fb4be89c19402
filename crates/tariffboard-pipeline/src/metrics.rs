//! Derived impact metrics, recomputed over the whole store each cycle.
//!
//! The formulas are deliberately simple screening heuristics, not economic
//! models; they exist to rank countries and industries on the dashboard.

use sqlx::SqlitePool;

use crate::CycleError;

/// Supply-chain risk index in `[0, 100]`.
///
/// Zero imports means zero exposure. Otherwise import dependency
/// `imports / (exports + imports + 1)` is scaled by how concentrated the
/// affected-industry list is: a country hit across many industries carries a
/// lower multiplier than one hit in a single spot.
#[must_use]
pub fn supply_chain_risk(exports: f64, imports: f64, affected_industry_count: usize) -> f64 {
    if imports == 0.0 {
        return 0.0;
    }
    let import_dependency = imports / (exports + imports + 1.0);
    #[allow(clippy::cast_precision_loss)]
    let industry_factor = if affected_industry_count == 0 {
        0.1
    } else {
        (affected_industry_count as f64 / 10.0).min(1.0)
    };
    (import_dependency * (2.0 - industry_factor) * 100.0).min(100.0)
}

/// GDP impact of a tariff level, 5% pass-through placeholder.
#[must_use]
pub fn tariff_impact(initial_tariff: f64) -> f64 {
    initial_tariff * 0.05
}

/// Employment effect of a GVA impact: 1% GVA maps to 1.5% employment over an
/// assumed 1,000,000-worker industry. `None` when the industry shows no trade
/// volume, so the row keeps its previous value.
#[must_use]
pub fn jobs_impact(gva_impact: f64, trade_volume: f64) -> Option<f64> {
    if trade_volume == 0.0 {
        return None;
    }
    const EMPLOYMENT_ELASTICITY: f64 = 1.5;
    const ASSUMED_EMPLOYMENT: f64 = 1_000_000.0;
    Some(ASSUMED_EMPLOYMENT * (gva_impact * EMPLOYMENT_ELASTICITY) / 100.0)
}

fn affected_industry_count(affected_industries_json: &str) -> usize {
    serde_json::from_str::<Vec<serde_json::Value>>(affected_industries_json)
        .map(|v| v.len())
        .unwrap_or(0)
}

/// Recomputes risk/impact for every country row and jobs impact for every
/// industry row.
///
/// # Errors
///
/// Returns [`CycleError::Db`] if a read or write fails.
pub async fn run_metrics_sweep(pool: &SqlitePool, now: &str) -> Result<(), CycleError> {
    let countries = tariffboard_db::list_country_profiles(pool).await?;
    for country in &countries {
        let risk = supply_chain_risk(
            country.total_exports,
            country.total_imports,
            affected_industry_count(&country.affected_industries),
        );
        let impact = tariff_impact(country.initial_tariff);
        tariffboard_db::update_country_derived_metrics(
            pool,
            &country.country_code,
            risk,
            impact,
            now,
        )
        .await?;
    }

    let industries = tariffboard_db::list_industry_profiles(pool).await?;
    let mut updated = 0usize;
    for industry in &industries {
        if let Some(jobs) = jobs_impact(industry.gva_impact, industry.trade_volume) {
            tariffboard_db::update_industry_jobs_impact(pool, &industry.industry_code, jobs, now)
                .await?;
            updated += 1;
        }
    }

    tracing::info!(
        countries = countries.len(),
        industries = updated,
        "metrics sweep complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_imports_means_zero_risk() {
        assert_eq!(supply_chain_risk(1_000_000.0, 0.0, 5), 0.0);
    }

    #[test]
    fn risk_is_capped_at_one_hundred() {
        // Overwhelming import dependency with no industry spread.
        let risk = supply_chain_risk(0.0, 1e12, 0);
        assert_eq!(risk, 100.0);
    }

    #[test]
    fn risk_stays_in_range_across_inputs() {
        for (exports, imports, n) in [
            (0.0, 1.0, 0),
            (1.0, 1.0, 1),
            (1e9, 1e3, 10),
            (5.0, 3.0, 25),
        ] {
            let risk = supply_chain_risk(exports, imports, n);
            assert!((0.0..=100.0).contains(&risk), "risk {risk} out of range");
        }
    }

    #[test]
    fn zero_industries_uses_floor_factor() {
        // factor 0.1 vs factor 1.0 at ten industries: same trade numbers,
        // fewer industries, higher multiplier.
        let concentrated = supply_chain_risk(100.0, 50.0, 0);
        let spread = supply_chain_risk(100.0, 50.0, 10);
        assert!(concentrated > spread);
    }

    #[test]
    fn tariff_impact_is_five_percent_of_rate() {
        assert_eq!(tariff_impact(20.0), 1.0);
        assert_eq!(tariff_impact(0.0), 0.0);
    }

    #[test]
    fn jobs_impact_skips_zero_volume() {
        assert_eq!(jobs_impact(2.0, 0.0), None);
        assert_eq!(jobs_impact(2.0, 1_000.0), Some(30_000.0));
    }

    #[test]
    fn malformed_industry_json_counts_as_zero() {
        assert_eq!(affected_industry_count("not json"), 0);
        assert_eq!(affected_industry_count(r#"["Steel","Aluminum"]"#), 2);
    }
}
