//! Per-source normalizers: raw source records → store rows.
//!
//! Normalizers are total. A record with missing or odd fields degrades to
//! defaults instead of failing; the only way a record is dropped is an
//! explicit relevance rejection (announcements without any trade keyword).

use tariffboard_core::sectors::sector_for_hs_chapter;
use tariffboard_db::{CountryProfileRow, EconomicTimeSeriesRow, IndustryProfileRow, TariffMeasureRow};
use tariffboard_sources::{
    AnnualTradePoint, DistrictTrade, HsChapterValue, RawAnnouncement, RawArticle, WtoTariffRow,
};

use crate::classify::{
    announcement_highlights, article_highlights, extract_announcement_rates,
    extract_article_rates, extract_dates, is_trade_relevant, measure_id, Classifier,
};

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn rates_object(rates: &[f64]) -> String {
    if rates.is_empty() {
        "{}".to_string()
    } else {
        serde_json::json!({ "rates": rates }).to_string()
    }
}

/// Builds a tariff measure from one news article.
///
/// The classification text is title + description + content joined, matching
/// what a human skimming the article would see.
#[must_use]
pub fn article_measure(
    article: &RawArticle,
    classifier: &Classifier,
    now: &str,
) -> TariffMeasureRow {
    let title = article.title.clone().unwrap_or_default();
    let description = article.description.clone().unwrap_or_default();
    let content = article.content.clone().unwrap_or_default();
    let full_text = format!("{title}. {description} {content}");

    let classification = classifier.classify(&full_text);
    let rates = extract_article_rates(&full_text);
    let dates = extract_dates(&full_text);

    TariffMeasureRow {
        id: measure_id("news_", &article.url),
        source_type: "news".to_string(),
        source_url: article.url.clone(),
        title,
        publication_date: article.published_at.clone().unwrap_or_default(),
        implementation_date: dates.first().cloned(),
        expiration_date: None,
        tariff_type: classification.tariff_type().to_string(),
        affected_countries: json_list(&classification.countries),
        affected_industries: json_list(&classification.industries),
        tariff_rates: serde_json::json!({ "rates": rates }).to_string(),
        full_text,
        extracted_highlights: json_list(&article_highlights(&description, &content)),
        status: classification.status().to_string(),
        last_updated: now.to_string(),
    }
}

/// Builds a tariff measure from one presidential action, or `None` when the
/// post has no trade relevance at all.
#[must_use]
pub fn announcement_measure(
    announcement: &RawAnnouncement,
    classifier: &Classifier,
    now: &str,
) -> Option<TariffMeasureRow> {
    let combined = format!("{} {}", announcement.title, announcement.body);
    if !is_trade_relevant(&combined) {
        return None;
    }

    let classification = classifier.classify(&combined);
    let rates = extract_announcement_rates(&announcement.body);
    let dates = extract_dates(&announcement.body);

    Some(TariffMeasureRow {
        id: measure_id("wh_", &announcement.url),
        source_type: "whitehouse".to_string(),
        source_url: announcement.url.clone(),
        title: announcement.title.clone(),
        publication_date: announcement.published_at.clone(),
        implementation_date: dates.first().cloned(),
        expiration_date: None,
        tariff_type: classification.tariff_type().to_string(),
        affected_countries: json_list(&classification.countries),
        affected_industries: json_list(&classification.industries),
        tariff_rates: rates_object(&rates),
        full_text: announcement.body.clone(),
        extracted_highlights: json_list(&announcement_highlights(&announcement.body)),
        status: classification.status().to_string(),
        last_updated: now.to_string(),
    })
}

/// One Census customs district as a country row (`CTY_` key space).
///
/// Districts are not countries; the keying keeps them in a distinct prefix so
/// the approximation is visible downstream.
#[must_use]
pub fn district_profile(district: &DistrictTrade, now: &str) -> CountryProfileRow {
    CountryProfileRow {
        country_code: format!("CTY_{}", district.district),
        country_name: district.district_name.clone(),
        region: "Unknown".to_string(),
        latest_trade_deficit: district.trade_balance,
        trade_deficit_trend: serde_json::json!([district.trade_balance]).to_string(),
        total_exports: district.exports_value,
        total_imports: district.imports_value,
        tariff_measures: "[]".to_string(),
        affected_industries: "[]".to_string(),
        initial_tariff: 0.0,
        effective_tariff: 0.0,
        supply_chain_risk: 0.0,
        tariff_impact: 0.0,
        jobs_impact: 0.0,
        last_updated: now.to_string(),
    }
}

/// One HS chapter as an industry row (`HS_` key space), sector via the static
/// chapter map.
#[must_use]
pub fn hs_industry_profile(chapter: &HsChapterValue, now: &str) -> IndustryProfileRow {
    IndustryProfileRow {
        industry_code: format!("HS_{}", chapter.hs_chapter),
        industry_name: chapter
            .description
            .clone()
            .unwrap_or_else(|| format!("HS Chapter {}", chapter.hs_chapter)),
        sector: sector_for_hs_chapter(&chapter.hs_chapter).to_string(),
        countries_affected: "[]".to_string(),
        initial_tariff: 0.0,
        effective_tariff: 0.0,
        trade_volume: chapter.value,
        gva_impact: 0.0,
        jobs_impact: 0.0,
        gdp_value: 0.0,
        last_updated: now.to_string(),
    }
}

/// Pivots the annual trade series into the three national `TS_` rows
/// (trade_deficit, exports, imports).
///
/// Points are sorted ascending by year first, so `time_points` and
/// `values_data` stay aligned and ordered regardless of fetch order.
#[must_use]
pub fn annual_series_rows(points: &[AnnualTradePoint], now: &str) -> Vec<EconomicTimeSeriesRow> {
    let mut sorted: Vec<&AnnualTradePoint> = points.iter().collect();
    sorted.sort_by(|a, b| a.year.cmp(&b.year));

    let years: Vec<&str> = sorted.iter().map(|p| p.year.as_str()).collect();
    let metrics: [(&str, Vec<f64>); 3] = [
        (
            "trade_deficit",
            sorted.iter().map(|p| p.deficit_billions).collect(),
        ),
        (
            "exports",
            sorted.iter().map(|p| p.exports_billions).collect(),
        ),
        (
            "imports",
            sorted.iter().map(|p| p.imports_billions).collect(),
        ),
    ];

    metrics
        .into_iter()
        .map(|(metric, values)| EconomicTimeSeriesRow {
            id: format!("TS_{metric}"),
            metric: metric.to_string(),
            country_code: "USA".to_string(),
            industry_code: None,
            frequency: "annual".to_string(),
            time_points: serde_json::to_string(&years).unwrap_or_else(|_| "[]".to_string()),
            values_data: serde_json::to_string(&values).unwrap_or_else(|_| "[]".to_string()),
            source: "Census Bureau".to_string(),
            last_updated: now.to_string(),
        })
        .collect()
}

/// Arithmetic mean of tariff line values per reporting economy, sorted by
/// economy name. Rows without a value contribute nothing.
#[must_use]
pub fn wto_mean_tariffs(rows: &[WtoTariffRow]) -> Vec<(String, f64)> {
    let mut sums: std::collections::BTreeMap<&str, (f64, u32)> = std::collections::BTreeMap::new();
    for row in rows {
        let Some(value) = row.value else { continue };
        let entry = sums.entry(row.reporting_economy.as_str()).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(economy, (sum, n))| (economy.to_string(), sum / f64::from(n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new()
    }

    fn article(title: &str, description: &str, content: &str) -> RawArticle {
        serde_json::from_value(serde_json::json!({
            "title": title,
            "description": description,
            "content": content,
            "url": "https://example.com/article",
            "publishedAt": "2025-03-01T12:00:00Z",
            "source": {"name": "Example Wire"}
        }))
        .expect("fixture article should deserialize")
    }

    #[test]
    fn steel_tariff_article_normalizes_to_active_measure() {
        let article = article(
            "US imposes 25% tariff on Chinese steel",
            "Washington announced new duties on steel imports from China.",
            "The measure takes effect April 2nd, 2025.",
        );
        let row = article_measure(&article, &classifier(), "2025-03-01T13:00:00Z");

        assert!(row.id.starts_with("news_"));
        assert_eq!(row.source_type, "news");
        assert_eq!(row.status, "active");
        assert_eq!(row.implementation_date.as_deref(), Some("April 2nd, 2025"));

        let countries: Vec<String> = serde_json::from_str(&row.affected_countries).unwrap();
        assert!(countries.contains(&"China".to_string()));
        let industries: Vec<String> = serde_json::from_str(&row.affected_industries).unwrap();
        assert!(industries.contains(&"Steel".to_string()));
        let rates: serde_json::Value = serde_json::from_str(&row.tariff_rates).unwrap();
        assert_eq!(rates["rates"][0], 25.0);
    }

    #[test]
    fn article_with_all_fields_missing_still_normalizes() {
        let bare: RawArticle =
            serde_json::from_value(serde_json::json!({"url": "https://example.com/bare"}))
                .expect("minimal article should deserialize");
        let row = article_measure(&bare, &classifier(), "2025-03-01T13:00:00Z");

        assert_eq!(row.title, "");
        assert_eq!(row.tariff_type, "Unknown");
        assert_eq!(row.status, "inactive");
        assert_eq!(row.affected_countries, "[]");
        assert!(row.implementation_date.is_none());
    }

    #[test]
    fn irrelevant_announcement_is_rejected() {
        let announcement = RawAnnouncement {
            title: "National Volunteer Week Proclamation".to_string(),
            url: "https://www.whitehouse.gov/x".to_string(),
            published_at: "2025-04-01T00:00:00".to_string(),
            body: "A proclamation honoring volunteers.".to_string(),
        };
        assert!(announcement_measure(&announcement, &classifier(), "now").is_none());
    }

    #[test]
    fn relevant_announcement_becomes_whitehouse_measure() {
        let announcement = RawAnnouncement {
            title: "Regulating Imports With a Reciprocal Tariff".to_string(),
            url: "https://www.whitehouse.gov/y".to_string(),
            published_at: "2025-04-02T16:00:00".to_string(),
            body: "A 10 percent tariff is imposed on all imports, effective \
                   April 5th, 2025. Reciprocal duties follow."
                .to_string(),
        };
        let row = announcement_measure(&announcement, &classifier(), "now")
            .expect("trade-relevant post must produce a measure");

        assert!(row.id.starts_with("wh_"));
        assert_eq!(row.source_type, "whitehouse");
        assert_eq!(row.tariff_type, "Reciprocal");
        assert_eq!(row.status, "active");
        assert_eq!(row.implementation_date.as_deref(), Some("April 5th, 2025"));
        let rates: serde_json::Value = serde_json::from_str(&row.tariff_rates).unwrap();
        assert_eq!(rates["rates"][0], 10.0);
    }

    #[test]
    fn district_maps_to_cty_country_row() {
        let district = DistrictTrade {
            district: "10".to_string(),
            district_name: "Boston, MA".to_string(),
            exports_value: 2_000_000.0,
            imports_value: 3_500_000.0,
            trade_balance: -1_500_000.0,
        };
        let row = district_profile(&district, "now");

        assert_eq!(row.country_code, "CTY_10");
        assert_eq!(row.country_name, "Boston, MA");
        assert_eq!(row.latest_trade_deficit, -1_500_000.0);
        assert_eq!(row.trade_deficit_trend, "[-1500000.0]");
        assert_eq!(row.supply_chain_risk, 0.0);
    }

    #[test]
    fn hs_chapter_maps_to_sector() {
        let steel = HsChapterValue {
            hs_chapter: "72".to_string(),
            description: Some("IRON AND STEEL".to_string()),
            value: 5_000_000.0,
        };
        let row = hs_industry_profile(&steel, "now");
        assert_eq!(row.industry_code, "HS_72");
        assert_eq!(row.sector, "Steel");

        let odd = HsChapterValue {
            hs_chapter: "97".to_string(),
            description: None,
            value: 1.0,
        };
        let row = hs_industry_profile(&odd, "now");
        assert_eq!(row.sector, "Miscellaneous");
        assert_eq!(row.industry_name, "HS Chapter 97");
    }

    #[test]
    fn annual_series_rows_sort_and_align() {
        let points = vec![
            AnnualTradePoint {
                year: "2024".to_string(),
                exports_billions: 2100.0,
                imports_billions: 3100.0,
                deficit_billions: 1000.0,
            },
            AnnualTradePoint {
                year: "2022".to_string(),
                exports_billions: 2000.0,
                imports_billions: 2900.0,
                deficit_billions: 900.0,
            },
        ];
        let rows = annual_series_rows(&points, "now");
        assert_eq!(rows.len(), 3);

        let deficit = rows.iter().find(|r| r.metric == "trade_deficit").unwrap();
        assert_eq!(deficit.id, "TS_trade_deficit");
        let years: Vec<String> = serde_json::from_str(&deficit.time_points).unwrap();
        let values: Vec<f64> = serde_json::from_str(&deficit.values_data).unwrap();
        assert_eq!(years, vec!["2022", "2024"]);
        assert_eq!(values, vec![900.0, 1000.0]);
        assert_eq!(years.len(), values.len());
    }

    #[test]
    fn wto_rows_average_per_economy() {
        let rows = vec![
            WtoTariffRow {
                reporting_economy: "China".to_string(),
                value: Some(5.0),
            },
            WtoTariffRow {
                reporting_economy: "China".to_string(),
                value: Some(9.0),
            },
            WtoTariffRow {
                reporting_economy: "Japan".to_string(),
                value: None,
            },
            WtoTariffRow {
                reporting_economy: "Norway".to_string(),
                value: Some(3.0),
            },
        ];
        let means = wto_mean_tariffs(&rows);
        assert_eq!(
            means,
            vec![("China".to_string(), 7.0), ("Norway".to_string(), 3.0)]
        );
    }
}
