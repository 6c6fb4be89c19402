//! Integration tests for the source clients using wiremock HTTP mocks.

use tariffboard_sources::{
    BeaClient, CensusClient, FetchPolicy, NewsClient, SourceError, WhiteHouseClient, WtoClient,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_policy() -> FetchPolicy {
    FetchPolicy {
        request_timeout_secs: 5,
        max_retries: 1,
        backoff_base_ms: 1,
    }
}

#[tokio::test]
async fn wto_fetch_indicators_sends_subscription_key() {
    let server = MockServer::start().await;

    let body = serde_json::json!([
        {"code": "TP_A_0010", "name": "MFN applied tariff, simple average"},
        {"code": "TP_A_0020", "name": "MFN applied tariff, trade weighted"}
    ]);
    Mock::given(method("GET"))
        .and(path("/indicators"))
        .and(query_param("name", "tariff"))
        .and(header("Ocp-Apim-Subscription-Key", "wto-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = WtoClient::with_base_url("wto-key", test_policy(), &server.uri())
        .expect("client construction should not fail");
    let indicators = client
        .fetch_indicators("tariff")
        .await
        .expect("should parse indicators");

    assert_eq!(indicators.len(), 2);
    assert_eq!(indicators[0].code, "TP_A_0010");
}

#[tokio::test]
async fn wto_fetch_tariff_data_parses_dataset_envelope() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "Dataset": [
            {"ReportingEconomy": "China", "Value": 7.5},
            {"ReportingEconomy": "Japan", "Value": 2.5},
            {"ReportingEconomy": "China", "Value": null}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(query_param("i", "TP_A_0010"))
        .and(query_param("r", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = WtoClient::with_base_url("wto-key", test_policy(), &server.uri())
        .expect("client construction should not fail");
    let rows = client
        .fetch_tariff_data("TP_A_0010")
        .await
        .expect("should parse tariff rows");

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].reporting_economy, "China");
    assert_eq!(rows[0].value, Some(7.5));
    assert_eq!(rows[2].value, None);
}

#[tokio::test]
async fn wto_no_content_yields_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = WtoClient::with_base_url("wto-key", test_policy(), &server.uri())
        .expect("client construction should not fail");
    let rows = client
        .fetch_tariff_data("TP_A_0010")
        .await
        .expect("204 should not be an error");

    assert!(rows.is_empty());
}

#[tokio::test]
async fn wto_server_error_is_retried_then_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indicators"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let client = WtoClient::with_base_url("wto-key", test_policy(), &server.uri())
        .expect("client construction should not fail");
    let err = client
        .fetch_indicators("tariff")
        .await
        .expect_err("500 should surface after retries");

    assert!(matches!(
        err,
        SourceError::UnexpectedStatus { status: 500, .. }
    ));
}

#[tokio::test]
async fn bea_fetch_trade_balances_keeps_latest_year() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "BEAAPI": {
            "Results": {
                "Data": [
                    {"AreaOrCountry": "China", "Year": "2023", "DataValue": "-279,400"},
                    {"AreaOrCountry": "China", "Year": "2024", "DataValue": "-295,401"},
                    {"AreaOrCountry": "Canada", "Year": "2024", "DataValue": "-63,336"},
                    {"AreaOrCountry": "AllCountries", "Year": "2024", "DataValue": "-1,211,685"}
                ]
            }
        }
    });
    Mock::given(method("GET"))
        .and(query_param("method", "GETDATA"))
        .and(query_param("DatasetName", "ITA"))
        .and(query_param("Indicator", "BalGds"))
        .and(query_param("UserID", "bea-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = BeaClient::with_base_url("bea-key", test_policy(), &server.uri())
        .expect("client construction should not fail");
    let balances = client
        .fetch_trade_balances()
        .await
        .expect("should parse balances");

    assert_eq!(balances.len(), 2, "AllCountries aggregate must be dropped");
    let china = balances.iter().find(|b| b.country == "China").unwrap();
    assert_eq!(china.balance, -295_401.0);
}

#[tokio::test]
async fn bea_api_error_envelope_is_an_error() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "BEAAPI": {
            "Results": {
                "Error": {
                    "APIErrorCode": "3",
                    "APIErrorDescription": "The BEA API key is invalid."
                }
            }
        }
    });
    Mock::given(method("GET"))
        .and(query_param("DatasetName", "GDPbyIndustry"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = BeaClient::with_base_url("bad-key", test_policy(), &server.uri())
        .expect("client construction should not fail");
    let err = client
        .fetch_gdp_by_industry()
        .await
        .expect_err("error envelope should surface");

    assert!(err.to_string().contains("invalid"));
}

#[tokio::test]
async fn census_dashboard_merges_district_imports_and_exports() {
    let server = MockServer::start().await;

    let exports = serde_json::json!([
        ["DISTRICT", "DIST_NAME", "ALL_VAL_MO", "time"],
        ["10", "Boston, MA", "2000000", "2024-12"],
        ["20", "New York, NY", "9000000", "2024-12"]
    ]);
    Mock::given(method("GET"))
        .and(path("/data/timeseries/intltrade/exports/porths"))
        .and(query_param("time", "2024-12"))
        .and(query_param("key", "census-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&exports))
        .mount(&server)
        .await;

    let imports = serde_json::json!([
        ["DISTRICT", "DIST_NAME", "GEN_VAL_MO", "time"],
        ["10", "Boston, MA", "3500000", "2024-12"]
    ]);
    Mock::given(method("GET"))
        .and(path("/data/timeseries/intltrade/imports/porths"))
        .and(query_param("time", "2024-12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&imports))
        .mount(&server)
        .await;

    let hs = serde_json::json!([
        ["E_COMMODITY", "E_COMMODITY_SDESC", "ALL_VAL_MO", "time"],
        ["72", "IRON AND STEEL", "4000000", "2024-12"],
        ["72", "IRON AND STEEL", "1000000", "2024-12"],
        ["85", "ELECTRIC MACHINERY", "7000000", "2024-12"]
    ]);
    Mock::given(method("GET"))
        .and(path("/data/timeseries/intltrade/exports/hs"))
        .and(query_param("COMM_LVL", "HS2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&hs))
        .mount(&server)
        .await;

    // Annual totals for the trailing years. One catch-all per direction keeps
    // the test focused on the monthly fragments.
    let annual_exports = serde_json::json!([["ALL_VAL_YR"], ["2000000000000"]]);
    Mock::given(method("GET"))
        .and(path("/data/timeseries/intltrade/exports/hs"))
        .and(query_param("get", "ALL_VAL_YR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&annual_exports))
        .mount(&server)
        .await;
    let annual_imports = serde_json::json!([["GEN_VAL_YR"], ["3000000000000"]]);
    Mock::given(method("GET"))
        .and(path("/data/timeseries/intltrade/imports/hs"))
        .and(query_param("get", "GEN_VAL_YR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&annual_imports))
        .mount(&server)
        .await;

    let client = CensusClient::with_base_url("census-key", test_policy(), &server.uri())
        .expect("client construction should not fail");
    let dashboard = client
        .fetch_dashboard("2024", "12")
        .await
        .expect("should build dashboard");

    assert_eq!(dashboard.trade_balance.len(), 2);
    let boston = &dashboard.trade_balance[0];
    assert_eq!(boston.district, "10");
    assert_eq!(boston.exports_value, 2_000_000.0);
    assert_eq!(boston.imports_value, 3_500_000.0);
    assert_eq!(boston.trade_balance, -1_500_000.0);
    // District 20 has no import row and keeps a zero import value.
    assert_eq!(dashboard.trade_balance[1].imports_value, 0.0);

    let steel = dashboard
        .hs_data
        .iter()
        .find(|h| h.hs_chapter == "72")
        .unwrap();
    assert_eq!(steel.value, 5_000_000.0, "chapter rows must be summed");

    assert_eq!(dashboard.time_series.len(), 5);
    let latest = dashboard.time_series.last().unwrap();
    assert_eq!(latest.exports_billions, 2000.0);
    assert_eq!(latest.deficit_billions, 1000.0);
}

#[tokio::test]
async fn news_sweep_dedupes_articles_by_url() {
    let server = MockServer::start().await;

    // The same article comes back for two different pairings; it must be
    // kept once, attributed to the first pairing that surfaced it.
    let article = serde_json::json!({
        "source": {"name": "Reuters"},
        "title": "US imposes 25% tariff on steel imports",
        "description": "New section 301 action announced.",
        "url": "https://example.com/steel-tariff",
        "publishedAt": "2025-03-01T12:00:00Z"
    });
    let hit = serde_json::json!({"status": "ok", "totalResults": 1, "articles": [article]});
    let empty = serde_json::json!({"status": "ok", "totalResults": 0, "articles": []});

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .and(query_param("q", "\"tariff\" \"imposed\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(&hit))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .and(query_param("q", "\"tariff\" \"announced\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(&hit))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&empty))
        .mount(&server)
        .await;

    let client = NewsClient::with_base_url("news-key", test_policy(), &server.uri())
        .expect("client construction should not fail");
    let articles = client
        .fetch_tariff_articles()
        .await
        .expect("sweep should succeed");

    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].url, "https://example.com/steel-tariff");
    assert_eq!(articles[0].query, "\"tariff\" \"imposed\"");
}

#[tokio::test]
async fn whitehouse_pagination_stops_on_bad_request() {
    let server = MockServer::start().await;

    let page: Vec<serde_json::Value> = (0..20)
        .map(|i| {
            serde_json::json!({
                "link": format!("https://www.whitehouse.gov/presidential-actions/post-{i}/"),
                "date": "2025-04-02T16:00:00",
                "title": {"rendered": format!("Action {i}")},
                "content": {"rendered": "<p>Imposing a <b>25 percent</b> tariff.</p>"}
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/presidential-actions"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page))
        .mount(&server)
        .await;
    // WordPress answers past-the-end pages with 400.
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/presidential-actions"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "code": "rest_post_invalid_page_number"
        })))
        .mount(&server)
        .await;

    let client = WhiteHouseClient::with_base_url(test_policy(), &server.uri())
        .expect("client construction should not fail");
    let actions = client
        .fetch_presidential_actions()
        .await
        .expect("should fetch first page");

    assert_eq!(actions.len(), 20);
    assert_eq!(actions[0].title, "Action 0");
    assert_eq!(actions[0].body, "Imposing a 25 percent tariff.");
}
