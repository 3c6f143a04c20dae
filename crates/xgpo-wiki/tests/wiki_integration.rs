use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xgpo_wiki::{
    Category, ContentAggregator, NO_DESCRIPTION, RenderOptions, SearchBackend, WikiClient,
    WikiError,
};

fn client_for(server: &MockServer) -> WikiClient {
    client_with(server, reqwest::Client::new())
}

fn client_with(server: &MockServer, http: reqwest::Client) -> WikiClient {
    WikiClient::new(&http).with_endpoints(
        format!("{}/api.php", server.uri()),
        format!("{}/wiki/", server.uri()),
    )
}

fn impatient_http() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .expect("client should build")
}

async fn mount_search(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("list", "search"))
        .and(query_param("srlimit", "8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_extract(server: &MockServer, title: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("prop", "extracts"))
        .and(query_param("titles", title))
        .respond_with(response)
        .mount(server)
        .await;
}

fn extract_body(extract: &str) -> serde_json::Value {
    json!({ "query": { "pages": { "42": { "pageid": 42, "extract": extract } } } })
}

#[tokio::test]
async fn results_keep_search_ranking_and_clean_snippets() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        json!({ "query": { "search": [
            { "title": "Sea King", "snippet": "The <span class=\"searchmatch\">Sea</span> King &amp; friends" },
            { "title": "Kraken", "snippet": "A <span class=\"searchmatch\">boss</span>" },
        ] } }),
    )
    .await;
    mount_extract(
        &server,
        "Sea King",
        ResponseTemplate::new(200)
            .set_delay(std::time::Duration::from_millis(150))
            .set_body_json(extract_body("  A giant sea beast.  ")),
    )
    .await;
    mount_extract(
        &server,
        "Kraken",
        ResponseTemplate::new(200).set_body_json(extract_body("Tentacles.")),
    )
    .await;

    let results = client_for(&server)
        .search("Grand Piece Online Boss")
        .await
        .expect("search should succeed");

    let titles: Vec<&str> = results.iter().map(|result| result.title.as_str()).collect();
    assert_eq!(titles, vec!["Sea King", "Kraken"]);
    assert_eq!(results[0].snippet, "The Sea King & friends");
    assert_eq!(results[0].extract, "A giant sea beast.");
    assert_eq!(results[0].source_url, format!("{}/wiki/Sea_King", server.uri()));
    assert_eq!(results[1].extract, "Tentacles.");
}

#[tokio::test]
async fn no_matches_is_an_empty_list() {
    let server = MockServer::start().await;
    mount_search(&server, json!({ "batchcomplete": "", "query": { "search": [] } })).await;

    let results = client_for(&server)
        .search("nothing here")
        .await
        .expect("empty search should succeed");
    assert!(results.is_empty());
}

#[tokio::test]
async fn missing_or_failed_extract_uses_placeholder() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        json!({ "query": { "search": [
            { "title": "Missing Page", "snippet": "" },
            { "title": "Broken Page", "snippet": "" },
        ] } }),
    )
    .await;
    mount_extract(
        &server,
        "Missing Page",
        ResponseTemplate::new(200)
            .set_body_json(json!({ "query": { "pages": { "-1": { "missing": "" } } } })),
    )
    .await;
    mount_extract(&server, "Broken Page", ResponseTemplate::new(500)).await;

    let results = client_for(&server)
        .search("pages")
        .await
        .expect("extract failures should not fail the search");

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.extract == NO_DESCRIPTION));
}

#[tokio::test]
async fn long_extract_is_truncated() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        json!({ "query": { "search": [{ "title": "Lore", "snippet": "" }] } }),
    )
    .await;
    mount_extract(
        &server,
        "Lore",
        ResponseTemplate::new(200).set_body_json(extract_body(&"é".repeat(1200))),
    )
    .await;

    let results = client_for(&server)
        .search("lore")
        .await
        .expect("search should succeed");
    assert_eq!(results[0].extract.chars().count(), 900);
}

#[tokio::test]
async fn api_error_object_fails_the_search() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        json!({ "error": { "code": "srsearch-error", "info": "Search backend unavailable" } }),
    )
    .await;

    let error = client_for(&server)
        .search("anything")
        .await
        .expect_err("API error should surface");
    assert!(matches!(error, WikiError::Api { ref code, .. } if code == "srsearch-error"));
}

#[tokio::test]
async fn http_failure_fails_the_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .search("anything")
        .await
        .expect_err("HTTP 503 should surface");
    assert!(matches!(
        error,
        WikiError::Status { operation: "search", status } if status.as_u16() == 503
    ));
}

#[tokio::test]
async fn undecodable_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .search("anything")
        .await
        .expect_err("HTML body should not decode");
    assert!(matches!(error, WikiError::Decode { .. }));
}

#[tokio::test]
async fn timed_out_search_fails_only_its_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("list", "search"))
        .and(query_param("srsearch", "Kraken Ship Boat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({ "query": { "search": [] } })),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    mount_search(&server, json!({ "query": { "search": [] } })).await;

    let render = RenderOptions::default();
    let sections = ContentAggregator::new(Arc::new(client_with(&server, impatient_http())))
        .with_render_options(render.clone())
        .aggregate("Kraken", &CancellationToken::new())
        .await
        .expect("a slow category should not fail the aggregation");

    assert_eq!(sections.len(), Category::ALL.len());
    assert_eq!(sections[&Category::Ship], render.failure);
    for category in Category::ALL.iter().filter(|category| **category != Category::Ship) {
        assert_eq!(sections[category], render.no_results, "{category}");
    }
}

#[tokio::test]
async fn timed_out_extract_uses_placeholder() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        json!({ "query": { "search": [{ "title": "Slow Page", "snippet": "slow" }] } }),
    )
    .await;
    mount_extract(
        &server,
        "Slow Page",
        ResponseTemplate::new(200)
            .set_delay(Duration::from_secs(2))
            .set_body_json(extract_body("Too late.")),
    )
    .await;

    let results = client_with(&server, impatient_http())
        .search("slow")
        .await
        .expect("a slow extract should not fail the search");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].snippet, "slow");
    assert_eq!(results[0].extract, NO_DESCRIPTION);
}
