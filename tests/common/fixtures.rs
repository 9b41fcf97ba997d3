//! Mock article server and work item generators

use std::time::Duration;

use autobatch::WorkItem;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 2024-03-01T12:00:00Z
pub const PUBLISHED_AT: i64 = 1_709_294_400;

/// HTML body served for article `i`
pub fn article_body(i: usize) -> String {
    format!("<html><body><h1>Article {i}</h1></body></html>")
}

/// Start a server serving `count` articles at `/articles/{i}`; indices in `missing` answer 404.
pub async fn article_server(count: usize, missing: &[usize]) -> MockServer {
    let server = MockServer::start().await;
    for i in 0..count {
        let response = if missing.contains(&i) {
            ResponseTemplate::new(404)
        } else {
            ResponseTemplate::new(200).set_body_string(article_body(i))
        };
        Mock::given(method("GET"))
            .and(path(format!("/articles/{i}")))
            .respond_with(response)
            .mount(&server)
            .await;
    }
    server
}

/// Start a server answering every request after `delay`
pub async fn slow_article_server(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_body(0))
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

/// Work items pointing at the articles of `server`
pub fn article_items(server: &MockServer, count: usize) -> Vec<WorkItem> {
    (0..count)
        .map(|i| {
            WorkItem::new(format!("a{i}"), format!("Article {i}"), PUBLISHED_AT)
                .with_url(format!("{}/articles/{i}", server.uri()))
        })
        .collect()
}

/// Work items whose host refuses connections
pub fn unreachable_items(count: usize) -> Vec<WorkItem> {
    (0..count)
        .map(|i| {
            WorkItem::new(format!("down{i}"), format!("Down {i}"), PUBLISHED_AT)
                .with_url(format!("http://127.0.0.1:1/articles/{i}"))
        })
        .collect()
}
