//! REST API source: one JSON POST whose response body becomes a dataset.
use crate::core::{Result, TabloadError};
use crate::dataset::Dataset;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

/// Sends `payload` to `url` with a default client; see [`fetch_with_client`].
pub fn fetch(url: &str, payload: &JsonValue) -> Result<Option<Dataset>> {
    let client = Client::builder().build()?;
    fetch_with_client(&client, url, payload)
}

/// POSTs `payload` as a JSON body.
///
/// Returns `Ok(None)` when the server answers with anything but 200; the
/// status is logged. Transport failures and undecodable 200 bodies are errors.
/// The payload is sent with `Content-Type: application/json`.
pub fn fetch_with_client(client: &Client, url: &str, payload: &JsonValue) -> Result<Option<Dataset>> {
    let url = Url::parse(url).map_err(|e| TabloadError::Request(format!("invalid URL '{}': {}", url, e)))?;
    debug!(url = %url, "posting request");

    let response = client.post(url.clone()).json(payload).send()?;

    let status = response.status();
    if status != StatusCode::OK {
        warn!(url = %url, status = status.as_u16(), "POST request failed");
        return Ok(None);
    }

    let document: JsonValue = response.json()?;
    let dataset = Dataset::from_json(document)?;
    info!(url = %url, rows = dataset.len(), "fetched dataset from API");
    Ok(Some(dataset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;
    use crate::test_utils::serve_once;
    use serde_json::json;

    #[test]
    fn test_fetch_records() {
        let server = serve_once("200 OK", r#"[{"date":"2020-03-01","cases":2},{"date":"2020-03-02","cases":5}]"#);
        let data = fetch(&server.url, &json!({"code": "BR"})).unwrap().unwrap();

        assert_eq!(data.columns(), &["date", "cases"]);
        assert_eq!(data.rows()[1][1], Value::Integer(5));

        let request = server.request();
        assert!(request.starts_with("POST /"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"code":"BR"}"#));
    }

    #[test]
    fn test_non_200_returns_none() {
        let server = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
        let result = fetch(&server.url, &json!({})).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_created_is_not_ok() {
        let server = serve_once("201 Created", "[]");
        assert!(fetch(&server.url, &json!({})).unwrap().is_none());
    }

    #[test]
    fn test_invalid_json_body() {
        let server = serve_once("200 OK", "not json");
        match fetch(&server.url, &json!({})) {
            Err(TabloadError::Http(e)) => assert!(e.is_decode()),
            other => panic!("Expected a decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(fetch("not a url", &json!({})), Err(TabloadError::Request(_))));
    }
}
