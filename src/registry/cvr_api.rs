// 🌐 CVR API Source - Live lookups against the Danish business registry
//
// GET {base_url}?search={number}&country={country}
// One request per lookup, bounded by the configured timeout. No retries.

use super::{RegistryPayload, RegistrySource};
use crate::config::RegistryConfig;
use crate::entities::RegistryNumber;
use crate::error::{Result, SyncError};
use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

pub struct CvrApiSource {
    http: Client,
    base_url: String,
    country: String,
}

impl CvrApiSource {
    pub fn new(config: &RegistryConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build registry HTTP client")?;

        Ok(CvrApiSource {
            http,
            base_url: config.base_url.clone(),
            country: config.country.clone(),
        })
    }
}

impl RegistrySource for CvrApiSource {
    fn fetch(&self, number: &RegistryNumber) -> Result<RegistryPayload> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("search", number.as_str()), ("country", self.country.as_str())])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::Unreachable(format!("request to {} timed out", self.base_url))
                } else {
                    SyncError::Unreachable(format!("request to {} failed: {}", self.base_url, e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| SyncError::Unreachable(format!("failed to read response body: {}", e)))?;

        debug!(
            registry_number = %number,
            status = status.as_u16(),
            bytes = body.len(),
            "registry response"
        );

        if status == StatusCode::NOT_FOUND {
            return Err(not_found(number));
        }

        if !status.is_success() {
            // The API reports some lookups as errors with a JSON body
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                if let Some(code) = service_error(&value) {
                    return Err(classify_service_error(number, code));
                }
            }
            return Err(SyncError::Unreachable(format!("registry returned HTTP {}", status)));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| SyncError::MalformedResponse(format!("invalid JSON: {}", e)))?;

        if let Some(code) = service_error(&value) {
            return Err(classify_service_error(number, code));
        }

        RegistryPayload::from_json(&value)
    }

    fn name(&self) -> &str {
        "cvrapi"
    }
}

fn service_error(value: &Value) -> Option<&str> {
    value.get("error").and_then(Value::as_str)
}

/// NOT_FOUND is a real answer; everything else (quota, bad request) is the service refusing
fn classify_service_error(number: &RegistryNumber, code: &str) -> SyncError {
    if code.eq_ignore_ascii_case("NOT_FOUND") {
        not_found(number)
    } else {
        SyncError::Unreachable(format!("registry refused the request: {}", code))
    }
}

fn not_found(number: &RegistryNumber) -> SyncError {
    SyncError::NotFound(format!("registry number {}", number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    /// Serves exactly one HTTP response, reporting the request head on the channel
    fn serve_once(status: &str, body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = stream.read(&mut buf).unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
                let _ = stream.write_all(response.as_bytes());
            }
        });

        (format!("http://{}/api", addr), rx)
    }

    fn source_for(base_url: String, timeout: Duration) -> CvrApiSource {
        CvrApiSource::new(&RegistryConfig {
            base_url,
            timeout,
            ..RegistryConfig::default()
        })
        .unwrap()
    }

    fn number() -> RegistryNumber {
        RegistryNumber::parse("28856636").unwrap()
    }

    #[test]
    fn test_success_parses_payload_and_sends_query() {
        let body = r#"{"vat":28856636,"name":"ÅRHUS ApS","address":"Testvej 1","zipcode":"8000","city":"Århus C","phone":null}"#;
        let (url, requests) = serve_once("200 OK", body);
        let source = source_for(url, Duration::from_secs(5));

        let payload = source.fetch(&number()).unwrap();
        assert_eq!(payload.name.as_deref(), Some("ÅRHUS ApS"));
        assert_eq!(payload.city.as_deref(), Some("Århus C"));
        assert!(payload.phone.is_none());

        let request = requests.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(request.starts_with("GET /api?search=28856636&country=dk "), "{}", request);
        assert!(request.to_lowercase().contains("user-agent: company manager"));
    }

    #[test]
    fn test_http_404_is_not_found() {
        let (url, _rx) = serve_once("404 Not Found", r#"{"error":"NOT_FOUND"}"#);
        let err = source_for(url, Duration::from_secs(5)).fetch(&number()).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)), "{:?}", err);
    }

    #[test]
    fn test_not_found_error_body_is_not_found() {
        let (url, _rx) = serve_once("200 OK", r#"{"error":"NOT_FOUND"}"#);
        let err = source_for(url, Duration::from_secs(5)).fetch(&number()).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)), "{:?}", err);
    }

    #[test]
    fn test_quota_error_is_unreachable() {
        let (url, _rx) = serve_once("402 Payment Required", r#"{"error":"QUOTA_EXCEEDED"}"#);
        let err = source_for(url, Duration::from_secs(5)).fetch(&number()).unwrap_err();
        assert!(matches!(err, SyncError::Unreachable(_)), "{:?}", err);
    }

    #[test]
    fn test_server_error_is_unreachable() {
        let (url, _rx) = serve_once("503 Service Unavailable", "<html>down</html>");
        let err = source_for(url, Duration::from_secs(5)).fetch(&number()).unwrap_err();
        assert!(matches!(err, SyncError::Unreachable(_)), "{:?}", err);
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        let (url, _rx) = serve_once("200 OK", "<html>not json</html>");
        let err = source_for(url, Duration::from_secs(5)).fetch(&number()).unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse(_)), "{:?}", err);
    }

    #[test]
    fn test_non_object_json_is_malformed() {
        let (url, _rx) = serve_once("200 OK", "[]");
        let err = source_for(url, Duration::from_secs(5)).fetch(&number()).unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse(_)), "{:?}", err);
    }

    #[test]
    fn test_connection_refused_is_unreachable() {
        // Grab a free port, then close it
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let source = source_for(format!("http://127.0.0.1:{}/api", port), Duration::from_secs(2));

        let err = source.fetch(&number()).unwrap_err();
        assert!(matches!(err, SyncError::Unreachable(_)), "{:?}", err);
    }

    #[test]
    fn test_slow_registry_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((_stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(3));
            }
        });

        let source = source_for(format!("http://{}/api", addr), Duration::from_millis(300));
        let err = source.fetch(&number()).unwrap_err();
        assert!(matches!(err, SyncError::Unreachable(_)), "{:?}", err);
    }
}
