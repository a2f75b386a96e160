//! Client and harnesses for a model served over the `/v1/models/{name}:predict` REST protocol.

use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::report::{CheckResult, ValidationReport};
use crate::stats::{mean, LatencySummary};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";
pub const DEFAULT_MODEL_NAME: &str = "complex-cnn-model";

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub metadata_timeout: Duration,
    pub predict_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: DEFAULT_BASE_URL.to_owned(),
            metadata_timeout: Duration::from_secs(10),
            predict_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("cannot decode the response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("none of the {requests} requests succeeded")]
    NoSuccessfulRequests { requests: usize },
}

#[derive(Debug)]
pub struct RemoteClient {
    config: RemoteConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Value>,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(concat!("edgekit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RemoteError::Client)?;
        Ok(RemoteClient { config, client })
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    pub fn server_metadata(&self) -> Result<Value, RemoteError> {
        let url = format!("{}/v1/", self.base_url());
        let request = self.client.get(&url).timeout(self.config.metadata_timeout);
        send_json(request, &url)
    }

    pub fn model_metadata(&self, model: &str) -> Result<Value, RemoteError> {
        let url = format!("{}/v1/models/{}", self.base_url(), model);
        let request = self.client.get(&url).timeout(self.config.metadata_timeout);
        send_json(request, &url)
    }

    pub fn predict(&self, model: &str, version: Option<&str>, instances: &[Value]) -> Result<Vec<Value>, RemoteError> {
        let url = self.predict_url(model, version);
        let request = self
            .client
            .post(&url)
            .timeout(self.config.predict_timeout)
            .json(&json!({ "instances": instances }));

        let response: PredictResponse = send_json(request, &url)?;
        Ok(response.predictions)
    }

    fn predict_url(&self, model: &str, version: Option<&str>) -> String {
        match version {
            Some(version) => format!("{}/v1/models/{}/versions/{}:predict", self.base_url(), model, version),
            None => format!("{}/v1/models/{}:predict", self.base_url(), model),
        }
    }
}

fn send_json<T: DeserializeOwned>(request: RequestBuilder, url: &str) -> Result<T, RemoteError> {
    debug!("Sending request to {}", url);

    let response = request.send().map_err(|source| RemoteError::Request {
        url: url.to_owned(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(RemoteError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
            body,
        });
    }

    let body = response.bytes().map_err(|source| RemoteError::Request {
        url: url.to_owned(),
        source,
    })?;
    serde_json::from_slice(&body).map_err(|source| RemoteError::Decode {
        url: url.to_owned(),
        source,
    })
}

/// The instance sent by the smoke test and the remote benchmark unless another one is given.
pub fn default_instance() -> Value {
    json!({ "data": [1.0, 2.0, 3.0, 4.0] })
}

/// Check that the server answers, knows the model and returns predictions for the default instance.
pub fn smoke_test(client: &RemoteClient, model: &str, version: Option<&str>) -> ValidationReport {
    let mut report = ValidationReport::new();

    let server = match client.server_metadata() {
        Ok(_) => CheckResult::pass(format!("Server at {} is reachable", client.base_url())),
        Err(e) => CheckResult::fail(e.to_string()),
    };
    report.insert("server_reachable", server);

    let metadata = match client.model_metadata(model) {
        Ok(metadata) => {
            debug!("Model metadata: {}", metadata);
            CheckResult::pass(format!("Model '{}' is available", model))
        }
        Err(e) => CheckResult::fail(e.to_string()),
    };
    report.insert("model_metadata", metadata);

    let prediction = match client.predict(model, version, &[default_instance()]) {
        Ok(predictions) => CheckResult::pass(format!("Received {} predictions", predictions.len())),
        Err(e) => CheckResult::fail(e.to_string()),
    };
    report.insert("prediction", prediction);

    report
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteBenchmarkResult {
    pub requests: usize,
    pub successes: usize,
    pub failures: usize,
    /// Mean latency of the successful requests.
    pub average_ms: f64,
    pub latency: LatencySummary,
}

impl RemoteBenchmarkResult {
    pub fn success_rate(&self) -> f64 {
        self.successes as f64 / self.requests as f64
    }
}

/// Send `requests` sequential predictions, timing the successful ones.
pub fn remote_benchmark(
    client: &RemoteClient,
    model: &str,
    version: Option<&str>,
    instance: &Value,
    requests: usize,
) -> Result<RemoteBenchmarkResult, RemoteError> {
    info!("Sending {} requests to model '{}' at {}", requests, model, client.base_url());

    let instances = [instance.clone()];
    let mut samples = Vec::with_capacity(requests);
    let mut failures = 0;

    for i in 0..requests {
        let start = Instant::now();
        match client.predict(model, version, &instances) {
            Ok(_) => samples.push(start.elapsed().as_secs_f64() * 1000.0),
            Err(e) => {
                debug!("Request {} failed: {}", i, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        warn!("{} of {} requests failed", failures, requests);
    }

    let (Some(latency), Some(average_ms)) = (LatencySummary::from_samples(&samples), mean(&samples)) else {
        return Err(RemoteError::NoSuccessfulRequests { requests });
    };

    Ok(RemoteBenchmarkResult {
        requests,
        successes: samples.len(),
        failures,
        average_ms,
        latency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_urls() {
        let client = RemoteClient::new(RemoteConfig {
            base_url: "http://example.com:8001/".to_owned(),
            ..RemoteConfig::default()
        })
        .unwrap();

        assert_eq!(client.base_url(), "http://example.com:8001");
        assert_eq!(
            client.predict_url("net", Some("2")),
            "http://example.com:8001/v1/models/net/versions/2:predict"
        );
        assert_eq!(client.predict_url("net", None), "http://example.com:8001/v1/models/net:predict");
    }
}
