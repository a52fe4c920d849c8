//! Liveness and outcome pings to monitoring endpoints.
//!
//! Healthchecks-style endpoints get the message as a plain-text body on the
//! phase-specific URL; anything else gets a small JSON document. Each
//! endpoint gets one attempt per call, and a failing endpoint never affects
//! the others or the run.

use crate::utils::errors::Result;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

const USER_AGENT: &str = concat!("backups-reporter/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Success,
    Failure,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Success => "success",
            Phase::Failure => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PingTarget {
    /// POST the message as text to this URL
    Healthcheck(String),
    /// POST a JSON payload to this URL
    Json(String),
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    status: &'static str,
    message: &'a str,
    timestamp: String,
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl WebhookNotifier {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, endpoints })
    }

    /// Ping every endpoint once. Returns how many accepted the ping.
    pub async fn notify(&self, phase: Phase, message: &str) -> usize {
        let mut delivered = 0;

        for endpoint in &self.endpoints {
            match self.ping(endpoint, phase, message).await {
                Ok(()) => {
                    info!("Webhook notification sent successfully to {}", endpoint);
                    delivered += 1;
                }
                Err(e) => error!("Failed to send webhook notification to {}: {}", endpoint, e),
            }
        }

        delivered
    }

    async fn ping(&self, endpoint: &str, phase: Phase, message: &str) -> reqwest::Result<()> {
        let request = match ping_target(endpoint, phase) {
            PingTarget::Healthcheck(url) => self.client.post(url).body(message.to_string()),
            PingTarget::Json(url) => self.client.post(url).json(&WebhookPayload {
                status: phase.as_str(),
                message,
                timestamp: Utc::now().to_rfc3339(),
            }),
        };

        request.send().await?.error_for_status()?;
        Ok(())
    }
}

fn ping_target(endpoint: &str, phase: Phase) -> PingTarget {
    let healthcheck = endpoint.contains("healthchecks.io")
        || endpoint.contains("hc-ping.com")
        || endpoint.ends_with("/start")
        || endpoint.ends_with("/fail");

    if !healthcheck {
        return PingTarget::Json(endpoint.to_string());
    }

    let base = endpoint
        .strip_suffix("/start")
        .or_else(|| endpoint.strip_suffix("/fail"))
        .unwrap_or(endpoint)
        .trim_end_matches('/');

    PingTarget::Healthcheck(match phase {
        Phase::Start => format!("{}/start", base),
        Phase::Success => base.to_string(),
        Phase::Failure => format!("{}/fail", base),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{StatusCode, Uri};
    use std::sync::{Arc, Mutex};

    type Hits = Arc<Mutex<Vec<(String, String)>>>;

    async fn spawn_receiver(status: StatusCode) -> (String, Hits) {
        let hits: Hits = Arc::new(Mutex::new(Vec::new()));
        let recorded = hits.clone();

        let app = axum::Router::new().fallback(move |uri: Uri, body: String| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push((uri.path().to_string(), body));
                status
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), hits)
    }

    fn notifier(endpoints: Vec<String>) -> WebhookNotifier {
        WebhookNotifier::new(endpoints, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_healthcheck_urls() {
        let base = "https://hc-ping.com/0f3b";
        assert_eq!(
            ping_target(base, Phase::Start),
            PingTarget::Healthcheck("https://hc-ping.com/0f3b/start".into())
        );
        assert_eq!(
            ping_target(base, Phase::Success),
            PingTarget::Healthcheck("https://hc-ping.com/0f3b".into())
        );
        assert_eq!(
            ping_target(base, Phase::Failure),
            PingTarget::Healthcheck("https://hc-ping.com/0f3b/fail".into())
        );
    }

    #[test]
    fn test_phase_suffix_marks_healthcheck() {
        let endpoint = "https://status.example.com/ping/nightly/start";
        assert_eq!(
            ping_target(endpoint, Phase::Success),
            PingTarget::Healthcheck("https://status.example.com/ping/nightly".into())
        );
        assert_eq!(
            ping_target(endpoint, Phase::Failure),
            PingTarget::Healthcheck("https://status.example.com/ping/nightly/fail".into())
        );
    }

    #[test]
    fn test_generic_endpoint_gets_json() {
        let endpoint = "https://hooks.example.com/backups";
        assert_eq!(
            ping_target(endpoint, Phase::Start),
            PingTarget::Json(endpoint.into())
        );
    }

    #[tokio::test]
    async fn test_dead_endpoint_does_not_block_others() {
        let (base, hits) = spawn_receiver(StatusCode::OK).await;
        let notifier = notifier(vec![
            "http://127.0.0.1:1/ping/dead/start".to_string(),
            format!("{}/ping/live/start", base),
        ]);

        let delivered = notifier.notify(Phase::Success, "42 entries").await;

        assert_eq!(delivered, 1);
        let hits = hits.lock().unwrap();
        assert_eq!(*hits, vec![("/ping/live".to_string(), "42 entries".to_string())]);
    }

    #[tokio::test]
    async fn test_json_payload() {
        let (base, hits) = spawn_receiver(StatusCode::OK).await;
        let notifier = notifier(vec![format!("{}/hooks/backups", base)]);

        assert_eq!(notifier.notify(Phase::Failure, "mail relay down").await, 1);

        let hits = hits.lock().unwrap();
        let (path, body) = &hits[0];
        assert_eq!(path, "/hooks/backups");

        let payload: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(payload["status"], "fail");
        assert_eq!(payload["message"], "mail relay down");
        assert!(payload["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_error_status_counts_as_failure() {
        let (base, hits) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
        let notifier = notifier(vec![format!("{}/hooks/backups", base)]);

        assert_eq!(notifier.notify(Phase::Start, "started").await, 0);
        assert_eq!(hits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_endpoints() {
        assert_eq!(notifier(Vec::new()).notify(Phase::Start, "started").await, 0);
    }
}
