use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{ Deserialize, Serialize };
use std::time::Duration;
use thiserror::Error;

use crate::config::NetworkConfig;
use crate::report::Report;
use crate::types::{ AssignOutcome, AssignRequest, OccupancyResult };

/// Failure of one call to the stand service
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("empty response body")]
    EmptyBody,
}

impl SyncError {
    /// HTTP status for logging, 0 when no response was received
    pub fn status(&self) -> u16 {
        match self {
            SyncError::Transport(e) => e.status().map_or(0, |s| s.as_u16()),
            SyncError::Status(status) => *status,
            SyncError::Malformed(_) | SyncError::EmptyBody => 0,
        }
    }
}

/// Remote authority that owns stand allocation.
///
/// Occupancy operations return `Ok(None)` when the service answered with an empty body.
#[async_trait]
pub trait StandAuthority: Send + Sync {
    /// Push the ground picture; controlling positions only
    async fn push_report(&self, report: &Report, token: &str) -> Result<Option<OccupancyResult>, SyncError>;

    /// Current occupancy without reporting
    async fn pull_occupancy(&self, token: Option<&str>) -> Result<Option<OccupancyResult>, SyncError>;

    /// Complete stand inventory of an airport
    async fn pull_stands_for_airport(&self, icao: &str) -> Result<Vec<String>, SyncError>;

    /// Manually assign or free a stand
    async fn request_assign(&self, request: &AssignRequest) -> Result<AssignOutcome, SyncError>;

    fn base_url(&self) -> String;

    fn set_base_url(&self, url: &str);
}

/// Report body as sent on the wire
#[derive(Serialize)]
struct ReportEnvelope<'a> {
    #[serde(flatten)]
    report: &'a Report,
    token: &'a str,
}

#[derive(Deserialize)]
struct AssignEnvelope {
    message: AssignMessage,
}

#[derive(Deserialize)]
struct AssignMessage {
    action: String,

    #[serde(default)]
    message: Option<String>,
}

/// Parse an occupancy body, `None` for an empty body
pub fn parse_occupancy(body: &str) -> Result<Option<OccupancyResult>, SyncError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

/// Parse a stand inventory, a JSON object keyed by stand name
pub fn parse_stands(body: &str) -> Result<Vec<String>, SyncError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let stands: serde_json::Map<String, serde_json::Value> = serde_json::from_str(body)?;
    Ok(stands.into_iter().map(|(name, _)| name).collect())
}

/// Parse the service decision on a manual request
pub fn parse_assign(body: &str) -> Result<AssignOutcome, SyncError> {
    if body.trim().is_empty() {
        return Err(SyncError::EmptyBody);
    }
    let envelope: AssignEnvelope = serde_json::from_str(body)?;
    let AssignMessage { action, message } = envelope.message;

    Ok(match action.as_str() {
        "assign" => AssignOutcome::Assigned,
        "free" => AssignOutcome::Freed,
        _ => AssignOutcome::Rejected(message.unwrap_or(action)),
    })
}

/// Normalize a user supplied host or URL into a base URL
pub fn normalize_base_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// HTTP client for the stand service
pub struct RemoteClient {
    base_url: RwLock<String>,
    config: NetworkConfig,
    client: reqwest::Client,
}

impl RemoteClient {
    pub fn new(config: &NetworkConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client
            ::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            base_url: RwLock::new(normalize_base_url(&config.api_base_url)),
            config: config.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.read(), path)
    }

    /// Send the request and return the body of a 2xx response
    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<String, SyncError> {
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }

        Ok(resp.text().await?)
    }
}

#[async_trait]
impl StandAuthority for RemoteClient {
    async fn push_report(&self, report: &Report, token: &str) -> Result<Option<OccupancyResult>, SyncError> {
        let url = self.url(&self.config.report_path);
        let body = self.fetch(self.client.post(&url).json(&(ReportEnvelope { report, token }))).await?;

        parse_occupancy(&body)
    }

    async fn pull_occupancy(&self, token: Option<&str>) -> Result<Option<OccupancyResult>, SyncError> {
        let url = self.url(&self.config.occupancy_path);
        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.query(&[("token", token)]);
        }

        let body = self.fetch(request).await?;
        parse_occupancy(&body)
    }

    async fn pull_stands_for_airport(&self, icao: &str) -> Result<Vec<String>, SyncError> {
        let url = self.url(&self.config.stands_path.replace("{icao}", icao));
        let body = self.fetch(self.client.get(&url)).await?;

        parse_stands(&body)
    }

    async fn request_assign(&self, request: &AssignRequest) -> Result<AssignOutcome, SyncError> {
        let url = self.url(&self.config.assign_path);
        let query = [
            ("stand", request.stand.as_str()),
            ("icao", request.icao.as_str()),
            ("callsign", request.callsign.as_str()),
            ("token", request.token.as_str()),
            ("client", request.client.as_str()),
        ];

        let body = self.fetch(self.client.get(&url).query(&query)).await?;
        parse_assign(&body)
    }

    fn base_url(&self) -> String {
        self.base_url.read().clone()
    }

    fn set_base_url(&self, url: &str) {
        let url = normalize_base_url(url);
        tracing::info!("Stand service base URL set to {}", url);
        *self.base_url.write() = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportedTraffic;

    #[test]
    fn occupancy_body_maps_all_three_sets() {
        let body = r#"{
            "assignedStands": [{"name": "12", "callsign": "AFR123", "remark": "Schengen"}],
            "occupiedStands": [{"name": "7", "callsign": "EZY45"}],
            "blockedStands": [{"name": "K1"}]
        }"#;

        let result = parse_occupancy(body).unwrap().unwrap();
        assert_eq!(result.assigned[0].remark.as_deref(), Some("Schengen"));
        assert_eq!(result.occupied[0].callsign, "EZY45");
        assert_eq!(result.blocked[0].callsign, "");

        let shown: Vec<&str> = result.displayed_records().map(|r| r.name.as_str()).collect();
        assert_eq!(shown, vec!["12", "7"]);
    }

    #[test]
    fn empty_body_is_an_empty_success() {
        assert_eq!(parse_occupancy("").unwrap(), None);
        assert_eq!(parse_occupancy("  \n").unwrap(), None);
        assert!(parse_stands("").unwrap().is_empty());
    }

    #[test]
    fn missing_sets_default_to_empty() {
        let result = parse_occupancy("{}").unwrap().unwrap();
        assert_eq!(result, OccupancyResult::default());
    }

    #[test]
    fn garbage_is_malformed() {
        let err = parse_occupancy("<html>502</html>").unwrap_err();
        assert!(matches!(err, SyncError::Malformed(_)));
        assert_eq!(err.status(), 0);
        assert!(matches!(parse_stands("[1, 2]"), Err(SyncError::Malformed(_))));
    }

    #[test]
    fn stand_inventory_uses_object_keys() {
        let mut stands = parse_stands(r#"{"2A": {"coords": [1, 2]}, "10": {}, "2": {}}"#).unwrap();
        stands.sort();
        assert_eq!(stands, vec!["10", "2", "2A"]);
    }

    #[test]
    fn assign_actions() {
        assert_eq!(
            parse_assign(r#"{"message": {"action": "assign", "message": "ok"}}"#).unwrap(),
            AssignOutcome::Assigned
        );
        assert_eq!(parse_assign(r#"{"message": {"action": "free"}}"#).unwrap(), AssignOutcome::Freed);
        assert_eq!(
            parse_assign(r#"{"message": {"action": "reject", "message": "Stand 14A is blocked"}}"#).unwrap(),
            AssignOutcome::Rejected("Stand 14A is blocked".to_string())
        );
        assert!(matches!(parse_assign(""), Err(SyncError::EmptyBody)));
        assert!(matches!(parse_assign(r#"{"action": "assign"}"#), Err(SyncError::Malformed(_))));
    }

    #[test]
    fn report_envelope_adds_token() {
        let report = Report {
            client: "LFPG_APP".to_string(),
            aircrafts: ReportedTraffic::default(),
        };
        let json = serde_json::to_value(ReportEnvelope { report: &report, token: "abc" }).unwrap();
        assert_eq!(json["client"], "LFPG_APP");
        assert_eq!(json["token"], "abc");
        assert!(json["aircrafts"]["onGround"].is_object());
    }

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_base_url("pintade.vatsim.fr/rampagent/api/"), "https://pintade.vatsim.fr/rampagent/api");
        assert_eq!(normalize_base_url("http://127.0.0.1:3000"), "http://127.0.0.1:3000");
    }

    #[test]
    fn status_of_http_error() {
        assert_eq!(SyncError::Status(503).status(), 503);
        assert_eq!(SyncError::Status(503).to_string(), "HTTP status 503");
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_failure() {
        let config = NetworkConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            connect_timeout_secs: 1,
            request_timeout_secs: 1,
            ..NetworkConfig::default()
        };
        let client = RemoteClient::new(&config).unwrap();

        let err = client.pull_occupancy(None).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert_eq!(err.status(), 0);
    }

    /// Answer one HTTP request with `status` and `body`, yielding the request line
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{ AsyncReadExt, AsyncWriteExt };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            let request = String::from_utf8_lossy(&request).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });

        (base_url, handle)
    }

    fn client_for(base_url: String) -> RemoteClient {
        RemoteClient::new(&NetworkConfig { api_base_url: base_url, ..NetworkConfig::default() }).unwrap()
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let (base_url, server) = serve_once("404 Not Found", "").await;
        let client = client_for(base_url);

        let err = client.pull_occupancy(Some("tok")).await.unwrap_err();
        assert!(matches!(err, SyncError::Status(404)), "{err:?}");
        assert_eq!(err.status(), 404);
        assert_eq!(server.await.unwrap(), "GET /occupancy/?token=tok HTTP/1.1");
    }

    #[tokio::test]
    async fn empty_success_body_means_no_data() {
        let (base_url, server) = serve_once("200 OK", "").await;
        let client = client_for(base_url);

        assert_eq!(client.pull_occupancy(None).await.unwrap(), None);
        assert_eq!(server.await.unwrap(), "GET /occupancy/ HTTP/1.1");
    }

    #[tokio::test]
    async fn assign_request_is_sent_as_query() {
        let (base_url, server) = serve_once("200 OK", r#"{"message": {"action": "assign"}}"#).await;
        let client = client_for(base_url);
        let request = AssignRequest {
            stand: "14A".to_string(),
            icao: "LFPG".to_string(),
            callsign: "AFR1".to_string(),
            token: "t".to_string(),
            client: "LFPG_GND".to_string(),
        };

        assert_eq!(client.request_assign(&request).await.unwrap(), AssignOutcome::Assigned);
        assert_eq!(
            server.await.unwrap(),
            "GET /assign?stand=14A&icao=LFPG&callsign=AFR1&token=t&client=LFPG_GND HTTP/1.1"
        );
    }

    #[test]
    fn base_url_can_change_at_runtime() {
        let client = RemoteClient::new(&NetworkConfig::default()).unwrap();
        client.set_base_url("127.0.0.1:3000");
        assert_eq!(client.base_url(), "https://127.0.0.1:3000");
        assert_eq!(client.url("/report"), "https://127.0.0.1:3000/report");
    }
}
