mod models;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::ACCEPT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SourceError;

pub use models::{
    ActivityRecord, GameCounts, GameTally, Perf, Points, Profile, PuzzleTally, parse_activity,
};

pub const DEFAULT_API_BASE_URL: &str = "https://lichess.org/api";

/// Read-only access to per-user rating and activity data.
///
/// Implementations report any failure as `None`; a missing answer means "no
/// data available right now" and is never fatal for the caller.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch_profile(&self, handle: &str) -> Option<Profile>;

    async fn fetch_activity(&self, handle: &str) -> Option<Vec<ActivityRecord>>;
}

#[derive(Debug, Clone)]
pub struct LichessClient {
    client: Client,
    base_url: String,
}

impl LichessClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    fn user_url(&self, handle: &str) -> String {
        format!("{}/user/{}", self.base_url, urlencoding::encode(handle.trim()))
    }

    async fn get_json(&self, url: String) -> Result<Value, SourceError> {
        debug!(%url, "lichess request start");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| SourceError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { url, status });
        }

        response
            .json::<Value>()
            .await
            .map_err(|error| SourceError::Decode {
                url,
                message: error.to_string(),
            })
    }
}

#[async_trait]
impl StatsSource for LichessClient {
    async fn fetch_profile(&self, handle: &str) -> Option<Profile> {
        let url = self.user_url(handle);
        match self.get_json(url.clone()).await {
            Ok(payload) => {
                let profile = Profile::from_value(&payload);
                if profile.is_none() {
                    warn!(handle, %url, "lichess profile payload was not an object");
                }
                profile
            }
            Err(error) => {
                warn!(handle, %error, "failed to fetch lichess profile");
                None
            }
        }
    }

    async fn fetch_activity(&self, handle: &str) -> Option<Vec<ActivityRecord>> {
        let url = format!("{}/activity", self.user_url(handle));
        match self.get_json(url.clone()).await {
            Ok(payload) => {
                let records = parse_activity(&payload);
                if records.is_none() {
                    warn!(handle, %url, "lichess activity payload was not an array");
                }
                records
            }
            Err(error) => {
                warn!(handle, %error, "failed to fetch lichess activity");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::{ActivityRecord, Profile, StatsSource};

    /// In-memory source keyed by exact handle; missing entries are absent.
    #[derive(Debug, Default)]
    pub struct FakeSource {
        pub profiles: HashMap<String, Profile>,
        pub activity: HashMap<String, Vec<ActivityRecord>>,
    }

    impl FakeSource {
        pub fn with_user(
            mut self,
            handle: &str,
            profile: Profile,
            activity: Vec<ActivityRecord>,
        ) -> Self {
            self.profiles.insert(handle.to_owned(), profile);
            self.activity.insert(handle.to_owned(), activity);
            self
        }
    }

    #[async_trait]
    impl StatsSource for FakeSource {
        async fn fetch_profile(&self, handle: &str) -> Option<Profile> {
            self.profiles.get(handle).cloned()
        }

        async fn fetch_activity(&self, handle: &str) -> Option<Vec<ActivityRecord>> {
            self.activity.get(handle).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::SocketAddr,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode, header::ACCEPT},
        response::{IntoResponse, Response},
        routing::get,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::{LichessClient, StatsSource};

    type SeenAccept = Arc<Mutex<Vec<String>>>;

    fn record_accept(seen: &SeenAccept, headers: &HeaderMap) {
        let accept = headers
            .get(ACCEPT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        seen.lock().expect("accept log").push(accept);
    }

    async fn user(
        State(seen): State<SeenAccept>,
        Path(handle): Path<String>,
        headers: HeaderMap,
    ) -> Response {
        record_accept(&seen, &headers);
        match handle.as_str() {
            "known" => Json(json!({
                "username": "Known",
                "perfs": {"blitz": {"rating": 1800, "games": 40}},
                "count": {"all": 40, "rated": 40}
            }))
            .into_response(),
            "broken" => (StatusCode::OK, "{\"username\": ").into_response(),
            _ => (StatusCode::NOT_FOUND, "{\"error\":\"Not found\"}").into_response(),
        }
    }

    async fn activity(
        State(seen): State<SeenAccept>,
        Path(handle): Path<String>,
        headers: HeaderMap,
    ) -> Response {
        record_accept(&seen, &headers);
        match handle.as_str() {
            "known" => Json(json!([
                {"interval": {"start": 1_000, "end": 2_000}, "games": {"blitz": {"win": 1, "loss": 0, "draw": 0}}}
            ]))
            .into_response(),
            "object" => Json(json!({"interval": {"start": 1_000, "end": 2_000}})).into_response(),
            "broken" => (StatusCode::OK, "[{").into_response(),
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }

    async fn fake_api() -> (LichessClient, SeenAccept) {
        let seen = SeenAccept::default();
        let app = Router::new()
            .route("/api/user/{handle}", get(user))
            .route("/api/user/{handle}/activity", get(activity))
            .with_state(seen.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr: SocketAddr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = LichessClient::new(format!("http://{addr}/api"), Duration::from_secs(5))
            .expect("client should build");
        (client, seen)
    }

    #[test]
    fn user_url_escapes_handle() {
        let client = LichessClient::new("https://lichess.org/api/", Duration::from_secs(5))
            .expect("client should build");
        assert_eq!(
            client.user_url("some user/../x"),
            "https://lichess.org/api/user/some%20user%2F..%2Fx"
        );
        assert_eq!(
            client.user_url(" DrNykterstein "),
            "https://lichess.org/api/user/DrNykterstein"
        );
    }

    #[tokio::test]
    async fn unreachable_api_reports_absent_data() {
        let client = LichessClient::new("http://127.0.0.1:9", Duration::from_secs(2))
            .expect("client should build");

        assert!(client.fetch_profile("anyone").await.is_none());
        assert!(client.fetch_activity("anyone").await.is_none());
    }

    #[tokio::test]
    async fn successful_responses_are_parsed() {
        let (client, seen) = fake_api().await;

        let profile = client.fetch_profile("known").await.expect("profile");
        assert_eq!(profile.username, "Known");
        assert_eq!(profile.perf("blitz").map(|perf| perf.rating), Some(1800));

        let records = client.fetch_activity("known").await.expect("activity");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tally("blitz").map(|tally| tally.played()), Some(1));

        let seen = seen.lock().expect("accept log");
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|accept| accept == "application/json"));
    }

    #[tokio::test]
    async fn error_statuses_report_absent_data() {
        let (client, _) = fake_api().await;

        assert!(client.fetch_profile("missing").await.is_none());
        assert!(client.fetch_activity("missing").await.is_none());
    }

    #[tokio::test]
    async fn malformed_bodies_report_absent_data() {
        let (client, _) = fake_api().await;

        assert!(client.fetch_profile("broken").await.is_none());
        assert!(client.fetch_activity("broken").await.is_none());
        // Valid JSON, but not an array.
        assert!(client.fetch_activity("object").await.is_none());
    }
}
