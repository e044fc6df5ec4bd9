use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

use tracker_logging::{tracker_debug, tracker_warn};

use crate::{
    ApiError, ClientSettings, CommandAck, CredentialDto, CredentialList, FailureKind, ListQuery,
    MigrationDto, MigrationId, MigrationOptions, MigrationPage, ProgressDto, RemoteCommand,
};

const MIGRATIONS: &str = "migrations";
const CREDENTIALS: &str = "credentials";

/// Snapshot source and command sink for migrations.
#[async_trait::async_trait]
pub trait MigrationApi: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<MigrationPage, ApiError>;

    /// Creates a migration; the service answers with it still pending.
    async fn create(&self, options: &MigrationOptions) -> Result<MigrationDto, ApiError>;

    async fn get(&self, migration_id: MigrationId) -> Result<MigrationDto, ApiError>;

    async fn progress(&self, migration_id: MigrationId) -> Result<ProgressDto, ApiError>;

    async fn command(
        &self,
        migration_id: MigrationId,
        command: RemoteCommand,
    ) -> Result<CommandAck, ApiError>;

    async fn credentials(&self) -> Result<Vec<CredentialDto>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestMigrationApi {
    base: Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl ReqwestMigrationApi {
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.api_base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{base} cannot be used as an API base"),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            base,
            token: settings.api_token.clone(),
            client,
        })
    }

    fn endpoint(&self, resource: &str, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::new(FailureKind::InvalidUrl, self.base.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", resource])
            .extend(segments);
        Ok(url)
    }

    fn migration(&self, segments: &[&str]) -> Result<Url, ApiError> {
        self.endpoint(MIGRATIONS, segments)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        tracker_debug!("{} {}", method, url);
        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }
        Ok((status, body.to_vec()))
    }

    async fn send_json<T: DeserializeOwned>(&self, method: Method, url: Url) -> Result<T, ApiError> {
        let (_, body) = self.send(method, url, None).await?;
        decode(&body)
    }
}

#[async_trait::async_trait]
impl MigrationApi for ReqwestMigrationApi {
    async fn list(&self, query: &ListQuery) -> Result<MigrationPage, ApiError> {
        let query = query.normalized();
        let mut url = self.migration(&[])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(status) = &query.status {
                pairs.append_pair("status", status);
            }
            pairs
                .append_pair("page", &query.page.to_string())
                .append_pair("limit", &query.limit.to_string());
        }
        self.send_json(Method::GET, url).await
    }

    async fn create(&self, options: &MigrationOptions) -> Result<MigrationDto, ApiError> {
        let url = self.migration(&[])?;
        let (_, body) = self
            .send(Method::POST, url, Some(json!({ "options": options })))
            .await?;
        decode(&body)
    }

    async fn get(&self, migration_id: MigrationId) -> Result<MigrationDto, ApiError> {
        let url = self.migration(&[&migration_id.to_string()])?;
        self.send_json(Method::GET, url).await
    }

    async fn progress(&self, migration_id: MigrationId) -> Result<ProgressDto, ApiError> {
        let url = self.migration(&[&migration_id.to_string(), "progress"])?;
        self.send_json(Method::GET, url).await
    }

    async fn command(
        &self,
        migration_id: MigrationId,
        command: RemoteCommand,
    ) -> Result<CommandAck, ApiError> {
        let id = migration_id.to_string();
        let (method, url) = match command {
            RemoteCommand::Start => (Method::POST, self.migration(&[&id, "start"])?),
            RemoteCommand::Pause => (Method::POST, self.migration(&[&id, "pause"])?),
            RemoteCommand::Resume => (Method::POST, self.migration(&[&id, "resume"])?),
            RemoteCommand::Delete => (Method::DELETE, self.migration(&[&id])?),
        };

        let (status, body) = self.send(method, url, None).await?;
        if status == StatusCode::NO_CONTENT || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(CommandAck::accepted());
        }
        let ack: CommandAck = decode(&body)?;
        if !ack.success {
            let detail = ack
                .message
                .clone()
                .unwrap_or_else(|| format!("{command} was not applied"));
            tracker_warn!("{} on migration {} refused: {}", command, migration_id, detail);
            return Err(ApiError::new(FailureKind::Rejected { detail: detail.clone() }, detail));
        }
        Ok(ack)
    }

    async fn credentials(&self) -> Result<Vec<CredentialDto>, ApiError> {
        let url = self.endpoint(CREDENTIALS, &[])?;
        let list: CredentialList = self.send_json(Method::GET, url).await?;
        Ok(list.credentials)
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

// Error bodies carry `{detail}` (string or validation list) or `{message}`.
fn error_from_response(status: StatusCode, body: &[u8]) -> ApiError {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .or_else(|| value.get("message"))
                .map(|detail| match detail {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
        });

    match detail {
        Some(detail) if status.is_client_error() => {
            ApiError::new(FailureKind::Rejected { detail: detail.clone() }, detail)
        }
        Some(detail) => ApiError::new(FailureKind::HttpStatus(status.as_u16()), detail),
        None => ApiError::new(FailureKind::HttpStatus(status.as_u16()), status.to_string()),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
