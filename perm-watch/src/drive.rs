use crate::auth::Session;
use crate::error::{PermWatchError, PermWatchResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const PERMISSION_FIELDS: &str = "nextPageToken,permissions(id,emailAddress,role,type)";
const FILE_FIELDS: &str = "nextPageToken,files(id,name)";

#[async_trait]
pub trait DriveClient: Send + Sync {
    async fn list_files(&self, session: &Session, count: u32) -> PermWatchResult<Vec<DriveFile>>;
    async fn download_file(
        &self,
        session: &Session,
        file_id: &str,
        dest: &Path
    ) -> PermWatchResult<u64>;
    async fn list_permissions(
        &self,
        session: &Session,
        file_id: &str,
        page_token: Option<&str>
    ) -> PermWatchResult<PermissionPage>;
    async fn watch_file(
        &self,
        session: &Session,
        file_id: &str,
        channel: &WatchChannel
    ) -> PermWatchResult<ChannelRegistration>;
    async fn stop_channel(
        &self,
        session: &Session,
        channel_id: &str,
        resource_id: &str
    ) -> PermWatchResult<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
    pub email_address: Option<String>,
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub permission_type: Option<String>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionPage {
    #[serde(default)]
    pub permissions: Vec<Permission>,
    pub next_page_token: Option<String>
}

/// Parameters of a `web_hook` notification channel.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchChannel {
    pub id: String,
    pub address: String,
    pub expiration: Option<DateTime<Utc>>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRegistration {
    pub channel_id: String,
    pub resource_id: String,
    pub resource_uri: Option<String>,
    pub expiration: Option<DateTime<Utc>>
}

pub struct GoogleDriveClient {
    client: Client,
    base_url: String
}

impl GoogleDriveClient {
    pub fn new(base_url: impl Into<String>) -> PermWatchResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(PermWatchError::HttpError)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string()
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/drive/v3{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, session: &Session) -> PermWatchResult<Response> {
        let response = request
            .header("Authorization", session.bearer())
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(PermWatchError::AuthFailure(
                "Drive rejected the access token".to_string()
            )),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(PermWatchError::ApiError {
                    status: status.as_u16(),
                    message: error_message(&body)
                })
            }
        }
    }
}

#[async_trait]
impl DriveClient for GoogleDriveClient {
    async fn list_files(&self, session: &Session, count: u32) -> PermWatchResult<Vec<DriveFile>> {
        if count < 1 {
            return Err(PermWatchError::InvalidArgument(
                "file count must be at least 1".to_string()
            ));
        }

        let url = self.url(&format!(
            "/files?pageSize={}&fields={}",
            count,
            urlencoding::encode(FILE_FIELDS)
        ));
        debug!(url = %url, "Listing Drive files");

        let listing: FileList = self.send(self.client.get(&url), session).await?.json().await?;
        Ok(listing.files)
    }

    async fn download_file(
        &self,
        session: &Session,
        file_id: &str,
        dest: &Path
    ) -> PermWatchResult<u64> {
        let url = self.url(&format!("/files/{}?alt=media", urlencoding::encode(file_id)));
        let response = self.send(self.client.get(&url), session).await?;

        let written = stream_to_file(response.bytes_stream(), dest).await?;

        info!(file_id = %file_id, dest = %dest.display(), bytes = written, "File downloaded");
        Ok(written)
    }

    async fn list_permissions(
        &self,
        session: &Session,
        file_id: &str,
        page_token: Option<&str>
    ) -> PermWatchResult<PermissionPage> {
        let mut url = self.url(&format!(
            "/files/{}/permissions?fields={}",
            urlencoding::encode(file_id),
            urlencoding::encode(PERMISSION_FIELDS)
        ));
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }
        debug!(url = %url, "Listing Drive permissions");

        let response = self
            .send(self.client.get(&url), session)
            .await
            .map_err(into_query_failure)?;
        response
            .json()
            .await
            .map_err(|e| into_query_failure(e.into()))
    }

    async fn watch_file(
        &self,
        session: &Session,
        file_id: &str,
        channel: &WatchChannel
    ) -> PermWatchResult<ChannelRegistration> {
        let url = self.url(&format!("/files/{}/watch", urlencoding::encode(file_id)));
        let body = WatchRequest {
            id: &channel.id,
            kind_of: "web_hook",
            address: &channel.address,
            expiration: channel.expiration.map(|e| e.timestamp_millis().to_string())
        };

        let response = self
            .send(self.client.post(&url).json(&body), session)
            .await
            .map_err(into_registration_failure)?;
        let channel_response: ChannelResponse = response
            .json()
            .await
            .map_err(|e| into_registration_failure(e.into()))?;

        Ok(ChannelRegistration {
            channel_id: channel_response.id,
            resource_id: channel_response.resource_id,
            resource_uri: channel_response.resource_uri,
            expiration: channel_response
                .expiration
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(DateTime::from_timestamp_millis)
        })
    }

    async fn stop_channel(
        &self,
        session: &Session,
        channel_id: &str,
        resource_id: &str
    ) -> PermWatchResult<()> {
        let url = self.url("/channels/stop");
        let body = serde_json::json!({ "id": channel_id, "resourceId": resource_id });
        self.send(self.client.post(&url).json(&body), session).await?;
        Ok(())
    }
}

/// Writes `stream` to `<dest>.part` and renames it over `dest` once the body
/// is complete. On error the partial file is removed and `dest` is untouched.
async fn stream_to_file<S, B, E>(stream: S, dest: &Path) -> PermWatchResult<u64>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<PermWatchError>
{
    let partial = partial_path(dest);

    let copied = async {
        futures_util::pin_mut!(stream);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| -> PermWatchError { e.into() })?;
            file.write_all(chunk.as_ref()).await?;
            written += chunk.as_ref().len() as u64;
        }
        file.flush().await?;
        Ok::<u64, PermWatchError>(written)
    }
    .await;

    match copied {
        Ok(written) => {
            tokio::fs::rename(&partial, dest).await?;
            Ok(written)
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial download");
            }
            Err(e)
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Local path for a download: `<dir>/<name>.<extension>`.
pub fn download_target(dir: &Path, name: &str, extension: &str) -> PathBuf {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        dir.join(name)
    } else {
        dir.join(format!("{}.{}", name, extension))
    }
}

fn into_query_failure(err: PermWatchError) -> PermWatchError {
    match err {
        PermWatchError::AuthFailure(_) => err,
        other => PermWatchError::RemoteQueryFailure {
            status: other.status(),
            message: failure_message(other)
        }
    }
}

fn into_registration_failure(err: PermWatchError) -> PermWatchError {
    match err {
        PermWatchError::AuthFailure(_) => err,
        other => PermWatchError::RegistrationFailure {
            status: other.status(),
            message: failure_message(other)
        }
    }
}

fn failure_message(err: PermWatchError) -> String {
    match err {
        PermWatchError::ApiError { message, .. } => message,
        other => other.to_string()
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>
}

#[derive(Debug, Serialize)]
struct WatchRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind_of: &'static str,
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<String>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResponse {
    id: String,
    resource_id: String,
    resource_uri: Option<String>,
    expiration: Option<String>
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String
}
