//! OAuth sessions for the Drive API.
//!
//! The first authorization goes through [`InstalledAppFlow`], which persists an
//! `authorized_user` token file. Every later start reads that file and
//! [`OAuthSessionProvider`] trades the refresh token for short-lived access
//! tokens, caching them until shortly before expiry.

use crate::config::PermWatchConfig;
use crate::error::{PermWatchError, PermWatchResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A bearer credential valid for at least the next few minutes.
#[derive(Clone)]
pub struct Session {
    access_token: String
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into()
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session(&self) -> PermWatchResult<Session>;

    /// Drops any cached credential so the next call re-authenticates.
    async fn invalidate(&self) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>
}

impl ClientSecrets {
    pub async fn load(path: &Path) -> PermWatchResult<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            PermWatchError::AuthFailure(format!(
                "Failed to read client secrets {}: {}",
                path.display(),
                e
            ))
        })?;
        let file: ClientSecretsFile = serde_json::from_str(&contents)?;
        file.installed.or(file.web).ok_or_else(|| {
            PermWatchError::AuthFailure(
                "Client secrets file has neither an `installed` nor a `web` section".to_string()
            )
        })
    }
}

/// Persisted refresh credential, compatible with the `authorized_user` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String
}

impl AuthorizedUser {
    pub fn new(secrets: &ClientSecrets, refresh_token: String) -> Self {
        Self {
            kind: "authorized_user".to_string(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            refresh_token
        }
    }

    pub async fn load(path: &Path) -> PermWatchResult<Option<Self>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into())
        }
    }

    pub async fn save(&self, path: &Path) -> PermWatchResult<()> {
        let payload = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, payload).await?;
        info!(path = %path.display(), "Saved authorization");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64,
    refresh_token: Option<String>
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>
}

fn build_http_client() -> PermWatchResult<Client> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(PermWatchError::HttpError)
}

async fn request_token(
    http_client: &Client,
    token_url: &str,
    form: &[(&str, &str)]
) -> PermWatchResult<OAuthTokenResponse> {
    let response = http_client
        .post(token_url)
        .form(form)
        .send()
        .await
        .map_err(|e| PermWatchError::AuthFailure(format!("Token request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let error_body = response.text().await.unwrap_or_default();
        return Err(PermWatchError::AuthFailure(format!(
            "Token request failed: {} - {}",
            status, error_body
        )));
    }

    response.json().await.map_err(|e| {
        PermWatchError::AuthFailure(format!("Failed to parse token response: {}", e))
    })
}

pub struct OAuthSessionProvider {
    http_client: Client,
    token_url: String,
    token_path: PathBuf,
    access_token: Arc<RwLock<Option<CachedToken>>>
}

impl OAuthSessionProvider {
    pub fn new(token_url: impl Into<String>, token_path: impl Into<PathBuf>) -> PermWatchResult<Self> {
        Ok(Self {
            http_client: build_http_client()?,
            token_url: token_url.into(),
            token_path: token_path.into(),
            access_token: Arc::new(RwLock::new(None))
        })
    }

    pub fn from_config(config: &PermWatchConfig) -> PermWatchResult<Self> {
        Self::new(config.oauth_token_url.clone(), config.token_path.clone())
    }

    async fn refresh(&self) -> PermWatchResult<CachedToken> {
        let user = AuthorizedUser::load(&self.token_path)
            .await
            .map_err(|e| PermWatchError::AuthFailure(e.to_string()))?
            .ok_or_else(|| {
                PermWatchError::AuthFailure(format!(
                    "No saved authorization at {}; run `permwatch auth` first",
                    self.token_path.display()
                ))
            })?;

        debug!("Refreshing Drive access token");
        let response = request_token(
            &self.http_client,
            &self.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &user.client_id),
                ("client_secret", &user.client_secret),
                ("refresh_token", &user.refresh_token)
            ]
        )
        .await?;

        Ok(CachedToken {
            token: response.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(response.expires_in as i64)
        })
    }
}

#[async_trait]
impl SessionProvider for OAuthSessionProvider {
    async fn session(&self) -> PermWatchResult<Session> {
        {
            let cached = self.access_token.read().await;
            if let Some(ref token) = *cached {
                if token.expires_at > Utc::now() + chrono::Duration::minutes(5) {
                    return Ok(Session::new(token.token.clone()));
                }
            }
        }

        let fresh = self.refresh().await?;
        let session = Session::new(fresh.token.clone());

        {
            let mut cached = self.access_token.write().await;
            *cached = Some(fresh);
        }

        Ok(session)
    }

    async fn invalidate(&self) {
        let mut cached = self.access_token.write().await;
        *cached = None;
    }
}

/// First-time consent for an installed application.
pub struct InstalledAppFlow {
    http_client: Client,
    secrets: ClientSecrets,
    auth_url: String,
    token_url: String,
    redirect_uri: String,
    scopes: Vec<String>
}

impl InstalledAppFlow {
    pub fn new(secrets: ClientSecrets, config: &PermWatchConfig) -> PermWatchResult<Self> {
        Ok(Self {
            http_client: build_http_client()?,
            auth_url: secrets
                .auth_uri
                .clone()
                .unwrap_or_else(|| config.oauth_auth_url.clone()),
            token_url: secrets
                .token_uri
                .clone()
                .unwrap_or_else(|| config.oauth_token_url.clone()),
            secrets,
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone()
        })
    }

    pub async fn from_config(config: &PermWatchConfig) -> PermWatchResult<Self> {
        let secrets = ClientSecrets::load(&config.credentials_path).await?;
        Self::new(secrets, config)
    }

    pub fn authorization_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.auth_url,
            urlencoding::encode(&self.secrets.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes.join(" "))
        )
    }

    /// Exchanges the code (or the full redirect URL containing it) for a
    /// refresh credential.
    pub async fn exchange_code(&self, input: &str) -> PermWatchResult<AuthorizedUser> {
        let code = extract_code(input).ok_or_else(|| {
            PermWatchError::AuthFailure("No authorization code provided".to_string())
        })?;

        let response = request_token(
            &self.http_client,
            &self.token_url,
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("client_id", &self.secrets.client_id),
                ("client_secret", &self.secrets.client_secret),
                ("redirect_uri", &self.redirect_uri)
            ]
        )
        .await?;

        let refresh_token = response.refresh_token.ok_or_else(|| {
            PermWatchError::AuthFailure(
                "Token response did not include a refresh token".to_string()
            )
        })?;

        Ok(AuthorizedUser::new(&self.secrets, refresh_token))
    }
}

fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    match reqwest::Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned()),
        Err(_) => Some(input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn secrets() -> ClientSecrets {
        ClientSecrets {
            client_id: "client-1.apps.example.com".to_string(),
            client_secret: "s3cret".to_string(),
            auth_uri: None,
            token_uri: None
        }
    }

    async fn write_token_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("token.json");
        AuthorizedUser::new(&secrets(), "refresh-1".to_string())
            .save(&path)
            .await
            .unwrap();
        path
    }

    #[test]
    fn test_extract_code_variants() {
        assert_eq!(extract_code("  4/abc  "), Some("4/abc".to_string()));
        assert_eq!(
            extract_code("http://localhost/?code=4%2Fxyz&scope=drive"),
            Some("4/xyz".to_string())
        );
        assert_eq!(extract_code("http://localhost/?error=access_denied"), None);
        assert_eq!(extract_code("   "), None);
    }

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session::new("ya29.secret");
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("ya29.secret"));
        assert_eq!(session.bearer(), "Bearer ya29.secret");
    }

    #[test]
    fn test_authorization_url_parameters() {
        let flow = InstalledAppFlow::new(secrets(), &PermWatchConfig::default()).unwrap();
        let url = flow.authorization_url();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-1.apps.example.com"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost"));
    }

    #[tokio::test]
    async fn test_client_secrets_accepts_installed_and_web() {
        let dir = tempfile::tempdir().unwrap();
        let installed = dir.path().join("installed.json");
        tokio::fs::write(
            &installed,
            json!({"installed": {"client_id": "a", "client_secret": "b"}}).to_string()
        )
        .await
        .unwrap();
        let web = dir.path().join("web.json");
        tokio::fs::write(
            &web,
            json!({"web": {"client_id": "c", "client_secret": "d", "token_uri": "https://t"}})
                .to_string()
        )
        .await
        .unwrap();

        assert_eq!(ClientSecrets::load(&installed).await.unwrap().client_id, "a");
        let web_secrets = ClientSecrets::load(&web).await.unwrap();
        assert_eq!(web_secrets.token_uri.as_deref(), Some("https://t"));
    }

    #[tokio::test]
    async fn test_session_is_cached_until_expiry() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let token_path = write_token_file(&dir).await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider =
            OAuthSessionProvider::new(format!("{}/token", mock_server.uri()), token_path).unwrap();

        let first = provider.session().await.unwrap();
        let second = provider.session().await.unwrap();
        assert_eq!(first.bearer(), "Bearer ya29.fresh");
        assert_eq!(second.bearer(), first.bearer());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let token_path = write_token_file(&dir).await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let provider =
            OAuthSessionProvider::new(format!("{}/token", mock_server.uri()), token_path).unwrap();
        provider.session().await.unwrap();
        provider.invalidate().await;
        provider.session().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_token_file_is_auth_failure() {
        let dir = tempfile::tempdir().unwrap();
        let provider = OAuthSessionProvider::new(
            "http://127.0.0.1:9/token",
            dir.path().join("missing.json")
        )
        .unwrap();

        let err = provider.session().await.unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_auth_failure() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let token_path = write_token_file(&dir).await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"}))
            )
            .mount(&mock_server)
            .await;

        let provider =
            OAuthSessionProvider::new(format!("{}/token", mock_server.uri()), token_path).unwrap();
        let err = provider.session().await.unwrap_err();
        assert!(err.is_auth_failure());
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_exchange_code_builds_authorized_user() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=4%2Fabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.first",
                "expires_in": 3599,
                "refresh_token": "1//refresh"
            })))
            .mount(&mock_server)
            .await;

        let mut creds = secrets();
        creds.token_uri = Some(format!("{}/token", mock_server.uri()));
        let flow = InstalledAppFlow::new(creds, &PermWatchConfig::default()).unwrap();

        let user = flow
            .exchange_code("http://localhost/?code=4/abc&scope=drive")
            .await
            .unwrap();
        assert_eq!(user.kind, "authorized_user");
        assert_eq!(user.refresh_token, "1//refresh");

        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        user.save(&token_path).await.unwrap();
        let loaded = AuthorizedUser::load(&token_path).await.unwrap();
        assert_eq!(loaded, Some(user));
    }
}
