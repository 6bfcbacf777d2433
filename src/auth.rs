//! OAuth client credentials, the cached token file, and the logic deciding
//! between reusing, refreshing, or re-consenting.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use oauth2::{
    basic::{BasicClient, BasicTokenType},
    reqwest::async_http_client,
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::loopback::{self, RedirectReceiver};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";

/// Tokens expiring within this window are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// The `installed` (or `web`) block of a client secret downloaded from
/// Google Cloud Console.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientCredentials>,
    web: Option<ClientCredentials>,
}

impl ClientCredentials {
    /// Reads `credentials.json`. Never touches the network.
    pub fn load(path: &Path) -> AuthResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AuthError::MissingClientSecret(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content).map_err(|reason| AuthError::InvalidClientSecret {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        let file: ClientSecretFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let creds = file
            .installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" client block".to_string())?;

        if creds.client_id.trim().is_empty() {
            return Err("client_id is empty".to_string());
        }
        Ok(creds)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    /// A token with no known expiry.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scopes: Vec::new(),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - TimeDelta::seconds(EXPIRY_SKEW_SECS) > now,
            None => true,
        }
    }

    /// Google omits the refresh token on refresh responses, so the previous one
    /// is carried over.
    fn from_response<R>(response: &R, previous_refresh: Option<String>) -> Self
    where
        R: TokenResponse<BasicTokenType>,
    {
        let now = Utc::now();
        Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().clone())
                .or(previous_refresh),
            expires_at: response
                .expires_in()
                .and_then(|d| TimeDelta::from_std(d).ok())
                .map(|d| now + d),
            scopes: response
                .scopes()
                .map(|s| s.iter().map(|scope| scope.to_string()).collect())
                .unwrap_or_else(|| vec![TASKS_SCOPE.to_string()]),
        }
    }
}

/// Obtains tokens from the authorization server.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Runs the interactive browser consent flow.
    async fn consent(&self) -> AuthResult<StoredToken>;
    /// Exchanges a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<StoredToken>;
}

pub struct GoogleAuthorizer {
    credentials: ClientCredentials,
    consent_timeout: Duration,
}

impl GoogleAuthorizer {
    pub fn new(credentials: ClientCredentials, consent_timeout: Duration) -> Self {
        Self {
            credentials,
            consent_timeout,
        }
    }

    fn oauth_client(&self) -> AuthResult<BasicClient> {
        Ok(BasicClient::new(
            ClientId::new(self.credentials.client_id.clone()),
            Some(ClientSecret::new(self.credentials.client_secret.clone())),
            AuthUrl::new(self.credentials.auth_uri.clone())?,
            Some(TokenUrl::new(self.credentials.token_uri.clone())?),
        ))
    }
}

#[async_trait]
impl Authorizer for GoogleAuthorizer {
    async fn consent(&self) -> AuthResult<StoredToken> {
        let receiver = RedirectReceiver::bind().await?;
        let client = self
            .oauth_client()?
            .set_redirect_uri(RedirectUrl::new(receiver.redirect_uri())?);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(TASKS_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        loopback::open_in_browser(auth_url.as_str());
        let code = receiver
            .wait_for_code(csrf_token.secret(), self.consent_timeout)
            .await?;

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        info!("authorization code exchanged for tokens");
        Ok(StoredToken::from_response(&response, None))
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<StoredToken> {
        let response = self
            .oauth_client()?
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        Ok(StoredToken::from_response(
            &response,
            Some(refresh_token.to_string()),
        ))
    }
}

/// Hands out access tokens, persisting whatever it obtains to `token_path`.
pub struct CredentialStore {
    token_path: PathBuf,
    authorizer: Box<dyn Authorizer>,
    cached: Option<StoredToken>,
}

impl CredentialStore {
    pub fn new(token_path: PathBuf, authorizer: Box<dyn Authorizer>) -> Self {
        Self {
            token_path,
            authorizer,
            cached: None,
        }
    }

    pub async fn access_token(&mut self) -> AuthResult<String> {
        let now = Utc::now();
        if let Some(token) = self.cached.as_ref().filter(|t| t.is_valid_at(now)) {
            return Ok(token.access_token.clone());
        }

        let stored = match self.cached.take() {
            Some(token) => Some(token),
            None => self.load().await?,
        };

        let token = match stored {
            Some(token) if token.is_valid_at(now) => {
                debug!("using stored access token");
                token
            }
            Some(token) => {
                info!("stored access token expired");
                self.renew(token).await?
            }
            None => self.consent().await?,
        };

        Ok(self.remember(token))
    }

    /// Called after the API rejected the current access token.
    pub async fn reauthorize(&mut self) -> AuthResult<String> {
        let stored = match self.cached.take() {
            Some(token) => Some(token),
            None => self.load().await?,
        };

        let token = match stored {
            Some(token) => self.renew(token).await?,
            None => self.consent().await?,
        };

        Ok(self.remember(token))
    }

    pub async fn logout(&mut self) -> AuthResult<bool> {
        self.cached = None;
        forget_token(&self.token_path).await
    }

    fn remember(&mut self, token: StoredToken) -> String {
        let access = token.access_token.clone();
        self.cached = Some(token);
        access
    }

    async fn renew(&mut self, token: StoredToken) -> AuthResult<StoredToken> {
        let Some(refresh_token) = token.refresh_token else {
            info!("no refresh token stored");
            return self.consent().await;
        };

        match self.authorizer.refresh(&refresh_token).await {
            Ok(fresh) => {
                info!("access token refreshed");
                self.save(&fresh).await?;
                Ok(fresh)
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, falling back to consent");
                forget_token(&self.token_path).await?;
                self.consent().await
            }
        }
    }

    async fn consent(&mut self) -> AuthResult<StoredToken> {
        info!("starting browser consent flow");
        let token = self.authorizer.consent().await?;
        self.save(&token).await?;
        Ok(token)
    }

    async fn load(&self) -> AuthResult<Option<StoredToken>> {
        let content = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<StoredToken>(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = %self.token_path.display(), error = %e, "discarding corrupt token file");
                forget_token(&self.token_path).await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &StoredToken) -> AuthResult<()> {
        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.token_path, content).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.token_path, perms).await?;
        }

        debug!(path = %self.token_path.display(), "token saved");
        Ok(())
    }
}

/// Deletes the token file. Returns whether one existed.
pub async fn forget_token(path: &Path) -> AuthResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
