//! Installed-app OAuth for Gmail: a local token file that is reused,
//! refreshed, or replaced by an interactive consent flow.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use axum::{Router, extract::Query, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const CANONICAL_CREDENTIALS_FILE: &str = "credentials.json";
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

// Refresh a bit early so the token doesn't expire mid-run
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// The `installed` (or `web`) section of a client secrets file
/// downloaded from the Google Cloud Console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        let file: ClientSecretsFile = serde_json::from_str(&content)
            .with_context(|| format!("Invalid credentials file {}", path.display()))?;
        file.installed.or(file.web).ok_or(anyhow!(
            "Credentials file {} has no 'installed' or 'web' client",
            path.display()
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

/// What gets persisted to the token file between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
}

impl StoredToken {
    fn from_response(
        response: OAuthTokenResponse,
        previous_refresh_token: Option<String>,
        secrets: &ClientSecrets,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: response.access_token,
            // Google omits the refresh token on refresh responses
            refresh_token: response.refresh_token.or(previous_refresh_token),
            expiry: now + Duration::seconds(response.expires_in),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            token_uri: secrets.token_uri.clone(),
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expiry - Duration::seconds(EXPIRY_LEEWAY_SECS) > now
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file {}", path.display()))?;
        match serde_json::from_str(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write token file {}", path.display()))?;
        Ok(())
    }

    fn secrets(&self) -> ClientSecrets {
        ClientSecrets {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_uri: default_auth_uri(),
            token_uri: self.token_uri.clone(),
        }
    }
}

/// Finds the client secrets file in `dir`: `credentials.json`, or else
/// the first `client_secret_*.json` Google names its downloads with.
pub fn find_credentials_file(dir: &Path) -> Result<PathBuf> {
    let canonical = dir.join(CANONICAL_CREDENTIALS_FILE);
    if canonical.exists() {
        return Ok(canonical);
    }

    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| {
                            name.starts_with("client_secret_") && name.ends_with(".json")
                        })
                })
                .collect()
        })
        .unwrap_or_default();
    matches.sort();

    matches.into_iter().next().ok_or(anyhow!(
        "No Google OAuth credentials file found in {}.\n\
         Download it from the Google Cloud Console \
         (APIs & Services > Credentials > OAuth 2.0 Client IDs > Download JSON) \
         and save it as {} or keep its client_secret_*.json name.",
        dir.display(),
        CANONICAL_CREDENTIALS_FILE
    ))
}

pub async fn refresh_access_token(
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<OAuthTokenResponse> {
    let params = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    let res = reqwest::Client::new()
        .post(token_uri)
        .form(&params)
        .send()
        .await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Token refresh failed: {} ({})", status, text);
    }
    Ok(serde_json::from_str(&text)?)
}

pub async fn exchange_code_for_token(
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<OAuthTokenResponse> {
    let params = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];
    let res = reqwest::Client::new()
        .post(token_uri)
        .form(&params)
        .send()
        .await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Authorization code exchange failed: {} ({})", status, text);
    }
    Ok(serde_json::from_str(&text)?)
}

pub fn consent_url(secrets: &ClientSecrets, redirect_uri: &str, scope: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}\
         &access_type=offline&prompt=consent",
        secrets.auth_uri,
        urlencoding::encode(&secrets.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(scope)
    )
}

/// Either the authorization code or the error Google redirected with.
type RedirectOutcome = Result<String, String>;

type RedirectSender = Arc<Mutex<Option<oneshot::Sender<RedirectOutcome>>>>;

async fn handle_redirect(
    State(sender): State<RedirectSender>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    let outcome = match (params.get("code"), params.get("error")) {
        (_, Some(error)) => Err(error.clone()),
        (Some(code), None) => Ok(code.clone()),
        // Not the redirect, keep waiting
        (None, None) => return (StatusCode::BAD_REQUEST, "Missing authorization code."),
    };
    let body = match &outcome {
        Ok(_) => "Authorization complete. You can close this window.",
        Err(_) => "Authorization failed. Check the terminal for details.",
    };

    // Only the first redirect counts
    if let Some(tx) = sender.lock().ok().and_then(|mut slot| slot.take()) {
        let _ = tx.send(outcome);
    }
    (StatusCode::OK, body)
}

/// Router for the loopback redirect. Sends the first `code` or `error`
/// it sees to `sender`; anything else gets a 4xx and is ignored.
fn redirect_router(sender: oneshot::Sender<RedirectOutcome>) -> Router {
    Router::new()
        .route("/", get(handle_redirect))
        .with_state(Arc::new(Mutex::new(Some(sender))))
}

/// Runs the installed-app consent flow: serves a loopback port until
/// Google redirects back and exchanges the code it carries.
async fn authorize_interactively(secrets: &ClientSecrets) -> Result<OAuthTokenResponse> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());

    println!(
        "\nPlease open the following URL in your browser and authorize access:\n\n{}\n",
        consent_url(secrets, &redirect_uri, GMAIL_READONLY_SCOPE)
    );

    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, redirect_router(outcome_tx))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = outcome_rx
        .await
        .context("Redirect listener stopped before authorization completed")?;
    let _ = shutdown_tx.send(());
    server.await??;

    let code = outcome.map_err(|error| anyhow!("Authorization was denied: {}", error))?;
    exchange_code_for_token(
        &secrets.token_uri,
        &secrets.client_id,
        &secrets.client_secret,
        &code,
        &redirect_uri,
    )
    .await
}

/// Returns a usable Gmail access token, reusing, refreshing, or
/// creating the token stored at `token_path`.
pub async fn access_token(token_path: &Path, credentials_dir: &Path) -> Result<String> {
    let now = Utc::now();
    let stored = StoredToken::load(token_path)?;

    if let Some(token) = &stored
        && token.is_valid(now)
    {
        tracing::debug!("Using stored access token");
        return Ok(token.access_token.clone());
    }

    let refreshable = stored.and_then(|token| match &token.refresh_token {
        Some(refresh_token) if !refresh_token.is_empty() => {
            Some((token.secrets(), refresh_token.clone()))
        }
        _ => None,
    });

    let token = match refreshable {
        Some((secrets, refresh_token)) => {
            tracing::info!("Refreshing expired access token");
            let response = refresh_access_token(
                &secrets.token_uri,
                &secrets.client_id,
                &secrets.client_secret,
                &refresh_token,
            )
            .await?;
            StoredToken::from_response(response, Some(refresh_token), &secrets, Utc::now())
        }
        None => {
            let credentials_path = find_credentials_file(credentials_dir)?;
            let secrets = ClientSecrets::from_file(&credentials_path)?;
            let response = authorize_interactively(&secrets).await?;
            StoredToken::from_response(response, None, &secrets, Utc::now())
        }
    };

    token.save(token_path)?;
    Ok(token.access_token)
}
