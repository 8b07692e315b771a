//! Gmail OAuth2 authentication
//!
//! Implements the OAuth2 authorization code flow with a local HTTP server
//! receiving the callback. Each account keeps its own token file under
//! `~/.config/mailsplit/tokens/`, so the source and destination accounts can
//! be authorized side by side.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use crate::config::GmailCredentials;

/// Subdirectory of the config directory holding per-account tokens
const TOKENS_DIR: &str = "tokens";

/// Seconds before expiry at which a token is treated as expired
const EXPIRY_BUFFER_SECS: i64 = 300;

/// OAuth2 configuration and token management for one Gmail account
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    email: String,
    token_path: PathBuf,
}

/// Stored token data
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl StoredToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at > now + EXPIRY_BUFFER_SECS)
    }
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

impl GmailAuth {
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Read, insert, and trash messages; create labels
    const GMAIL_MODIFY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.modify";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Create an authenticator for `email`
    pub fn new(credentials: &GmailCredentials, email: &str) -> Result<Self> {
        let tokens_dir = tokens_dir()?;
        Ok(Self::with_token_dir(credentials, email, &tokens_dir))
    }

    /// Create an authenticator storing its token under `dir`
    pub fn with_token_dir(credentials: &GmailCredentials, email: &str, dir: &Path) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            email: email.to_string(),
            token_path: dir.join(token_file_name(email)),
        }
    }

    /// Account this authenticator is for
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Get a valid access token, refreshing or re-authenticating as needed
    pub fn get_access_token(&self) -> Result<String> {
        if let Ok(token) = self.load_token() {
            if token.is_fresh(chrono::Utc::now().timestamp()) {
                return Ok(token.access_token);
            }

            if let Some(refresh_token) = token.refresh_token {
                match self.refresh_access_token(&refresh_token) {
                    Ok(new_token) => {
                        debug!("Refreshed access token for {}", self.email);
                        self.save_token_response(&new_token)?;
                        return Ok(new_token.access_token);
                    }
                    Err(e) => warn!("Token refresh for {} failed: {:#}", self.email, e),
                }
            }
        }

        let token = self.authorization_code_auth()?;
        self.save_token_response(&token)?;
        Ok(token.access_token)
    }

    fn authorization_code_auth(&self) -> Result<TokenResponse> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);
        let auth_url = self.authorization_url(&redirect_uri);

        println!("\n=== Authorization required for {} ===", self.email);
        println!("Opening browser for authentication...");
        println!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        info!("Waiting for authorization of {}...", self.email);
        let code = self.wait_for_callback(listener)?;

        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        info!("Authentication of {} successful", self.email);
        Ok(token)
    }

    /// Consent URL, pre-selecting this account via `login_hint`
    fn authorization_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&login_hint={}",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(Self::GMAIL_MODIFY_SCOPE),
            urlencoding::encode(&self.email),
        )
    }

    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for OAuth callback and extract authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        let result = parse_callback(&request_line);

        let (status, body) = if result.is_ok() {
            ("200 OK", "Authentication successful! You can close this window.")
        } else {
            ("400 Bad Request", "Authentication failed. Please try again.")
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        result
    }

    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Google omits the refresh token on refresh
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    fn load_token(&self) -> Result<StoredToken> {
        config::load_json_file(&self.token_path)
    }

    fn save_token_response(&self, token: &TokenResponse) -> Result<()> {
        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };
        config::save_json_file(&self.token_path, &stored)
    }

    /// Forget this account's stored token
    pub fn logout(&self) -> Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path).with_context(|| {
                format!("Failed to remove token file: {}", self.token_path.display())
            })?;
            info!("Cleared stored credentials for {}", self.email);
        }
        Ok(())
    }
}

/// Directory holding the per-account token files
pub fn tokens_dir() -> Result<PathBuf> {
    config::config_path(TOKENS_DIR).context("Could not determine config directory")
}

/// Delete every stored account token
///
/// Returns `false` if there were none.
pub fn clear_all_credentials() -> Result<bool> {
    config::remove_dir(&tokens_dir()?)
}

/// Token file name for an account
fn token_file_name(email: &str) -> String {
    let safe: String = email
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.json", safe)
}

/// Extract the authorization code from the callback request line
///
/// Format: `GET /?code=AUTH_CODE&scope=... HTTP/1.1`
fn parse_callback(request_line: &str) -> Result<String> {
    let query = request_line
        .split_whitespace()
        .nth(1)
        .and_then(|path| path.split_once('?'))
        .map(|(_, query)| query)
        .unwrap_or_default();

    let param = |name: &str| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| {
                urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string())
            })
        })
    };

    if let Some(err) = param("error") {
        anyhow::bail!("OAuth error: {}", err);
    }
    param("code").context("No authorization code received")
}
