use crate::error::{QuotalineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Keychain service name Claude Code stores its OAuth blob under.
const KEYCHAIN_SERVICE: &str = "Claude Code-credentials";

#[derive(Debug, Default, Deserialize)]
pub struct ClaudeCodeCredentials {
    #[serde(rename = "claudeAiOauth", default)]
    pub claude_ai_oauth: Option<ClaudeAiOAuth>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaudeAiOAuth {
    #[serde(rename = "accessToken", default)]
    pub access_token: String,
}

/// Source of the bearer token for the usage API.
pub trait TokenSource {
    fn access_token(&self) -> Result<String>;
}

/// Extract a non-empty access token from a Claude Code credentials blob.
pub fn parse_credentials_json(json: &str) -> Result<String> {
    let credentials: ClaudeCodeCredentials = serde_json::from_str(json.trim())
        .map_err(|e| QuotalineError::Credentials(format!("Failed to parse credentials: {}", e)))?;

    let token = credentials
        .claude_ai_oauth
        .map(|oauth| oauth.access_token)
        .unwrap_or_default();

    if token.is_empty() {
        return Err(QuotalineError::Credentials(
            "access token is empty".to_string(),
        ));
    }
    Ok(token)
}

/// Reads the credentials blob from a secure store via an external command.
#[derive(Debug, Clone)]
pub struct KeychainTokenSource {
    program: String,
    args: Vec<String>,
}

impl KeychainTokenSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The macOS `security` lookup Claude Code's own credential entry needs.
    pub fn macos() -> Self {
        Self::new(
            "security",
            ["find-generic-password", "-s", KEYCHAIN_SERVICE, "-w"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl TokenSource for KeychainTokenSource {
    fn access_token(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| {
                QuotalineError::Credentials(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(QuotalineError::Credentials(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|e| {
            QuotalineError::Credentials(format!("Invalid UTF-8 in keychain data: {}", e))
        })?;
        parse_credentials_json(&stdout)
    }
}

/// Reads `~/.claude/.credentials.json` (or any file of the same shape).
#[derive(Debug, Clone)]
pub struct CredentialsFile {
    path: PathBuf,
}

impl CredentialsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenSource for CredentialsFile {
    fn access_token(&self) -> Result<String> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            QuotalineError::Credentials(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))
        })?;
        parse_credentials_json(&content)
    }
}

/// Tries the keychain first, then the credentials file. Keychain errors are
/// swallowed; only the file's error is reported.
#[derive(Debug, Clone)]
pub struct ChainedTokenSource {
    keychain: Option<KeychainTokenSource>,
    file: CredentialsFile,
}

impl ChainedTokenSource {
    pub fn new(keychain: Option<KeychainTokenSource>, file: CredentialsFile) -> Self {
        Self { keychain, file }
    }

    /// Keychain lookup on macOS, file only elsewhere.
    pub fn platform_default(credentials_path: PathBuf) -> Self {
        let keychain = cfg!(target_os = "macos").then(KeychainTokenSource::macos);
        Self::new(keychain, CredentialsFile::new(credentials_path))
    }
}

impl TokenSource for ChainedTokenSource {
    fn access_token(&self) -> Result<String> {
        if let Some(keychain) = &self.keychain {
            match keychain.access_token() {
                Ok(token) => return Ok(token),
                Err(e) => debug!("keychain lookup failed, trying credentials file: {}", e),
            }
        }
        self.file.access_token()
    }
}
