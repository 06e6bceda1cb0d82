use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::TokenProvider;
use crate::client::ClientConfig;
use crate::error::{Error, Result};

pub const DEFAULT_URL: &str = "https://appeears.earthdatacloud.nasa.gov/api";

/// Earthdata login, stored as plaintext JSON in `~/appeears.json`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// `APPEEARS_CREDENTIALS`, else `~/appeears.json`.
pub fn credentials_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("APPEEARS_CREDENTIALS") {
        return Ok(PathBuf::from(p));
    }
    dirs::home_dir()
        .map(|home| home.join("appeears.json"))
        .ok_or_else(|| Error::Credentials("cannot locate home directory".into()))
}

pub fn read_credentials(path: &Path) -> Result<Credentials> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        Error::Credentials(format!("malformed credential file {}: {}", path.display(), e))
    })
}

pub fn save_credentials(path: &Path, creds: &Credentials) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string(creds)?)?;
    Ok(())
}

pub(crate) fn load_config(
    url: Option<String>,
    token: Option<TokenProvider>,
) -> Result<ClientConfig> {
    resolve(url, token, |name| std::env::var(name).ok(), credentials_path().ok())
}

// Precedence: explicit arguments, environment, then the credential file.
// A missing login is not an error here; product listings need no token.
fn resolve<E>(
    url: Option<String>,
    token: Option<TokenProvider>,
    env: E,
    creds_file: Option<PathBuf>,
) -> Result<ClientConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let url = url
        .or_else(|| env("APPEEARS_URL"))
        .unwrap_or_else(|| DEFAULT_URL.to_string());

    let token = match token.or_else(|| from_env(&env)) {
        Some(t) => Some(t),
        None => from_file(creds_file.as_deref())?,
    };

    Ok(ClientConfig { url, token })
}

fn from_env<E>(env: &E) -> Option<TokenProvider>
where
    E: Fn(&str) -> Option<String>,
{
    if let Some(token) = env("APPEEARS_TOKEN").filter(|t| !t.trim().is_empty()) {
        return Some(TokenProvider::Static(token));
    }
    match (env("APPEEARS_USERNAME"), env("APPEEARS_PASSWORD")) {
        (Some(username), Some(password)) => {
            Some(TokenProvider::Login(Credentials { username, password }))
        }
        _ => None,
    }
}

fn from_file(path: Option<&Path>) -> Result<Option<TokenProvider>> {
    match path {
        Some(p) if p.exists() => Ok(Some(TokenProvider::Login(read_credentials(p)?))),
        _ => Ok(None),
    }
}
