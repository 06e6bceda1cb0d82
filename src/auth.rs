use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_LENGTH;
use serde::Deserialize;
use tracing::debug;

use crate::config::Credentials;
use crate::error::{Result, http_error};
use crate::util::urljoin;

/// Source of bearer tokens.
///
/// Tokens expire (48 hours for logins), so callers ask for a fresh one at
/// the start of every top-level operation and drop it afterwards.
#[derive(Debug, Clone)]
pub enum TokenProvider {
    /// `POST /login` with HTTP basic auth.
    Login(Credentials),
    /// A token obtained elsewhere, used as-is.
    Static(String),
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

impl TokenProvider {
    pub fn token(&self, http: &HttpClient, base_url: &str) -> Result<String> {
        let creds = match self {
            TokenProvider::Static(token) => return Ok(token.trim().to_string()),
            TokenProvider::Login(creds) => creds,
        };

        let url = urljoin(base_url, "login");
        debug!(%url, user = %creds.username, "requesting bearer token");
        let resp = http
            .post(&url)
            .basic_auth(&creds.username, Some(&creds.password))
            .header(CONTENT_LENGTH, "0")
            .send()?;

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            return Err(http_error(status, &url, &text));
        }
        let login: LoginResponse = serde_json::from_str(&text)?;
        Ok(login.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn login(user: &str, pass: &str) -> TokenProvider {
        TokenProvider::Login(Credentials {
            username: user.into(),
            password: pass.into(),
        })
    }

    #[test]
    fn login_uses_basic_auth() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/login")
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token_type": "Bearer", "token": "abc123", "expiration": "2026-10-21T00:00:00Z"}"#)
            .create();

        let token = login("user", "pass")
            .token(&HttpClient::new(), &server.url())
            .unwrap();
        assert_eq!(token, "abc123");
        mock.assert();
    }

    #[test]
    fn every_call_logs_in_again() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"token": "t"}"#)
            .expect(2)
            .create();

        let provider = login("u", "p");
        let http = HttpClient::new();
        provider.token(&http, &server.url()).unwrap();
        provider.token(&http, &server.url()).unwrap();
        mock.assert();
    }

    #[test]
    fn bad_password_maps_to_401_sentence() {
        let mut server = mockito::Server::new();
        let _login = server
            .mock("POST", "/login")
            .with_status(401)
            .with_body(r#"{"message": "The credentials are not valid."}"#)
            .create();

        let err = login("u", "wrong")
            .token(&HttpClient::new(), &server.url())
            .unwrap_err();
        match err {
            Error::Http {
                code,
                description,
                message,
            } => {
                assert_eq!(code, 401);
                assert_eq!(description, "Unauthorized - Your API key is wrong.");
                assert_eq!(message, "The credentials are not valid.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn static_token_skips_the_network() {
        let token = TokenProvider::Static(" fixed \n".into())
            .token(&HttpClient::new(), "http://127.0.0.1:9")
            .unwrap();
        assert_eq!(token, "fixed");
    }
}
