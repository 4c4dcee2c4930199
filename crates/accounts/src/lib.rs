#![deny(warnings)]

//! Login and registration against the account service.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the account flow.
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    /// Username and password are both required.
    #[error("username and password are required")]
    MissingCredentials,
    /// The service refused the request.
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The request never completed.
    #[error("http error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Http(e.to_string())
    }
}

/// Form fields sent to `/login` and `/register`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Check the fields locally before any request is made.
pub fn validate_credentials(c: &Credentials) -> Result<(), AuthError> {
    if c.username.trim().is_empty() || c.password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(())
}

/// Logged-in account.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AccountSession {
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Interpret a status and body from either endpoint.
pub fn parse_response(status: u16, body: &str) -> Result<AccountSession, AuthError> {
    if (200..300).contains(&status) {
        return serde_json::from_str(body).map_err(|e| AuthError::Malformed(e.to_string()));
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| format!("request failed with status {status}"));
    Err(AuthError::Rejected { status, message })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Login,
    Register,
}

impl Route {
    fn path(&self) -> &'static str {
        match self {
            Route::Login => "login",
            Route::Register => "register",
        }
    }
}

/// HTTP client for the account service.
#[derive(Clone, Debug)]
pub struct AccountsClient {
    http: reqwest::Client,
    base_url: String,
}

impl AccountsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn login(&self, creds: &Credentials) -> Result<AccountSession, AuthError> {
        self.submit(Route::Login, creds).await
    }

    pub async fn register(&self, creds: &Credentials) -> Result<AccountSession, AuthError> {
        self.submit(Route::Register, creds).await
    }

    fn url(&self, route: Route) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), route.path())
    }

    async fn submit(&self, route: Route, creds: &Credentials) -> Result<AccountSession, AuthError> {
        validate_credentials(creds)?;
        let response = self.http.post(self.url(route)).json(creds).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        let result = parse_response(status, &body);
        match &result {
            Ok(session) => info!(username = %session.username, route = route.path(), "account call succeeded"),
            Err(e) => warn!(route = route.path(), error = %e, "account call failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_fields_are_rejected_locally() {
        assert_eq!(
            validate_credentials(&Credentials::new("", "pw")),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            validate_credentials(&Credentials::new("ana", "")),
            Err(AuthError::MissingCredentials)
        );
        assert!(validate_credentials(&Credentials::new("ana", "pw")).is_ok());
    }

    #[test]
    fn description_is_optional_on_the_wire() {
        let plain = serde_json::to_value(Credentials::new("ana", "pw")).unwrap();
        assert!(plain.get("description").is_none());
        let full = serde_json::to_value(Credentials::new("ana", "pw").with_description("tycoon")).unwrap();
        assert_eq!(full["description"], "tycoon");
    }

    #[test]
    fn success_body_parses() {
        let s = parse_response(200, r#"{"username":"ana","token":"t0k"}"#).unwrap();
        assert_eq!(s.username, "ana");
        assert_eq!(s.token.as_deref(), Some("t0k"));
        let s = parse_response(201, r#"{"username":"ana"}"#).unwrap();
        assert_eq!(s.token, None);
    }

    #[test]
    fn error_body_prefers_error_then_message() {
        assert_eq!(
            parse_response(401, r#"{"error":"bad password"}"#),
            Err(AuthError::Rejected { status: 401, message: "bad password".into() })
        );
        assert_eq!(
            parse_response(409, r#"{"message":"taken"}"#),
            Err(AuthError::Rejected { status: 409, message: "taken".into() })
        );
        assert_eq!(
            parse_response(500, "oops"),
            Err(AuthError::Rejected {
                status: 500,
                message: "request failed with status 500".into()
            })
        );
    }

    #[test]
    fn malformed_success_body() {
        assert!(matches!(parse_response(200, "[]"), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn urls_join_cleanly() {
        let c = AccountsClient::new("http://localhost:8080/");
        assert_eq!(c.url(Route::Login), "http://localhost:8080/login");
        assert_eq!(c.url(Route::Register), "http://localhost:8080/register");
    }

    proptest! {
        #[test]
        fn non_blank_credentials_validate(user in "[a-z]{1,12}", pass in "[ -~]{1,24}") {
            prop_assert!(validate_credentials(&Credentials::new(user, pass)).is_ok());
        }
    }
}
