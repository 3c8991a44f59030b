use std::fmt;

use crate::error::{MonitorError, Result};

/// An opaque secret used to authenticate against the Bitbucket API.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Credentials accepted by the Bitbucket API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username plus app password, sent as HTTP basic auth
    Basic { username: String, app_password: Token },
    /// Workspace or repository access token, sent as a bearer token
    Bearer(Token),
}

impl Credentials {
    /// Picks a credential from the supplied values.
    ///
    /// Username and app password win over an access token when both are
    /// present. Empty strings are treated as missing.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no complete credential is available.
    pub fn resolve(
        username: Option<&str>,
        app_password: Option<&str>,
        access_token: Option<&str>,
    ) -> Result<Self> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.filter(|v| !v.trim().is_empty())
        }

        if let (Some(username), Some(app_password)) = (present(username), present(app_password)) {
            return Ok(Self::Basic {
                username: username.to_string(),
                app_password: Token::from(app_password),
            });
        }

        if let Some(token) = present(access_token) {
            return Ok(Self::Bearer(Token::from(token)));
        }

        Err(MonitorError::Config(
            "Missing Bitbucket credentials. Set BITBUCKET_USERNAME and BITBUCKET_APP_PASSWORD, \
             or BITBUCKET_ACCESS_TOKEN"
                .to_string(),
        ))
    }

    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Basic {
                username,
                app_password,
            } => request.basic_auth(username, Some(app_password.as_str())),
            Self::Bearer(token) => request.bearer_auth(token.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_credentials_preferred() {
        let creds = Credentials::resolve(Some("alice"), Some("app-pass"), Some("tok")).unwrap();
        assert_eq!(
            creds,
            Credentials::Basic {
                username: "alice".to_string(),
                app_password: Token::from("app-pass"),
            }
        );
    }

    #[test]
    fn test_bearer_fallback_when_password_missing() {
        let creds = Credentials::resolve(Some("alice"), None, Some("tok")).unwrap();
        assert_eq!(creds, Credentials::Bearer(Token::from("tok")));
    }

    #[test]
    fn test_empty_values_are_missing() {
        let result = Credentials::resolve(Some(""), Some("  "), Some(""));
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_blank_password_falls_back_to_token() {
        let creds = Credentials::resolve(Some("alice"), Some(" "), Some("tok")).unwrap();
        assert_eq!(creds, Credentials::Bearer(Token::from("tok")));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::from("super-secret");
        assert!(!format!("{token:?}").contains("super-secret"));
        let creds = Credentials::Bearer(token);
        assert!(!format!("{creds:?}").contains("super-secret"));
    }
}
