//! Download hooks: per-dataset request authentication.
//!
//! Hooks are declared in the registry as [`HookSpec`] records naming the
//! credentials they need. Credential values come from a
//! [`CredentialSource`] and are only looked up when a hook is built.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use super::error::HookError;

/// Resolves credential names to secret values.
pub trait CredentialSource: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Credentials read from process environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl CredentialSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).filter(|v| !v.is_empty()).cloned()
    }
}

/// Declarative hook configuration, as written in the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HookSpec {
    /// Append `param=<credential>` to the query string.
    ApiKeyQuery { param: String, credential: String },
    /// HTTP basic authentication.
    BasicAuth { username: String, password: String },
    /// Exchange username/password for a token and send it in `header`.
    TokenLogin {
        login_url: String,
        username: String,
        password: String,
        header: String,
    },
}

impl HookSpec {
    /// Names of every credential this hook needs.
    pub fn credentials(&self) -> Vec<&str> {
        match self {
            HookSpec::ApiKeyQuery { credential, .. } => vec![credential.as_str()],
            HookSpec::BasicAuth { username, password }
            | HookSpec::TokenLogin {
                username, password, ..
            } => vec![username.as_str(), password.as_str()],
        }
    }

    /// Resolve credentials and build the hook.
    pub fn build(
        &self,
        credentials: &dyn CredentialSource,
        http: &reqwest::Client,
    ) -> Result<Box<dyn DownloadHook>, HookError> {
        let lookup = |name: &String| {
            credentials
                .get(name)
                .ok_or_else(|| HookError::MissingCredential(name.clone()))
        };

        Ok(match self {
            HookSpec::ApiKeyQuery { param, credential } => Box::new(ApiKeyQuery {
                param: param.clone(),
                value: lookup(credential)?,
            }),
            HookSpec::BasicAuth { username, password } => Box::new(BasicAuth {
                username: lookup(username)?,
                password: lookup(password)?,
            }),
            HookSpec::TokenLogin {
                login_url,
                username,
                password,
                header,
            } => Box::new(TokenLogin {
                http: http.clone(),
                login_url: login_url.clone(),
                username: lookup(username)?,
                password: lookup(password)?,
                header: header.clone(),
            }),
        })
    }
}

/// Mutates an outgoing download request, typically to authenticate it.
#[async_trait]
pub trait DownloadHook: Send + Sync {
    async fn prepare(&self, request: &mut reqwest::Request) -> Result<(), HookError>;
}

/// Adds an API key as a query parameter.
pub struct ApiKeyQuery {
    param: String,
    value: String,
}

#[async_trait]
impl DownloadHook for ApiKeyQuery {
    async fn prepare(&self, request: &mut reqwest::Request) -> Result<(), HookError> {
        request
            .url_mut()
            .query_pairs_mut()
            .append_pair(&self.param, &self.value);
        Ok(())
    }
}

/// Sets an `Authorization: Basic` header.
pub struct BasicAuth {
    username: String,
    password: String,
}

#[async_trait]
impl DownloadHook for BasicAuth {
    async fn prepare(&self, request: &mut reqwest::Request) -> Result<(), HookError> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|_| HookError::InvalidHeader(AUTHORIZATION.to_string()))?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Logs in with a form POST and forwards the returned token in a header.
pub struct TokenLogin {
    http: reqwest::Client,
    login_url: String,
    username: String,
    password: String,
    header: String,
}

#[async_trait]
impl DownloadHook for TokenLogin {
    async fn prepare(&self, request: &mut reqwest::Request) -> Result<(), HookError> {
        let response = self
            .http
            .post(&self.login_url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HookError::Login {
                message: format!("login endpoint returned {status}"),
            });
        }

        let login: LoginResponse = response.json().await?;

        let name = HeaderName::from_bytes(self.header.as_bytes())
            .map_err(|_| HookError::InvalidHeader(self.header.clone()))?;
        let mut value = HeaderValue::from_str(&login.token)
            .map_err(|_| HookError::InvalidHeader(self.header.clone()))?;
        value.set_sensitive(true);
        request.headers_mut().insert(name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{Method, Request, Url};

    use super::*;

    fn creds(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn request() -> Request {
        Request::new(
            Method::GET,
            Url::parse("https://data.bus-data.dft.gov.uk/avl/download/gtfsrt?format=zip").unwrap(),
        )
    }

    #[test]
    fn decode_specs() {
        let spec: HookSpec = serde_json::from_str(
            r#"{"type":"api-key-query","param":"api_key","credential":"TRANSIT_BODS_API_KEY"}"#,
        )
        .unwrap();
        assert_eq!(spec.credentials(), vec!["TRANSIT_BODS_API_KEY"]);

        let spec: HookSpec = serde_json::from_str(
            r#"{"type":"token-login","login_url":"https://example.org/authenticate",
                "username":"NR_USER","password":"NR_PASS","header":"X-Auth-Token"}"#,
        )
        .unwrap();
        assert_eq!(spec.credentials(), vec!["NR_USER", "NR_PASS"]);
    }

    #[tokio::test]
    async fn api_key_appended_to_query() {
        let spec = HookSpec::ApiKeyQuery {
            param: "api_key".into(),
            credential: "KEY".into(),
        };
        let hook = spec
            .build(&creds(&[("KEY", "s3cret")]), &reqwest::Client::new())
            .unwrap();

        let mut req = request();
        hook.prepare(&mut req).await.unwrap();

        assert_eq!(req.url().query(), Some("format=zip&api_key=s3cret"));
    }

    #[tokio::test]
    async fn basic_auth_header() {
        let spec = HookSpec::BasicAuth {
            username: "USER".into(),
            password: "PASS".into(),
        };
        let hook = spec
            .build(
                &creds(&[("USER", "alice"), ("PASS", "hunter2")]),
                &reqwest::Client::new(),
            )
            .unwrap();

        let mut req = request();
        hook.prepare(&mut req).await.unwrap();

        let header = req.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(header.to_str().unwrap(), "Basic YWxpY2U6aHVudGVyMg==");
    }

    #[test]
    fn missing_credential_fails_build() {
        let spec = HookSpec::BasicAuth {
            username: "USER".into(),
            password: "PASS".into(),
        };
        let result = spec.build(&creds(&[("USER", "alice")]), &reqwest::Client::new());
        assert!(matches!(result, Err(HookError::MissingCredential(name)) if name == "PASS"));
    }

    #[test]
    fn empty_credential_counts_as_missing() {
        let source = creds(&[("KEY", "")]);
        assert!(CredentialSource::get(&source, "KEY").is_none());
    }
}
