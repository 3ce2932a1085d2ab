use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{Result, StackError};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Secret store used while provisioning a stack.
pub trait SecretStore {
    /// Issue a new access token bound to `role` (a token policy).
    fn issue(&self, role: &str) -> Result<String>;
    fn write(&self, path: &str, fields: &BTreeMap<String, String>) -> Result<()>;
    fn delete(&self, path: &str) -> Result<()>;
    fn revoke(&self, token: &str) -> Result<()>;
}

/// Vault HTTP API client.
pub struct VaultClient {
    client: Client,
    address: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    auth: TokenAuth,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenAuth {
    client_token: String,
}

impl VaultClient {
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| StackError::Secret(err.to_string()))?;
        Ok(Self {
            client,
            address: address.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<reqwest::blocking::Response> {
        let response = request
            .header(TOKEN_HEADER, &self.token)
            .send()
            .map_err(|err| StackError::Secret(format!("{what}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(failure(what, status, &body));
        }
        Ok(response)
    }
}

impl SecretStore for VaultClient {
    fn issue(&self, role: &str) -> Result<String> {
        let request = self
            .client
            .post(self.url("auth/token/create"))
            .json(&json!({ "policies": [role] }));
        let response: TokenResponse = self
            .send(request, "token create")?
            .json()
            .map_err(|err| StackError::Secret(format!("invalid token response: {err}")))?;
        info!(role, "issued vault token");
        Ok(response.auth.client_token)
    }

    fn write(&self, path: &str, fields: &BTreeMap<String, String>) -> Result<()> {
        let request = self.client.post(self.url(path)).json(fields);
        self.send(request, &format!("write {path}"))?;
        info!(path, fields = fields.len(), "wrote vault secret");
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let request = self.client.delete(self.url(path));
        self.send(request, &format!("delete {path}"))?;
        info!(path, "deleted vault secret");
        Ok(())
    }

    fn revoke(&self, token: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url("auth/token/revoke"))
            .json(&json!({ "token": token }));
        self.send(request, "token revoke")?;
        Ok(())
    }
}

/// Vault reports failures as `{"errors": [...]}`; other bodies are kept verbatim.
fn failure(what: &str, status: StatusCode, body: &str) -> StackError {
    let detail = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(response) if !response.errors.is_empty() => response.errors.join("; "),
        _ => body.trim().to_string(),
    };
    if detail.is_empty() {
        StackError::Secret(format!("{what} failed with status {status}"))
    } else {
        StackError::Secret(format!("{what} failed with status {status}: {detail}"))
    }
}

/// Field map helper for [`SecretStore::write`].
pub fn fields<I, K, V>(entries: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}
