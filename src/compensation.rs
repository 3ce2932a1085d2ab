//! Secret issuance with rollback.
//!
//! Provisioning a stack usually needs secrets created first (access tokens for
//! the new machines, credentials written to the secret store). When anything
//! after that fails the issued secrets are reversed so a failed stack leaves
//! nothing usable behind.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::Result;
use crate::secrets::SecretStore;

/// A secret created through a [`SecretLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuedSecret {
    Token { role: String, token: String },
    Data { path: String },
}

/// Records every secret created during one provisioning attempt.
pub struct SecretLedger<'a> {
    store: &'a dyn SecretStore,
    issued: Vec<IssuedSecret>,
}

impl<'a> SecretLedger<'a> {
    pub fn new(store: &'a dyn SecretStore) -> Self {
        Self {
            store,
            issued: Vec::new(),
        }
    }

    pub fn issue_token(&mut self, role: &str) -> Result<String> {
        let token = self.store.issue(role)?;
        self.issued.push(IssuedSecret::Token {
            role: role.to_string(),
            token: token.clone(),
        });
        Ok(token)
    }

    pub fn write(&mut self, path: &str, fields: &BTreeMap<String, String>) -> Result<()> {
        self.store.write(path, fields)?;
        self.issued.push(IssuedSecret::Data {
            path: path.to_string(),
        });
        Ok(())
    }

    pub fn issued(&self) -> &[IssuedSecret] {
        &self.issued
    }

    /// Reverse everything in reverse issue order. Each reversal is attempted
    /// regardless of earlier failures; failures are only logged.
    pub fn reverse_all(&mut self) {
        while let Some(secret) = self.issued.pop() {
            let result = match &secret {
                IssuedSecret::Token { token, .. } => self.store.revoke(token),
                IssuedSecret::Data { path } => self.store.delete(path),
            };
            match (result, &secret) {
                (Ok(()), IssuedSecret::Token { role, .. }) => info!(role = %role, "revoked token"),
                (Ok(()), IssuedSecret::Data { path }) => info!(path = %path, "deleted secret"),
                (Err(err), IssuedSecret::Token { role, .. }) => {
                    warn!(role = %role, error = %err, "could not revoke token")
                }
                (Err(err), IssuedSecret::Data { path }) => {
                    warn!(path = %path, error = %err, "could not delete secret")
                }
            }
        }
    }
}

/// Run `body` with a fresh ledger. When `body` fails, every secret it issued
/// is reversed and the original error is returned.
pub fn provision_with_compensation<T, F>(store: &dyn SecretStore, stack: &str, body: F) -> Result<T>
where
    F: FnOnce(&mut SecretLedger<'_>) -> Result<T>,
{
    let mut ledger = SecretLedger::new(store);
    match body(&mut ledger) {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!(
                stack,
                error = %err,
                issued = ledger.issued().len(),
                "provisioning failed, reversing issued secrets"
            );
            ledger.reverse_all();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
    }

    impl SecretStore for RecordingStore {
        fn issue(&self, role: &str) -> Result<String> {
            self.calls.lock().unwrap().push(format!("issue {role}"));
            Ok(format!("token-{role}"))
        }

        fn write(&self, path: &str, _fields: &BTreeMap<String, String>) -> Result<()> {
            self.calls.lock().unwrap().push(format!("write {path}"));
            Ok(())
        }

        fn delete(&self, path: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("delete {path}"));
            Ok(())
        }

        fn revoke(&self, token: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("revoke {token}"));
            Ok(())
        }
    }

    #[test]
    fn success_reverses_nothing() {
        let store = RecordingStore::default();
        let token = provision_with_compensation(&store, "web", |ledger| {
            ledger.issue_token("web")
        })
        .unwrap();
        assert_eq!(token, "token-web");
        assert_eq!(*store.calls.lock().unwrap(), vec!["issue web"]);
    }

    #[test]
    fn failure_reverses_in_reverse_order() {
        let store = RecordingStore::default();
        let err = provision_with_compensation(&store, "web", |ledger| -> Result<()> {
            ledger.issue_token("web")?;
            ledger.write("secret/web/db", &BTreeMap::new())?;
            Err(StackError::Other("boom".into()))
        })
        .unwrap_err();
        assert!(matches!(err, StackError::Other(message) if message == "boom"));
        assert_eq!(
            *store.calls.lock().unwrap(),
            vec![
                "issue web",
                "write secret/web/db",
                "delete secret/web/db",
                "revoke token-web"
            ]
        );
    }
}
