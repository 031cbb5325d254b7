use crate::domain::models::AuthToken;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::{InMemoryKeyValueStore, KeyValueStore};
use std::sync::Arc;

pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Holds the single authentication record, refresh token included.
pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &AuthToken) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<AuthToken>, InfraError>;
    fn delete_token(&self) -> Result<(), InfraError>;
}

/// Credential store on the client-local key-value state, under [`AUTH_TOKEN_KEY`].
#[derive(Debug)]
pub struct KeyValueCredentialStore<K>
where
    K: KeyValueStore + ?Sized,
{
    kv: Arc<K>,
}

pub type InMemoryCredentialStore = KeyValueCredentialStore<InMemoryKeyValueStore>;

impl<K> KeyValueCredentialStore<K>
where
    K: KeyValueStore + ?Sized,
{
    pub fn new(kv: Arc<K>) -> Self {
        Self { kv }
    }
}

impl<K> Default for KeyValueCredentialStore<K>
where
    K: KeyValueStore + Default,
{
    fn default() -> Self {
        Self::new(Arc::new(K::default()))
    }
}

impl<K> CredentialStore for KeyValueCredentialStore<K>
where
    K: KeyValueStore + ?Sized,
{
    fn save_token(&self, token: &AuthToken) -> Result<(), InfraError> {
        let payload = serde_json::to_string(token)
            .map_err(|error| InfraError::Credential(format!("serializing token: {error}")))?;
        self.kv
            .set(AUTH_TOKEN_KEY, &payload)
            .map_err(|error| InfraError::Credential(format!("writing token: {error}")))
    }

    /// An unreadable record counts as signed out rather than as a failure.
    fn load_token(&self) -> Result<Option<AuthToken>, InfraError> {
        let Some(payload) = self
            .kv
            .get(AUTH_TOKEN_KEY)
            .map_err(|error| InfraError::Credential(format!("reading token: {error}")))?
        else {
            return Ok(None);
        };

        match serde_json::from_str::<AuthToken>(&payload) {
            Ok(token) => Ok(Some(token)),
            Err(error) => {
                tracing::warn!(key = AUTH_TOKEN_KEY, %error, "discarding unreadable stored token");
                Ok(None)
            }
        }
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        self.kv
            .remove(AUTH_TOKEN_KEY)
            .map_err(|error| InfraError::Credential(format!("deleting token: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bootstrap::bootstrap_workspace;
    use crate::domain::models::TokenError;
    use crate::infrastructure::storage::SqliteKeyValueStore;

    fn token() -> AuthToken {
        AuthToken {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            access_token_expires_at_ms: 1_771_200_000_000,
            error: None,
        }
    }

    #[test]
    fn sqlite_store_keeps_token_across_instances() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bootstrap = bootstrap_workspace(dir.path()).expect("bootstrap");

        let writer = KeyValueCredentialStore::new(Arc::new(SqliteKeyValueStore::new(
            &bootstrap.database_path,
        )));
        writer.save_token(&token()).expect("save token");

        let reader = KeyValueCredentialStore::new(Arc::new(SqliteKeyValueStore::new(
            &bootstrap.database_path,
        )));
        assert_eq!(reader.load_token().expect("load token"), Some(token()));
    }

    #[test]
    fn refresh_failure_flag_survives_reload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bootstrap = bootstrap_workspace(dir.path()).expect("bootstrap");
        let store = KeyValueCredentialStore::new(Arc::new(SqliteKeyValueStore::new(
            &bootstrap.database_path,
        )));
        let flagged = AuthToken {
            error: Some(TokenError::RefreshAccessTokenError),
            ..token()
        };

        store.save_token(&flagged).expect("save token");

        assert_eq!(store.load_token().expect("load token"), Some(flagged));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = InMemoryCredentialStore::default();
        store.save_token(&token()).expect("save token");

        store.delete_token().expect("first delete");
        store.delete_token().expect("second delete");

        assert_eq!(store.load_token().expect("load token"), None);
    }

    #[test]
    fn unreadable_record_reads_as_signed_out() {
        let kv = Arc::new(InMemoryKeyValueStore::default());
        kv.set(AUTH_TOKEN_KEY, "{not json").expect("seed");
        let store = KeyValueCredentialStore::new(kv);

        assert_eq!(store.load_token().expect("load token"), None);
    }
}
