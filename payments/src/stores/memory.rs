//! In-process stores.
//!
//! [`InMemoryConnectionStore`] keeps tokens sealed with a [`TokenCipher`],
//! exactly as a database-backed store would, so nothing in memory holds a
//! plaintext token longer than a single call.

use crate::crypto::TokenCipher;
use crate::error::Result;
use crate::providers::{
    ConnectState, ConnectStateStore, ConnectionStatus, ConnectionStore, MollieConnection,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kassa_core::{OrganizationId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Connection row as it sits at rest.
#[derive(Debug, Clone)]
struct StoredConnection {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    scope: String,
    status: ConnectionStatus,
    connected_by: UserId,
    connected_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Connection store with tokens encrypted at rest.
#[derive(Debug, Clone)]
pub struct InMemoryConnectionStore {
    cipher: TokenCipher,
    rows: Arc<RwLock<HashMap<OrganizationId, StoredConnection>>>,
}

impl InMemoryConnectionStore {
    /// Create an empty store that seals tokens with `cipher`.
    #[must_use]
    pub fn new(cipher: TokenCipher) -> Self {
        Self {
            cipher,
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Sealed access token as stored, for inspecting encryption at rest.
    pub async fn raw_access_token(&self, organization_id: OrganizationId) -> Option<String> {
        self.rows
            .read()
            .await
            .get(&organization_id)
            .map(|row| row.access_token.clone())
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn save(&self, connection: &MollieConnection) -> Result<()> {
        let row = StoredConnection {
            access_token: self.cipher.seal(&connection.access_token)?,
            refresh_token: self.cipher.seal(&connection.refresh_token)?,
            expires_at: connection.expires_at,
            scope: connection.scope.clone(),
            status: connection.status,
            connected_by: connection.connected_by,
            connected_at: connection.connected_at,
            updated_at: connection.updated_at,
        };
        self.rows
            .write()
            .await
            .insert(connection.organization_id, row);

        tracing::debug!(
            organization_id = %connection.organization_id,
            status = ?connection.status,
            "Stored Mollie connection (encrypted)"
        );
        Ok(())
    }

    async fn get(&self, organization_id: OrganizationId) -> Result<Option<MollieConnection>> {
        let row = self.rows.read().await.get(&organization_id).cloned();
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(MollieConnection {
            organization_id,
            access_token: self.cipher.open(&row.access_token)?,
            refresh_token: self.cipher.open(&row.refresh_token)?,
            expires_at: row.expires_at,
            scope: row.scope,
            status: row.status,
            connected_by: row.connected_by,
            connected_at: row.connected_at,
            updated_at: row.updated_at,
        }))
    }

    async fn delete(&self, organization_id: OrganizationId) -> Result<()> {
        self.rows.write().await.remove(&organization_id);
        Ok(())
    }
}

/// Pending connect attempts held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnectStateStore {
    states: Arc<Mutex<HashMap<String, ConnectState>>>,
}

impl InMemoryConnectStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectStateStore for InMemoryConnectStateStore {
    async fn put(&self, state: ConnectState) -> Result<()> {
        self.states.lock().await.insert(state.state.clone(), state);
        Ok(())
    }

    async fn take(&self, state: &str) -> Result<Option<ConnectState>> {
        Ok(self.states.lock().await.remove(state))
    }
}
