use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Contact, NotificationError};

/// Resolves a party id to where and to whom a message should go.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn lookup(&self, party_id: Uuid) -> Result<Option<Contact>, NotificationError>;
}

#[derive(Default, Clone)]
pub struct InMemoryContactDirectory {
    contacts: Arc<RwLock<HashMap<Uuid, Contact>>>,
}

impl InMemoryContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, party_id: Uuid, email: &str, name: &str) {
        self.contacts.write().await.insert(
            party_id,
            Contact {
                email: email.to_string(),
                name: name.to_string(),
            },
        );
    }
}

#[async_trait]
impl ContactDirectory for InMemoryContactDirectory {
    async fn lookup(&self, party_id: Uuid) -> Result<Option<Contact>, NotificationError> {
        Ok(self.contacts.read().await.get(&party_id).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    email: Option<String>,
    full_name: Option<String>,
}

/// Reads `profiles` rows (`id`, `email`, `full_name`).
pub struct SupabaseContactDirectory {
    client: Arc<SupabaseClient>,
}

impl SupabaseContactDirectory {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContactDirectory for SupabaseContactDirectory {
    async fn lookup(&self, party_id: Uuid) -> Result<Option<Contact>, NotificationError> {
        let query = format!("id=eq.{}&select=email,full_name", party_id);
        let rows: Vec<ProfileRow> = self.client.select("profiles", &query).await?;

        Ok(rows.into_iter().next().and_then(|row| {
            let email = row.email?;
            let name = row.full_name.unwrap_or_else(|| email.clone());
            Some(Contact { email, name })
        }))
    }
}
