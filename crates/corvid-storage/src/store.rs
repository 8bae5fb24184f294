// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`InteractionStore`] trait.
//!
//! Interactions are JSON blobs keyed by tweet ID inside the configured
//! namespace; the typed bot-state blob lives in a sibling `<namespace>:state`
//! namespace so it can never collide with a tweet ID.

use std::path::PathBuf;

use async_trait::async_trait;
use rusqlite::params;
use tracing::debug;

use corvid_config::StorageConfig;
use corvid_core::{BotError, BotState, Interaction, InteractionStore};

use crate::database::{Database, map_tr_err};

const STATE_KEY: &str = "bot-state";

/// SQLite-backed interaction store.
pub struct SqliteStore {
    db: Database,
    namespace: String,
}

impl SqliteStore {
    /// Opens the store at the configured path, falling back to the XDG data
    /// directory when `db_path` is unset.
    pub async fn open(config: &StorageConfig) -> Result<Self, BotError> {
        let path = match &config.db_path {
            Some(path) => PathBuf::from(path),
            None => {
                let dir = dirs::data_dir()
                    .ok_or_else(|| BotError::Config("cannot determine data directory".into()))?
                    .join("corvid");
                std::fs::create_dir_all(&dir).map_err(|e| BotError::Storage {
                    message: format!("failed to create data directory: {e}"),
                })?;
                dir.join("corvid.db")
            }
        };
        let path = path.to_string_lossy().into_owned();
        let db = Database::open(&path).await?;
        debug!(path, namespace = %config.namespace, "interaction store opened");
        Ok(Self {
            db,
            namespace: config.namespace.clone(),
        })
    }

    pub async fn close(&self) -> Result<(), BotError> {
        self.db.close().await
    }

    fn state_namespace(&self) -> String {
        format!("{}:state", self.namespace)
    }

    async fn get_raw(&self, namespace: String, key: String) -> Result<Option<String>, BotError> {
        self.db
            .connection()
            .call(move |conn| {
                let result = conn.query_row(
                    "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                    |row| row.get::<_, String>(0),
                );
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    async fn put_raw(
        &self,
        namespace: String,
        key: String,
        value: String,
    ) -> Result<(), BotError> {
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO kv (namespace, key, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT (namespace, key) DO UPDATE
                     SET value = excluded.value,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![namespace, key, value],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl InteractionStore for SqliteStore {
    async fn get_interaction(&self, tweet_id: &str) -> Result<Option<Interaction>, BotError> {
        let raw = self
            .get_raw(self.namespace.clone(), tweet_id.to_string())
            .await?;
        match raw {
            Some(json) => {
                let interaction =
                    serde_json::from_str(&json).map_err(|e| BotError::Storage {
                        message: format!("corrupt interaction record {tweet_id}: {e}"),
                    })?;
                Ok(Some(interaction))
            }
            None => Ok(None),
        }
    }

    async fn put_interaction(
        &self,
        tweet_id: &str,
        interaction: &Interaction,
    ) -> Result<(), BotError> {
        let json = serde_json::to_string(interaction).map_err(|e| BotError::Storage {
            message: format!("failed to serialize interaction: {e}"),
        })?;
        self.put_raw(self.namespace.clone(), tweet_id.to_string(), json)
            .await
    }

    async fn load_state(&self) -> Result<BotState, BotError> {
        let raw = self
            .get_raw(self.state_namespace(), STATE_KEY.to_string())
            .await?;
        match raw {
            Some(json) => serde_json::from_str(&json).map_err(|e| BotError::Storage {
                message: format!("corrupt bot state: {e}"),
            }),
            None => Ok(BotState::default()),
        }
    }

    async fn save_state(&self, state: &BotState) -> Result<(), BotError> {
        let json = serde_json::to_string(state).map_err(|e| BotError::Storage {
            message: format!("failed to serialize bot state: {e}"),
        })?;
        self.put_raw(self.state_namespace(), STATE_KEY.to_string(), json)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_core::Role;
    use tempfile::tempdir;

    async fn setup_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            db_path: Some(dir.path().join("test.db").to_string_lossy().into_owned()),
            namespace: "test".into(),
            cache_snapshot_path: None,
        };
        let store = SqliteStore::open(&config).await.unwrap();
        (store, dir)
    }

    fn interaction(prompt_id: &str) -> Interaction {
        Interaction {
            role: Role::User,
            prompt_id: prompt_id.to_string(),
            prompt_user_id: "u1".into(),
            prompt_username: "alice".into(),
            prompt: "what is rust?".into(),
            response: Some("a systems language".into()),
            response_ids: vec!["1501".into()],
            conversation_id: Some("conv-1".into()),
            parent_message_id: Some("msg-1".into()),
            message_id: Some("msg-2".into()),
            account_id: Some("acct-a".into()),
            error: None,
            is_error_final: false,
            priority_score: 3.5,
            num_followers: 42,
            is_reply: false,
        }
    }

    #[tokio::test]
    async fn interaction_roundtrips() {
        let (store, _dir) = setup_store().await;
        let record = interaction("1500");

        store.put_interaction("1500", &record).await.unwrap();
        let loaded = store.get_interaction("1500").await.unwrap().unwrap();
        assert_eq!(loaded, record);

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_interaction_is_none() {
        let (store, _dir) = setup_store().await;
        assert!(store.get_interaction("9999").await.unwrap().is_none());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn put_replaces_prior_entry() {
        let (store, _dir) = setup_store().await;
        let mut record = interaction("1500");
        store.put_interaction("1500", &record).await.unwrap();

        record.error = Some("rate limited".into());
        record.response = None;
        store.put_interaction("1500", &record).await.unwrap();

        let loaded = store.get_interaction("1500").await.unwrap().unwrap();
        assert_eq!(loaded.error.as_deref(), Some("rate limited"));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_state_yields_default() {
        let (store, _dir) = setup_store().await;
        let state = store.load_state().await.unwrap();
        assert_eq!(state, BotState::default());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn state_roundtrips_and_does_not_collide_with_interactions() {
        let (store, _dir) = setup_store().await;
        let state = BotState {
            since_mention_id: Some("1500".into()),
            refresh_token: Some("refresh-1".into()),
            access_token: Some("tok-1".into()),
        };
        store.save_state(&state).await.unwrap();

        // An interaction under the state key's spelling must not shadow it.
        store
            .put_interaction(STATE_KEY, &interaction(STATE_KEY))
            .await
            .unwrap();

        let loaded = store.load_state().await.unwrap();
        assert_eq!(loaded, state);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.db").to_string_lossy().into_owned();
        let a = SqliteStore::open(&StorageConfig {
            db_path: Some(path.clone()),
            namespace: "a".into(),
            cache_snapshot_path: None,
        })
        .await
        .unwrap();
        let b = SqliteStore::open(&StorageConfig {
            db_path: Some(path),
            namespace: "b".into(),
            cache_snapshot_path: None,
        })
        .await
        .unwrap();

        a.put_interaction("1500", &interaction("1500")).await.unwrap();
        assert!(b.get_interaction("1500").await.unwrap().is_none());

        a.close().await.unwrap();
    }
}
