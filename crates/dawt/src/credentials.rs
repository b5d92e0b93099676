//! The single active third-party session credential.
//!
//! Values are sealed with [`TokenEncryptor`] before they reach the database
//! and are only opened at the point of use.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use crate::db::{credential_repo, job_repo::format_timestamp, Database, DatabaseError};
use crate::secrets::{SecretError, TokenEncryptor};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Metadata about the active credential. Never carries the token itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
    encryptor: Arc<TokenEncryptor>,
}

impl CredentialStore {
    pub fn new(db: Database, encryptor: TokenEncryptor) -> Self {
        Self {
            db,
            encryptor: Arc::new(encryptor),
        }
    }

    /// Seals `token` and makes it the only active credential.
    pub fn set_active(
        &self,
        token: &SecretString,
        notes: Option<&str>,
    ) -> Result<(), CredentialError> {
        let sealed = self.encryptor.encrypt(token)?;
        let id = credential_repo::replace_active(&self.db, &sealed, notes, &now())?;
        tracing::info!(credential_id = id, "Activated new credential");
        Ok(())
    }

    /// Opens the active credential and stamps its last use.
    ///
    /// A credential that fails to decrypt is an error, not a silent `None`.
    pub fn get_active(&self) -> Result<Option<SecretString>, CredentialError> {
        let Some(row) = credential_repo::find_active(&self.db)? else {
            return Ok(None);
        };
        let token = self.encryptor.decrypt(&row.sealed_value).map_err(|e| {
            tracing::error!(credential_id = row.id, "Stored credential cannot be decrypted");
            e
        })?;
        credential_repo::touch_last_used(&self.db, row.id, &now())?;
        Ok(Some(token))
    }

    pub fn clear(&self) -> Result<(), CredentialError> {
        let cleared = credential_repo::deactivate_all(&self.db)?;
        tracing::info!(cleared, "Cleared active credentials");
        Ok(())
    }

    pub fn status(&self) -> Result<CredentialStatus, CredentialError> {
        Ok(match credential_repo::find_active(&self.db)? {
            Some(row) => CredentialStatus {
                active: true,
                created_at: Some(row.created_at),
                last_used_at: row.last_used_at,
                notes: row.notes,
            },
            None => CredentialStatus {
                active: false,
                created_at: None,
                last_used_at: None,
                notes: None,
            },
        })
    }
}

fn now() -> String {
    let ts: DateTime<Utc> = Utc::now();
    format_timestamp(&ts)
}
