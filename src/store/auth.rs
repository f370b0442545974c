use super::Store;
use crate::error::Result;
use serde::Serialize;

/// Stored OAuth tokens for the streaming service
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AuthToken {
    pub id: i64,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<String>,
}

impl Store {
    pub async fn save_auth_token(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<&str>,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO auth_tokens (access_token, refresh_token, expires_at) VALUES (?, ?, ?)",
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// Most recently stored token, if any
    pub async fn latest_auth_token(&self) -> Result<Option<AuthToken>> {
        let token = sqlx::query_as::<_, AuthToken>(
            "SELECT id, access_token, refresh_token, expires_at FROM auth_tokens ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(self.pool())
        .await?;

        Ok(token)
    }
}
