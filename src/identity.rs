use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{hash_access_token, Caller, Role};
use crate::store::StoreError;

/// Resolves an opaque bearer token into the caller's identity and role.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<Caller>, StoreError>;
}

pub struct PgIdentityProvider {
    db: PgPool,
}

impl PgIdentityProvider {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
    user_id: Uuid,
    roles: i16,
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Option<Caller>, StoreError> {
        let token_hash = hash_access_token(token);

        // Validate session_token + ensure dcms_user is active
        let row: Option<SessionLookupRow> = sqlx::query_as::<_, SessionLookupRow>(
            r#"
            SELECT st.session_token_id, st.user_id, u.roles
            FROM session_token st
            JOIN "dcms_user" u ON u.user_id = st.user_id
            WHERE st.session_token_hash = $1
              AND st.revoked_at IS NULL
              AND st.expires_at > now()
              AND u.is_active = true
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Some(role) = Role::from_code(row.roles) else {
            tracing::warn!(user_id = %row.user_id, code = row.roles, "session carries unsupported role");
            return Ok(None);
        };

        // Touch last_seen_at (best-effort)
        let _ = sqlx::query(
            r#"
            UPDATE session_token
            SET last_seen_at = now()
            WHERE session_token_id = $1
            "#,
        )
        .bind(row.session_token_id)
        .execute(&self.db)
        .await;

        Ok(Some(Caller::new(row.user_id, role)))
    }
}
