use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Error as SqlxError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db::store::CollabStore;
use crate::models::{EventRow, MarkerRow, MarkerType, NewMarker, SessionRow};

// Global database instance
static DB: OnceCell<Arc<DbCollab>> = OnceCell::const_new();

/// Initialize the global database connection
///
/// # Arguments
/// * `database_url` - PostgreSQL connection string
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error
pub async fn init_db(database_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = DbCollab::new(database_url).await?;
    DB.set(Arc::new(db))
        .map_err(|_| "Database already initialized")?;
    Ok(())
}

/// Get the global database instance
///
/// # Returns
/// * `Option<Arc<DbCollab>>` - Database instance if initialized
pub fn get_db() -> Option<Arc<DbCollab>> {
    DB.get().cloned()
}

/// Database connection pool
pub struct DbCollab {
    pool: PgPool,
}

impl DbCollab {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    ///
    /// # Returns
    /// * `Result<Self, SqlxError>` - Database connection pool or error
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20) // Support many concurrent connection handlers
            .min_connections(2) // Keep some connections alive
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600)) // Close idle connections after 10 minutes
            .max_lifetime(Duration::from_secs(1800)) // Recycle connections after 30 minutes
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn log_pool_state(&self, operation: &str) {
        let pool_idle = self.pool.num_idle() as u32;
        let pool_size = self.pool.size();
        debug!(
            "{}. Pool connections: {} idle, {} in use",
            operation,
            pool_idle,
            pool_size.saturating_sub(pool_idle)
        );
    }
}

#[async_trait]
impl CollabStore for DbCollab {
    async fn create_session(
        &self,
        document_id: Uuid,
        owner_id: &str,
        session_name: &str,
    ) -> Result<SessionRow, SqlxError> {
        let session_id = Uuid::new_v4();
        self.log_pool_state("Creating collaboration session");

        let query_sql = r#"
            INSERT INTO collab_sessions(id, document_id, owner_id, session_name, allowed_users, is_active)
            VALUES ($1, $2, $3, $4, '{}', TRUE)
            RETURNING *;
        "#;
        let row = sqlx::query_as::<_, SessionRow>(query_sql)
            .bind(session_id)
            .bind(document_id)
            .bind(owner_id)
            .bind(session_name)
            .fetch_one(&self.pool)
            .await?;

        info!(
            "Collaboration session {} created for document {} by {}",
            row.id, document_id, owner_id
        );
        Ok(row)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<SessionRow>, SqlxError> {
        let query_sql = "SELECT * FROM collab_sessions WHERE id = $1";
        sqlx::query_as::<_, SessionRow>(query_sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn invite_user(
        &self,
        session_id: Uuid,
        user_id: &str,
    ) -> Result<Option<SessionRow>, SqlxError> {
        self.log_pool_state("Inviting user to session");

        // Begin a transaction
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    "Failed to acquire connection from pool for session {}: {}",
                    session_id, e
                );
                return Err(e);
            }
        };

        // Lock the row so two concurrent invitations cannot both append
        let session = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM collab_sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(session) = session else {
            tx.rollback().await?;
            return Ok(None);
        };

        // Idempotent append
        if session.allowed_users.iter().any(|u| u == user_id) {
            tx.commit().await?;
            debug!("User {} already invited to session {}", user_id, session_id);
            return Ok(Some(session));
        }

        let updated = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE collab_sessions
            SET allowed_users = array_append(allowed_users, $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *;
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("User {} invited to session {}", user_id, session_id);
        Ok(Some(updated))
    }

    async fn insert_marker(&self, marker: NewMarker) -> Result<MarkerRow, SqlxError> {
        let marker_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = marker.expires_at(now);

        // Begin a transaction
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    "Failed to acquire connection from pool for session {}: {}",
                    marker.session_id, e
                );
                return Err(e);
            }
        };

        // At most one active viewing marker per (session, user, section):
        // retire the previous one before inserting the replacement.
        if marker.marker_type == MarkerType::Viewing {
            sqlx::query(
                r#"
                UPDATE collab_markers
                SET is_active = FALSE
                WHERE session_id = $1
                    AND user_id = $2
                    AND section_id = $3
                    AND marker_type = 'viewing'
                    AND is_active = TRUE;
                "#,
            )
            .bind(marker.session_id)
            .bind(&marker.user.user_id)
            .bind(&marker.section_id)
            .execute(&mut *tx)
            .await?;
        }

        let query_sql = r#"
            INSERT INTO collab_markers(
                id, session_id, user_id, user_name, section_id,
                marker_type, position, content, is_active, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10)
            RETURNING *;
        "#;
        let row = sqlx::query_as::<_, MarkerRow>(query_sql)
            .bind(marker_id)
            .bind(marker.session_id)
            .bind(&marker.user.user_id)
            .bind(&marker.user.user_name)
            .bind(&marker.section_id)
            .bind(marker.marker_type)
            .bind(&marker.position)
            .bind(&marker.content)
            .bind(expires_at)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            "Marker {} ({}) saved for session {} section '{}'",
            row.id, row.marker_type, row.session_id, row.section_id
        );
        Ok(row)
    }

    async fn deactivate_marker(&self, marker_id: Uuid) -> Result<bool, SqlxError> {
        let result = sqlx::query(
            "UPDATE collab_markers SET is_active = FALSE WHERE id = $1 AND is_active = TRUE",
        )
        .bind(marker_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_user_markers(
        &self,
        session_id: Uuid,
        user_id: &str,
    ) -> Result<u64, SqlxError> {
        let result = sqlx::query(
            r#"
            UPDATE collab_markers
            SET is_active = FALSE
            WHERE session_id = $1 AND user_id = $2 AND is_active = TRUE;
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let flipped = result.rows_affected();
        if flipped > 0 {
            debug!(
                "Deactivated {} marker(s) of user {} in session {}",
                flipped, user_id, session_id
            );
        }
        Ok(flipped)
    }

    async fn active_markers(&self, session_id: Uuid) -> Result<Vec<MarkerRow>, SqlxError> {
        let query_sql = r#"
            SELECT * FROM collab_markers
            WHERE session_id = $1
                AND is_active = TRUE
                AND (expires_at IS NULL OR expires_at > NOW())
            ORDER BY created_at;
        "#;
        sqlx::query_as::<_, MarkerRow>(query_sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn append_event(
        &self,
        session_id: Uuid,
        user_id: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<EventRow, SqlxError> {
        let query_sql = r#"
            INSERT INTO collab_events(id, session_id, user_id, event_type, event_data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#;
        sqlx::query_as::<_, EventRow>(query_sql)
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(user_id)
            .bind(event_type)
            .bind(&event_data)
            .fetch_one(&self.pool)
            .await
    }

    async fn deactivate_expired_markers(&self) -> Result<u64, SqlxError> {
        self.log_pool_state("Sweeping expired markers");

        let result = sqlx::query(
            r#"
            UPDATE collab_markers
            SET is_active = FALSE
            WHERE is_active = TRUE
                AND expires_at IS NOT NULL
                AND expires_at < NOW();
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
