use moka::sync::Cache;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::store::CollabStore;
use crate::models::SessionRow;

/// Global session context cache
///
/// Join authorization hits this cache before the database. Entries are
/// primed on session creation and invalidated on invitation, so the
/// allow-list a join sees is never staler than the last in-process
/// mutation.
static SESSION_CTX_CACHE: OnceLock<Cache<Uuid, SessionRow>> = OnceLock::new();

fn build_cache() -> Cache<Uuid, SessionRow> {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_idle(Duration::from_secs(5 * 60))
        .build()
}

/// Initialize the session context cache.
/// Should be called once at startup.
pub fn init_session_ctx_cache() {
    SESSION_CTX_CACHE.get_or_init(build_cache);
    info!("Session context cache initialized");
}

/// Get the global session context cache instance.
pub fn get_session_ctx_cache() -> &'static Cache<Uuid, SessionRow> {
    SESSION_CTX_CACHE.get_or_init(build_cache)
}

/// Look up a session, consulting the cache first.
pub async fn get_or_load_session<S: CollabStore + ?Sized>(
    store: &S,
    session_id: Uuid,
) -> Result<Option<SessionRow>, sqlx::Error> {
    let cache = get_session_ctx_cache();

    if let Some(session) = cache.get(&session_id) {
        return Ok(Some(session));
    }

    debug!("Session context cache miss for {}. Loading from store.", session_id);
    let Some(session) = store.get_session(session_id).await? else {
        return Ok(None);
    };

    cache.insert(session_id, session.clone());
    Ok(Some(session))
}

/// Put a freshly created or updated session row into the cache.
pub fn prime_session(session: SessionRow) {
    get_session_ctx_cache().insert(session.id, session);
}

/// Drop a session from the cache after a mutation elsewhere.
pub fn invalidate_session(session_id: Uuid) {
    get_session_ctx_cache().invalidate(&session_id);
}
