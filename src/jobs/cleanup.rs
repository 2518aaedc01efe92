//! Background job: delete expired API token rows.
//!
//! Verification already rejects expired tokens and purges them lazily; this
//! sweep bounds the table for tokens that are never presented again.

use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::tokens::TokenService;

/// Spawn the background cleanup task. Call this once at startup.
pub fn spawn(tokens: TokenService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = purge_expired_tokens(&tokens).await {
                tracing::error!("cleanup job failed: {}", e);
            }
        }
    })
}

/// One sweep. Returns the number of rows removed.
pub async fn purge_expired_tokens(tokens: &TokenService) -> anyhow::Result<u64> {
    let removed = tokens.purge_expired(Utc::now()).await?;

    if removed > 0 {
        tracing::info!(rows = removed, "purged expired api tokens");
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::NewAuthToken;
    use crate::store::memory::MemoryStore;
    use crate::store::TokenStore;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (id, offset) in [("a", -5), ("b", -1), ("c", 60)] {
            store
                .create(&NewAuthToken {
                    id: id.into(),
                    user_id: "u1".into(),
                    expires_at: now + ChronoDuration::minutes(offset),
                })
                .await
                .unwrap();
        }

        let svc = TokenService::new(Arc::new(store.clone()));
        assert_eq!(purge_expired_tokens(&svc).await.unwrap(), 2);
        assert_eq!(purge_expired_tokens(&svc).await.unwrap(), 0);
        assert_eq!(store.token_count(), 1);
    }

    #[tokio::test]
    async fn test_spawned_job_runs_on_first_tick() {
        let store = MemoryStore::new();
        store
            .create(&NewAuthToken {
                id: "old".into(),
                user_id: "u1".into(),
                expires_at: Utc::now() - ChronoDuration::hours(1),
            })
            .await
            .unwrap();

        let handle = spawn(TokenService::new(Arc::new(store.clone())), Duration::from_secs(3600));
        // first tick fires immediately
        for _ in 0..100 {
            if store.token_count() == 0 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.token_count(), 0);
        handle.abort();
    }
}
