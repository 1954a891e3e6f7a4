use crate::config::app_context::AppContext;
use crate::config::constants::{OUTBOX_CLAIM_BATCH, OUTBOX_LEASE_SECONDS, OUTBOX_POLL_INTERVAL};
use crate::storage::persistent;
use crate::types::outbox::OutboxNotification;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Delivers `{type, payload}` to the user-facing transport. The transport
/// (Telegram, webhook, ...) is the sink's concern, not the core's.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(
        &self,
        user_id: i32,
        notification_type: &str,
        payload: &serde_json::Value,
    ) -> Result<()>;
}

/// POSTs notifications to the external sink endpoint.
pub struct HttpSink {
    http: reqwest::Client,
    sink_url: String,
}

impl HttpSink {
    pub fn new(http: reqwest::Client, sink_url: String) -> Self {
        Self { http, sink_url }
    }
}

#[async_trait]
impl NotificationSink for HttpSink {
    async fn deliver(
        &self,
        user_id: i32,
        notification_type: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let response = self
            .http
            .post(&self.sink_url)
            .json(&json!({
                "user_id": user_id,
                "type": notification_type,
                "payload": payload,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("sink returned {}", response.status());
        }
        Ok(())
    }
}

/// Lease-based delivery worker. Claims rows under a SKIP-LOCKED lease,
/// delivers them, and hands failures back with a decremented attempt
/// budget. Rows stranded by a dead worker are re-claimed once the lease
/// expires.
pub struct OutboxWorker {
    context: AppContext,
    sink: Arc<dyn NotificationSink>,
    worker_id: String,
}

impl OutboxWorker {
    pub fn new(context: &AppContext, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            context: context.clone(),
            sink,
            worker_id: format!("outbox-{}", context.instance_id),
        }
    }

    pub async fn run(self) {
        let mut shutdown = self.context.shutdown_signal();
        let mut ticker = tokio::time::interval(OUTBOX_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(worker = %self.worker_id, "outbox worker stopping, in-flight leases will expire");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_batch().await {
                        warn!(error = %e, "outbox batch failed");
                    }
                }
            }
        }
    }

    async fn drain_batch(&self) -> Result<()> {
        let claimed = persistent::claim_notifications(
            &self.context.db_pool,
            &self.worker_id,
            OUTBOX_CLAIM_BATCH,
            OUTBOX_LEASE_SECONDS,
        )
        .await?;
        if claimed.is_empty() {
            return Ok(());
        }
        debug!(count = claimed.len(), "claimed notifications");
        for notification in claimed {
            self.deliver_one(notification).await;
        }
        Ok(())
    }

    async fn deliver_one(&self, notification: OutboxNotification) {
        let result = self
            .sink
            .deliver(
                notification.user_id,
                &notification.notification_type,
                &notification.payload,
            )
            .await;

        // tolerate our own lease having expired mid-delivery: log, still
        // record the outcome, and move on
        if let Some(expiry) = notification.sending_expires_at {
            if expiry < Utc::now() {
                warn!(id = notification.id, "own lease expired during delivery");
            }
        }

        match result {
            Ok(()) => {
                if let Err(e) =
                    persistent::mark_notification_delivered(&self.context.db_pool, notification.id)
                        .await
                {
                    warn!(id = notification.id, error = %e, "failed to mark delivered");
                }
            }
            Err(delivery_error) => {
                warn!(id = notification.id, error = %delivery_error, "notification delivery failed");
                if let Err(e) = persistent::mark_notification_failed(
                    &self.context.db_pool,
                    notification.id,
                    &delivery_error.to_string(),
                )
                .await
                {
                    warn!(id = notification.id, error = %e, "failed to record delivery failure");
                }
            }
        }
    }
}
