// libs/scheduling-cell/src/services/calendar.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, info};

use crate::models::Slot;
use crate::ports::CalendarSync;

/// REST bridge to the external calendar mirror. Events are keyed by slot
/// id, so a re-push of the same slot updates the existing event.
pub struct RestCalendarSync {
    client: Client,
    base_url: String,
}

impl RestCalendarSync {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CalendarSync for RestCalendarSync {
    async fn push(&self, slot: &Slot) -> Result<()> {
        let Some(client_id) = slot.client_id else {
            debug!("No client for slot {}, skipping calendar sync", slot.id);
            return Ok(());
        };

        info!(
            "Syncing slot {} to external calendar for client {}",
            slot.id, client_id
        );

        let body = json!({
            "client_id": client_id,
            "practitioner_id": slot.practitioner_id,
            "start": slot.time,
            "duration_minutes": slot.duration_minutes,
            "comment": slot.comment,
        });

        let url = format!("{}/events/{}", self.base_url, slot.id);
        let response = self.client.put(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Calendar API error ({}): {}", status, text));
        }
        Ok(())
    }

    async fn remove(&self, slot: &Slot) -> Result<()> {
        info!("Removing slot {} from external calendar", slot.id);

        let url = format!("{}/events/{}", self.base_url, slot.id);
        let response = self.client.delete(&url).send().await?;

        let status = response.status();
        // No event for this slot means nothing to remove.
        if status == StatusCode::NOT_FOUND {
            debug!("No calendar event found for slot {}", slot.id);
            return Ok(());
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Calendar API error ({}): {}", status, text));
        }
        Ok(())
    }
}

/// Sync target for deployments without a configured calendar mirror.
pub struct NullCalendarSync;

#[async_trait]
impl CalendarSync for NullCalendarSync {
    async fn push(&self, slot: &Slot) -> Result<()> {
        debug!("Calendar sync disabled, dropping push for slot {}", slot.id);
        Ok(())
    }

    async fn remove(&self, slot: &Slot) -> Result<()> {
        debug!(
            "Calendar sync disabled, dropping removal for slot {}",
            slot.id
        );
        Ok(())
    }
}
