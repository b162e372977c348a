// Event-history endpoints
//
// Server-side paginated cursors over the audit/event log. A cursor is
// opened against a filter, drained page by page, and must be released
// explicitly -- there is no implicit server-side cleanup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::model::EntityRef;

/// Filter for an event-history query.
///
/// The scope is always one entity; `recursive` extends it to the whole
/// subtree below that entity. The time window bounds event creation
/// time, and `type_ids`, when present, restricts the result to the
/// given event-type identifiers.
#[derive(Debug, Clone, Serialize)]
pub struct EventFilter {
    pub entity: EntityRef,
    pub recursive: bool,
    pub created_after: DateTime<Utc>,
    pub created_before: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_ids: Option<Vec<String>>,
}

/// One event as it appears on the wire.
///
/// `id` is server-assigned and monotonically increasing across the
/// whole deployment; it is the canonical ordering key.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: i64,
    pub created: DateTime<Utc>,
    /// Category/severity label. May be absent for malformed or
    /// vendor-extension events; consumers skip those records.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub message: String,
    /// String form of the entity the event was recorded against.
    #[serde(default)]
    pub entity: String,
}

#[derive(Deserialize)]
struct CursorCreated {
    cursor: String,
}

#[derive(Serialize)]
struct NextPageRequest {
    max: usize,
}

#[derive(Deserialize)]
struct EventPage {
    #[serde(default)]
    events: Vec<RawEvent>,
}

/// A server-side paginated handle over one event query.
///
/// Pages come back in server order for the cursor's entity. Call
/// [`release`](Self::release) once exhausted (or on error) -- the
/// server holds resources for the cursor until told otherwise.
#[derive(Debug)]
pub struct EventCursor {
    client: ApiClient,
    id: String,
    page_size: usize,
}

impl EventCursor {
    /// The server-assigned cursor identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pull the next page, containing at most `page_size` events.
    ///
    /// An empty page means the cursor is exhausted.
    pub async fn next_page(&mut self) -> Result<Vec<RawEvent>, Error> {
        let url = self
            .client
            .api_url(&format!("events/cursors/{}/next", self.id));
        let page: EventPage = self
            .client
            .post(
                url,
                &NextPageRequest {
                    max: self.page_size,
                },
            )
            .await?;
        debug!(cursor = %self.id, count = page.events.len(), "pulled event page");
        Ok(page.events)
    }

    /// Release the cursor's server-side resources.
    ///
    /// `DELETE /api/events/cursors/{id}`
    pub async fn release(self) -> Result<(), Error> {
        let url = self.client.api_url(&format!("events/cursors/{}", self.id));
        debug!(cursor = %self.id, "releasing event cursor");
        self.client.delete(url).await
    }
}

impl ApiClient {
    /// Open a paginated cursor against an event filter.
    ///
    /// `POST /api/events/cursors`. A 404 means the filter's entity has
    /// vanished since discovery; callers skip the stale ref.
    pub async fn create_event_cursor(
        &self,
        filter: &EventFilter,
        page_size: usize,
    ) -> Result<EventCursor, Error> {
        let url = self.api_url("events/cursors");
        debug!(entity = %filter.entity, "opening event cursor");
        let created: CursorCreated = self.post(url, filter).await?;
        Ok(EventCursor {
            client: self.clone(),
            id: created.cursor,
            page_size,
        })
    }
}
