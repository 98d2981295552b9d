//! Webinars ("consultations").

use std::sync::Arc;
use std::time::Duration;

use jdp_core::{Webinar, WebinarId, WebinarList};
use serde_json::Value;
use tracing::{debug, instrument};

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::{ApiRequest, RequestSlot};
use crate::source::SharedSource;

define_service_error!(ConsultationError, "consultation");

/// Webinar list endpoint (`/api/fetchWebinarList`).
#[derive(Clone)]
pub struct ConsultationService {
    source: SharedSource,
    slot: Arc<RequestSlot>,
    timeout: Duration,
}

impl std::fmt::Debug for ConsultationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsultationService")
            .field("source", &self.source.label())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ConsultationService {
    #[must_use]
    pub fn new(source: SharedSource, timeout: Duration) -> Self {
        Self {
            source,
            slot: Arc::new(RequestSlot::new("consultations.webinars")),
            timeout,
        }
    }

    /// Webinars with the server's `lastWebinar`/`nextWebinar` pointers.
    /// A newer call supersedes one in flight.
    ///
    /// # Errors
    ///
    /// `Cancelled` when superseded, otherwise the classified failure.
    #[instrument(skip(self))]
    pub async fn fetch_webinars(&self) -> Result<WebinarList, ConsultationError> {
        let body = self
            .slot
            .run(self.timeout, self.source.send(ApiRequest::get("/api/fetchWebinarList")))
            .await?;
        check_rejection(&body)?;

        let payload = wire::unwrap(&body, &["data"]);
        let items: Vec<Webinar> = wire::items(payload, &["webinars", "list", "items"])
            .iter()
            .filter_map(map_webinar)
            .collect();
        let last = wire::count(payload, &["lastWebinar", "last_webinar"]).and_then(|i| usize::try_from(i).ok());
        let next = wire::count(payload, &["nextWebinar", "next_webinar"]).and_then(|i| usize::try_from(i).ok());

        let list = WebinarList::new(items, last, next);
        debug!(
            count = list.items.len(),
            last = ?list.last_webinar,
            next = ?list.next_webinar,
            "Webinar list fetched"
        );
        Ok(list)
    }

    /// Abandon an in-flight fetch.
    pub fn cancel(&self) {
        self.slot.cancel();
    }
}

fn map_webinar(raw: &Value) -> Option<Webinar> {
    let id = wire::string(raw, &["id", "idWebinar"])?;
    Some(Webinar {
        id: WebinarId::new(id.clone()),
        title: wire::string(raw, &["title", "name"]).map_or(id, |t| wire::decode_entities(&t)),
        speaker: wire::string(raw, &["speaker", "host", "intervenant"]),
        description: wire::string(raw, &["description"]).map(|d| wire::decode_entities(&d)),
        scheduled_at: wire::datetime(raw, &["scheduledAt", "date", "startAt", "start_at"]),
        duration_minutes: wire::count_u32(raw, &["durationMinutes", "duration"]),
        replay_url: wire::string(raw, &["replayUrl", "replay", "replay_url"]),
        registration_url: wire::string(raw, &["registrationUrl", "registration", "link"]),
        is_replay_available: wire::flag(raw, &["isReplay", "is_replay", "hasReplay"]).unwrap_or(false),
    })
}
