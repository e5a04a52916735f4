use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::{Validate, ValidationError};

use crate::api::envelope::{probe_item, probe_list};
use crate::api::ApiClient;
use crate::collection::{FilteredCollection, Page};
use crate::error::{AppError, AppResult};
use crate::notify::ToastQueue;
use crate::schemas::{de_lenient_datetime, validate_input, validation_error};
use crate::views::managers::is_mobile_number;

const VISITS_PATH: &str = "/api/landlord/visits";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum VisitStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl VisitStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Confirmed, Self::Cancelled, Self::Completed];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "propertyId")]
    pub property_id: String,
    #[serde(default, alias = "propertyName")]
    pub property_name: Option<String>,
    #[serde(alias = "visitorName", alias = "name")]
    pub visitor_name: String,
    #[serde(default, alias = "visitorMobile", alias = "mobile")]
    pub visitor_mobile: String,
    #[serde(alias = "scheduledAt", alias = "visitDate", deserialize_with = "de_lenient_datetime")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub status: VisitStatus,
    #[serde(default, alias = "notes")]
    pub note: Option<String>,
    #[serde(default, alias = "cancelReason")]
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Validate)]
#[validate(schema(function = "validate_visit_form"))]
pub struct VisitForm {
    #[validate(length(min = 1, message = "Select a property"))]
    pub property_id: String,
    #[validate(length(min = 2, message = "Visitor name is required"))]
    pub visitor_name: String,
    pub visitor_mobile: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub note: String,
}

fn validate_visit_form(form: &VisitForm) -> Result<(), ValidationError> {
    if !is_mobile_number(&form.visitor_mobile) {
        return Err(validation_error("mobile_invalid", "Mobile number must be 10 digits"));
    }
    if form.scheduled_at.is_none() {
        return Err(validation_error("slot_required", "Pick a visit date and time"));
    }
    Ok(())
}

pub struct VisitBoard {
    api: ApiClient,
    visits: FilteredCollection<Visit>,
    pub status_filter: Option<VisitStatus>,
    pub toasts: ToastQueue,
}

impl VisitBoard {
    pub fn new(api: ApiClient, page_size: usize, toasts: ToastQueue) -> Self {
        Self {
            api,
            visits: FilteredCollection::new(Vec::new(), page_size),
            status_filter: None,
            toasts,
        }
    }

    pub fn visits(&self) -> &[Visit] {
        self.visits.items()
    }

    pub async fn load(&mut self) -> AppResult<()> {
        match self.api.get(VISITS_PATH).await {
            Ok(body) => {
                let mut visits: Vec<Visit> = probe_list(&body, &["data.visits", "visits", "data"]);
                visits.sort_by_key(|visit| visit.scheduled_at);
                self.visits.replace(visits);
                Ok(())
            }
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    /// `None` shows every status.
    pub fn filter(&mut self, status: Option<VisitStatus>) {
        self.status_filter = status;
    }

    pub fn visible(&self, page: usize) -> Page<'_, Visit> {
        let filter = self.status_filter;
        self.visits
            .page(|visit| filter.map_or(true, |status| visit.status == status), page)
    }

    pub fn count(&self, status: VisitStatus) -> usize {
        self.visits
            .items()
            .iter()
            .filter(|visit| visit.status == status)
            .count()
    }

    pub async fn schedule(&mut self, form: VisitForm) -> AppResult<()> {
        self.schedule_at(form, Utc::now()).await
    }

    /// Validates `form` against `now` and books the visit.
    pub async fn schedule_at(&mut self, form: VisitForm, now: DateTime<Utc>) -> AppResult<()> {
        let result = validate_input(&form).and_then(|()| match form.scheduled_at {
            Some(slot) if slot > now => Ok(slot),
            _ => Err(AppError::Validation("Visit time must be in the future".to_string())),
        });
        let slot = match result {
            Ok(slot) => slot,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };

        let payload = json!({
            "propertyId": form.property_id.trim(),
            "visitorName": form.visitor_name.trim(),
            "visitorMobile": form.visitor_mobile.trim(),
            "scheduledAt": slot.to_rfc3339(),
            "note": form.note.trim(),
        });
        let body = match self.api.post_json(VISITS_PATH, payload).await {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };
        self.toasts.success("Visit scheduled");
        match probe_item::<Visit>(&body, &["data.visit", "visit", "data"]) {
            Some(visit) => {
                let items = self.visits.items_mut();
                let position = items.partition_point(|existing| existing.scheduled_at <= visit.scheduled_at);
                items.insert(position, visit);
                Ok(())
            }
            None => self.load().await,
        }
    }

    fn status_of(&self, id: &str) -> AppResult<VisitStatus> {
        self.visits
            .find(|visit| visit.id == id)
            .map(|visit| visit.status)
            .ok_or_else(|| AppError::NotFound("Visit not found".to_string()))
    }

    pub async fn confirm(&mut self, id: &str) -> AppResult<()> {
        if self.status_of(id)? != VisitStatus::Pending {
            let error = AppError::Conflict("Only pending visits can be confirmed".to_string());
            self.toasts.failure(&error);
            return Err(error);
        }
        if let Err(error) = self
            .api
            .put_json(&format!("{VISITS_PATH}/{id}/confirm"), json!({}))
            .await
        {
            self.toasts.failure(&error);
            return Err(error);
        }
        if let Some(visit) = self.visits.find_mut(|visit| visit.id == id) {
            visit.status = VisitStatus::Confirmed;
        }
        self.toasts.success("Visit confirmed");
        Ok(())
    }

    pub async fn cancel(&mut self, id: &str, reason: &str) -> AppResult<()> {
        let reason = reason.trim();
        let status = self.status_of(id)?;
        let check = if reason.is_empty() {
            Err(AppError::Validation("Give a reason for cancelling".to_string()))
        } else if matches!(status, VisitStatus::Cancelled | VisitStatus::Completed) {
            Err(AppError::Conflict("This visit can no longer be cancelled".to_string()))
        } else {
            Ok(())
        };
        if let Err(error) = check {
            self.toasts.failure(&error);
            return Err(error);
        }

        if let Err(error) = self
            .api
            .put_json(&format!("{VISITS_PATH}/{id}/cancel"), json!({ "reason": reason }))
            .await
        {
            self.toasts.failure(&error);
            return Err(error);
        }
        if let Some(visit) = self.visits.find_mut(|visit| visit.id == id) {
            visit.status = VisitStatus::Cancelled;
            visit.cancel_reason = Some(reason.to_string());
        }
        self.toasts.info("Visit cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use http::Method;
    use serde_json::json;

    use super::{VisitBoard, VisitForm, VisitStatus};
    use crate::session::Role;
    use crate::testing::{fake_client, toasts, FakeTransport};

    const VISITS: &str = "/api/landlord/visits";

    async fn board() -> (VisitBoard, Arc<FakeTransport>) {
        let (client, transport, _) = fake_client(Role::Landlord);
        transport.respond(
            Method::GET,
            VISITS,
            200,
            json!({ "data": { "visits": [
                { "_id": "v2", "propertyId": "p1", "visitorName": "Arjun", "visitorMobile": "9000000002",
                  "scheduledAt": "2026-03-02T10:00:00Z", "status": "CONFIRMED" },
                { "_id": "v1", "propertyId": "p1", "visitorName": "Divya", "visitorMobile": "9000000001",
                  "scheduledAt": "2026-03-01T10:00:00Z" },
                { "_id": "v3", "propertyId": "p2", "visitorName": "Farah", "visitorMobile": "9000000003",
                  "scheduledAt": "2026-03-03T18:30:00Z", "status": "COMPLETED" }
            ] } }),
        );
        let mut board = VisitBoard::new(client, 10, toasts());
        board.load().await.expect("load");
        (board, transport)
    }

    fn form(hours_ahead: i64) -> VisitForm {
        VisitForm {
            property_id: "p1".to_string(),
            visitor_name: "Kabir".to_string(),
            visitor_mobile: "9811122233".to_string(),
            scheduled_at: Some(now() + Duration::hours(hours_ahead)),
            note: String::new(),
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 20, 9, 0, 0).single().expect("valid time")
    }

    #[tokio::test]
    async fn loads_sorted_and_filters_by_status() {
        let (mut board, _) = board().await;
        let ids: Vec<_> = board.visits().iter().map(|visit| visit.id.as_str()).collect();
        assert_eq!(ids, ["v1", "v2", "v3"]);

        board.filter(Some(VisitStatus::Pending));
        let page = board.visible(1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "v1");

        board.filter(None);
        assert_eq!(board.visible(1).total_items, 3);
        assert_eq!(board.count(VisitStatus::Completed), 1);
    }

    #[tokio::test]
    async fn date_only_and_epoch_slots_still_load() {
        let (client, transport, _) = fake_client(Role::Landlord);
        transport.respond(
            Method::GET,
            VISITS,
            200,
            json!({ "visits": [
                { "_id": "v1", "visitorName": "Divya", "visitDate": "2026-03-05" },
                { "_id": "v2", "visitorName": "Arjun", "scheduledAt": 1_772_355_600_000_i64 }
            ] }),
        );
        let mut board = VisitBoard::new(client, 10, toasts());
        board.load().await.expect("load");

        let visits = board.visits();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].id, "v2");
        assert_eq!(
            visits[1].scheduled_at,
            Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).single().expect("valid time")
        );
    }

    #[tokio::test]
    async fn schedule_rejects_past_slots_and_bad_mobiles() {
        let (mut board, transport) = board().await;

        assert!(board.schedule_at(form(-1), now()).await.expect_err("past").is_validation());
        let mut bad_mobile = form(24);
        bad_mobile.visitor_mobile = "98111".to_string();
        assert!(board.schedule_at(bad_mobile, now()).await.expect_err("mobile").is_validation());
        assert_eq!(transport.calls(Method::POST, VISITS), 0);

        transport.respond(
            Method::POST,
            VISITS,
            201,
            json!({ "data": { "_id": "v9", "propertyId": "p1", "visitorName": "Kabir", "visitorMobile": "9811122233",
                    "scheduledAt": "2026-03-01T12:00:00Z" } }),
        );
        board.schedule_at(form(24), now()).await.expect("scheduled");
        let body = transport.last_json(Method::POST, VISITS).expect("body");
        assert_eq!(body["visitorName"], "Kabir");
        assert_eq!(body["scheduledAt"], "2026-02-21T09:00:00+00:00");
        let ids: Vec<_> = board.visits().iter().map(|visit| visit.id.as_str()).collect();
        assert_eq!(ids, ["v1", "v9", "v2", "v3"]);
    }

    #[tokio::test]
    async fn confirm_and_cancel_patch_local_status() {
        let (mut board, transport) = board().await;
        transport.respond(Method::PUT, &format!("{VISITS}/v1/confirm"), 200, json!({ "success": true }));
        transport.respond(Method::PUT, &format!("{VISITS}/v2/cancel"), 200, json!({ "success": true }));

        board.confirm("v1").await.expect("confirmed");
        assert_eq!(board.visits()[0].status, VisitStatus::Confirmed);
        assert!(board.confirm("v1").await.is_err());
        assert_eq!(transport.calls(Method::PUT, &format!("{VISITS}/v1/confirm")), 1);

        assert!(board.cancel("v2", "  ").await.expect_err("reason").is_validation());
        board.cancel("v2", "Tenant found").await.expect("cancelled");
        assert_eq!(
            transport.last_json(Method::PUT, &format!("{VISITS}/v2/cancel")),
            Some(json!({ "reason": "Tenant found" }))
        );
        assert_eq!(board.visits()[1].status, VisitStatus::Cancelled);
        assert!(board.cancel("v3", "Late").await.is_err());
    }
}
