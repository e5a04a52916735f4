use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::envelope::{probe_array, probe_str};
use crate::api::{ApiClient, FormPart, UploadFile};
use crate::auth::id_string;
use crate::error::{AppError, AppResult};
use crate::facilities::FacilitySelection;
use crate::notify::ToastQueue;
use crate::schemas::{de_lenient_f64, de_lenient_u32};

const PROPERTIES_PATH: &str = "/api/landlord/properties";
pub const LAST_PROPERTY_KEY: &str = "lastPropertyId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RoomStatus {
    #[default]
    Available,
    Occupied,
    Maintenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(alias = "_id", alias = "propertyId")]
    pub id: String,
    #[serde(alias = "propertyName", alias = "title")]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, alias = "totalRooms", deserialize_with = "de_lenient_u32")]
    pub total_rooms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    #[serde(alias = "_id", alias = "bedId")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub price: f64,
    #[serde(default)]
    pub status: RoomStatus,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    #[serde(alias = "_id", alias = "roomId")]
    pub id: String,
    pub name: String,
    #[serde(default, alias = "type", alias = "roomType")]
    pub room_type: String,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "de_lenient_u32")]
    pub capacity: u32,
    #[serde(default)]
    pub status: RoomStatus,
    #[serde(default)]
    pub facilities: Value,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub beds: Vec<Bed>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BedDraft {
    /// Set once the server has created the bed.
    pub bed_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub status: RoomStatus,
    pub images: Vec<UploadFile>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomDraft {
    /// Set once the server has created the room. Created drafts are never
    /// posted again; only their remaining images are.
    pub room_id: Option<String>,
    pub name: String,
    pub room_type: String,
    pub price: f64,
    pub capacity: u32,
    pub status: RoomStatus,
    pub facilities: FacilitySelection,
    pub images: Vec<UploadFile>,
    pub beds: Vec<BedDraft>,
}

impl RoomDraft {
    fn validate(&self, index: usize) -> AppResult<()> {
        let label = if self.name.trim().is_empty() {
            format!("Room {}", index + 1)
        } else {
            self.name.trim().to_string()
        };
        if self.name.trim().is_empty() {
            return Err(AppError::Validation(format!("{label}: room name is required")));
        }
        if !(self.price > 0.0) {
            return Err(AppError::Validation(format!("{label}: price must be greater than 0")));
        }
        if self.capacity == 0 {
            return Err(AppError::Validation(format!("{label}: capacity must be at least 1")));
        }
        if let Some(position) = self.beds.iter().position(|bed| bed.name.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "{label}: bed {} needs a name",
                position + 1
            )));
        }
        if self.beds.iter().any(|bed| bed.price < 0.0) {
            return Err(AppError::Validation(format!("{label}: bed price cannot be negative")));
        }
        Ok(())
    }

    fn payload(&self) -> Value {
        json!({
            "name": self.name.trim(),
            "type": self.room_type.trim(),
            "price": self.price,
            "capacity": self.capacity,
            "status": self.status,
            "facilities": self.facilities.to_payload(),
            "beds": self.beds.iter().map(|bed| json!({
                "name": bed.name.trim(),
                "price": bed.price,
                "status": bed.status,
            })).collect::<Vec<_>>(),
        })
    }
}

/// Image upload that failed after its room or bed was already created.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFailure {
    pub room_id: String,
    pub bed_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryReport {
    pub room_ids: Vec<String>,
    pub bed_ids: Vec<Vec<String>>,
    pub images_uploaded: usize,
    pub image_failures: Vec<ImageFailure>,
}

pub struct InventoryEditor {
    api: ApiClient,
    fetch_timeout: Duration,
    pub property: Option<Property>,
    pub drafts: Vec<RoomDraft>,
    pub submitting: bool,
    pub toasts: ToastQueue,
}

impl InventoryEditor {
    pub fn new(api: ApiClient, fetch_timeout: Duration, toasts: ToastQueue) -> Self {
        Self {
            api,
            fetch_timeout,
            property: None,
            drafts: vec![RoomDraft::default()],
            submitting: false,
            toasts,
        }
    }

    /// Finds the property in the owner's list; there is no get-by-id endpoint.
    pub async fn load_property(&mut self, property_id: &str) -> AppResult<&Property> {
        let body = match self
            .api
            .get_with(PROPERTIES_PATH, &[], Some(self.fetch_timeout))
            .await
        {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };
        let found = probe_array(&body, &["data.properties", "properties", "data"])
            .into_iter()
            .find(|item| {
                ["_id", "id", "propertyId"]
                    .iter()
                    .filter_map(|key| item.get(*key).and_then(id_string))
                    .any(|id| id == property_id)
            })
            .and_then(|item| serde_json::from_value::<Property>(item).ok());

        let Some(property) = found else {
            let error = AppError::NotFound("Property not found".to_string());
            self.toasts.failure(&error);
            return Err(error);
        };
        if let Err(error) = self
            .api
            .session()
            .set_cached(LAST_PROPERTY_KEY, json!(property.id))
        {
            tracing::warn!(error = %error, "Could not cache property id");
        }
        let property = self.property.insert(property);
        Ok(&*property)
    }

    pub fn add_room(&mut self) -> usize {
        self.drafts.push(RoomDraft::default());
        self.drafts.len() - 1
    }

    pub fn remove_room(&mut self, index: usize) {
        if index < self.drafts.len() {
            self.drafts.remove(index);
        }
    }

    pub fn add_bed(&mut self, room: usize) -> AppResult<usize> {
        let draft = self.draft_mut(room)?;
        draft.beds.push(BedDraft {
            price: draft.price,
            ..BedDraft::default()
        });
        Ok(draft.beds.len() - 1)
    }

    pub fn remove_bed(&mut self, room: usize, bed: usize) -> AppResult<()> {
        let draft = self.draft_mut(room)?;
        if bed < draft.beds.len() {
            draft.beds.remove(bed);
        }
        Ok(())
    }

    pub fn toggle_facility(&mut self, room: usize, group_label: &str, item_label: &str) -> AppResult<bool> {
        self.draft_mut(room)?.facilities.toggle(group_label, item_label)
    }

    fn draft_mut(&mut self, room: usize) -> AppResult<&mut RoomDraft> {
        self.drafts
            .get_mut(room)
            .ok_or_else(|| AppError::NotFound(format!("Room {} does not exist", room + 1)))
    }

    /// Creates every drafted room with its beds in one call, then uploads
    /// images per room and per bed. Upload failures leave the created rooms
    /// in place; submitting again only retries the images still pending.
    pub async fn submit(&mut self) -> AppResult<InventoryReport> {
        let Some(property_id) = self.property.as_ref().map(|property| property.id.clone()) else {
            let error = AppError::BadRequest("Select a property first".to_string());
            self.toasts.failure(&error);
            return Err(error);
        };
        if self.drafts.is_empty() {
            let error = AppError::Validation("Add at least one room".to_string());
            self.toasts.failure(&error);
            return Err(error);
        }
        let pending: Vec<usize> = self
            .drafts
            .iter()
            .enumerate()
            .filter(|(_, draft)| draft.room_id.is_none())
            .map(|(index, _)| index)
            .collect();
        for &index in &pending {
            if let Err(error) = self.drafts[index].validate(index) {
                self.toasts.failure(&error);
                return Err(error);
            }
        }

        self.submitting = true;
        let rooms_path = format!("{PROPERTIES_PATH}/{property_id}/rooms");
        let mut report = InventoryReport::default();
        if !pending.is_empty() {
            let payload = Value::Array(pending.iter().map(|&index| self.drafts[index].payload()).collect());
            let body = match self.api.post_json(&rooms_path, json!({ "rooms": payload })).await {
                Ok(body) => body,
                Err(error) => {
                    self.submitting = false;
                    self.toasts.failure(&error);
                    return Err(error);
                }
            };
            let created = probe_array(&body, &["data.rooms", "rooms", "data"]);
            for (position, &index) in pending.iter().enumerate() {
                let draft = &mut self.drafts[index];
                let room_id = match_created_room(&created, position, &draft.name)
                    .and_then(|room| probe_str(room, &["_id", "id", "roomId"]).map(|id| (room, id)));
                let Some((room, room_id)) = room_id else {
                    tracing::warn!(room = %draft.name, "Created room missing from response");
                    continue;
                };
                let bed_ids: Vec<String> = room
                    .get("beds")
                    .and_then(Value::as_array)
                    .map(|beds| {
                        beds.iter()
                            .filter_map(|bed| probe_str(bed, &["_id", "id", "bedId"]))
                            .collect()
                    })
                    .unwrap_or_default();
                for (bed, bed_id) in draft.beds.iter_mut().zip(&bed_ids) {
                    bed.bed_id = Some(bed_id.clone());
                }
                draft.room_id = Some(room_id.clone());
                report.room_ids.push(room_id);
                report.bed_ids.push(bed_ids);
            }
        }

        self.upload_pending_images(&rooms_path, &mut report).await;
        self.submitting = false;

        if report.image_failures.is_empty() {
            let saved = self.drafts.iter().filter(|draft| draft.room_id.is_some()).count();
            self.toasts.success(format!("{saved} room(s) added"));
            self.drafts = vec![RoomDraft::default()];
        } else {
            tracing::warn!(
                property_id = %property_id,
                failures = report.image_failures.len(),
                "Rooms created but some images failed to upload"
            );
            self.toasts.warning(format!(
                "Rooms saved, but {} image upload(s) failed",
                report.image_failures.len()
            ));
        }
        Ok(report)
    }

    /// Uploads images of created rooms and beds. Uploaded images are dropped
    /// from their draft.
    async fn upload_pending_images(&mut self, rooms_path: &str, report: &mut InventoryReport) {
        for index in 0..self.drafts.len() {
            let Some(room_id) = self.drafts[index].room_id.clone() else {
                continue;
            };
            let images = self.drafts[index].images.clone();
            if !images.is_empty() {
                let path = format!("{rooms_path}/{room_id}/images");
                match self.api.post_multipart(&path, image_parts(&images)).await {
                    Ok(_) => {
                        report.images_uploaded += images.len();
                        self.drafts[index].images.clear();
                    }
                    Err(error) => report.image_failures.push(ImageFailure {
                        room_id: room_id.clone(),
                        bed_id: None,
                        message: error.user_message(),
                    }),
                }
            }

            for bed_index in 0..self.drafts[index].beds.len() {
                let bed = &self.drafts[index].beds[bed_index];
                if bed.images.is_empty() {
                    continue;
                }
                let Some(bed_id) = bed.bed_id.clone() else {
                    tracing::warn!(room_id = %room_id, bed = %bed.name, "Created bed missing from response");
                    continue;
                };
                let images = bed.images.clone();
                let path = format!("{rooms_path}/{room_id}/beds/{bed_id}/images");
                match self.api.post_multipart(&path, image_parts(&images)).await {
                    Ok(_) => {
                        report.images_uploaded += images.len();
                        self.drafts[index].beds[bed_index].images.clear();
                    }
                    Err(error) => report.image_failures.push(ImageFailure {
                        room_id: room_id.clone(),
                        bed_id: Some(bed_id),
                        message: error.user_message(),
                    }),
                }
            }
        }
    }

    pub async fn update_room_status(&mut self, room_id: &str, status: RoomStatus) -> AppResult<()> {
        let property_id = self.require_property_id()?;
        let path = format!("{PROPERTIES_PATH}/{property_id}/rooms/{room_id}");
        self.put_status(&path, status).await
    }

    pub async fn update_bed_status(&mut self, room_id: &str, bed_id: &str, status: RoomStatus) -> AppResult<()> {
        let property_id = self.require_property_id()?;
        let path = format!("{PROPERTIES_PATH}/{property_id}/rooms/{room_id}/beds/{bed_id}");
        self.put_status(&path, status).await
    }

    async fn put_status(&mut self, path: &str, status: RoomStatus) -> AppResult<()> {
        match self.api.put_json(path, json!({ "status": status })).await {
            Ok(_) => {
                self.toasts.success("Status updated");
                Ok(())
            }
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    fn require_property_id(&self) -> AppResult<String> {
        self.property
            .as_ref()
            .map(|property| property.id.clone())
            .ok_or_else(|| AppError::BadRequest("Select a property first".to_string()))
    }
}

fn match_created_room<'a>(created: &'a [Value], index: usize, name: &str) -> Option<&'a Value> {
    let name_of = |room: &Value| room.get("name").and_then(Value::as_str).map(str::trim).map(ToOwned::to_owned);
    created
        .get(index)
        .filter(|room| name_of(room).map_or(true, |candidate| candidate == name.trim()))
        .or_else(|| {
            created
                .iter()
                .find(|room| name_of(room).is_some_and(|candidate| candidate == name.trim()))
        })
}

fn image_parts(images: &[UploadFile]) -> Vec<FormPart> {
    images
        .iter()
        .map(|image| FormPart::file("images", image.clone()))
        .collect()
}
