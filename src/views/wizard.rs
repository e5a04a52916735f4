//! Six-step seller listing wizard.
//!
//! Each `next()` saves the active step with exactly one request against the
//! draft the server issued on step 1. Saved steps stay saved when the seller
//! goes back or abandons the flow.

use serde::Serialize;
use http::Method;
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::api::envelope::probe_str;
use crate::api::{ApiClient, ApiRequest, FormPart, UploadFile};
use crate::error::{AppError, AppResult};
use crate::notify::ToastQueue;
use crate::schemas::{validate_input, validation_error};
use crate::views::managers::is_mobile_number;

const DRAFT_PATH: &str = "/api/seller/properties/draft";
const PROPERTIES_PATH: &str = "/api/seller/properties";
pub const SUBMITTED_REDIRECT: &str = "/seller/properties";
pub const MAX_PHOTOS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    TypeSelect = 1,
    BasicDetails = 2,
    Features = 3,
    Location = 4,
    Photos = 5,
    ContactInfo = 6,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::TypeSelect => "Property Type",
            Self::BasicDetails => "Basic Details",
            Self::Features => "Features",
            Self::Location => "Location",
            Self::Photos => "Photos",
            Self::ContactInfo => "Contact Info",
        }
    }

    fn following(self) -> Option<Self> {
        match self {
            Self::TypeSelect => Some(Self::BasicDetails),
            Self::BasicDetails => Some(Self::Features),
            Self::Features => Some(Self::Location),
            Self::Location => Some(Self::Photos),
            Self::Photos => Some(Self::ContactInfo),
            Self::ContactInfo => None,
        }
    }

    fn preceding(self) -> Option<Self> {
        match self {
            Self::TypeSelect => None,
            Self::BasicDetails => Some(Self::TypeSelect),
            Self::Features => Some(Self::BasicDetails),
            Self::Location => Some(Self::Features),
            Self::Photos => Some(Self::Location),
            Self::ContactInfo => Some(Self::Photos),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingPurpose {
    #[default]
    Sale,
    Rent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TypeForm {
    pub listing_type: ListingPurpose,
    #[validate(length(min = 1, message = "Select a property type"))]
    pub property_type: String,
    #[validate(length(min = 1, message = "Select a category"))]
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BasicDetailsForm {
    #[validate(length(min = 5, max = 120, message = "Title must be 5 to 120 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: String,
    #[validate(range(min = 1.0, message = "Enter a price greater than 0"))]
    pub price: f64,
    #[validate(range(min = 1.0, message = "Enter the carpet area"))]
    pub area_sqft: f64,
    pub bedrooms: u32,
    pub bathrooms: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_features"))]
pub struct FeaturesForm {
    pub furnishing: String,
    pub amenities: Vec<String>,
    pub parking: bool,
    pub floor: u32,
    pub total_floors: u32,
}

fn validate_features(form: &FeaturesForm) -> Result<(), ValidationError> {
    if form.furnishing.trim().is_empty() {
        return Err(validation_error("furnishing_required", "Select the furnishing status"));
    }
    if form.total_floors > 0 && form.floor > form.total_floors {
        return Err(validation_error("floor_range", "Floor cannot exceed total floors"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_location"))]
pub struct LocationForm {
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    pub locality: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    pub pincode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

fn validate_location(form: &LocationForm) -> Result<(), ValidationError> {
    let pincode = form.pincode.trim();
    if pincode.len() != 6 || !pincode.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(validation_error("pincode_invalid", "Pincode must be 6 digits"));
    }
    if form.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat))
        || form.longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng))
    {
        return Err(validation_error("coordinates_invalid", "Coordinates are out of range"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_contact"))]
pub struct ContactForm {
    #[validate(length(min = 1, message = "Contact name is required"))]
    pub name: String,
    pub mobile: String,
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
    pub preferred_time: String,
}

fn validate_contact(form: &ContactForm) -> Result<(), ValidationError> {
    if !is_mobile_number(&form.mobile) {
        return Err(validation_error("mobile_invalid", "Mobile number must be 10 digits"));
    }
    Ok(())
}

pub struct ListingWizard {
    api: ApiClient,
    step: WizardStep,
    property_id: Option<String>,
    pub kind: TypeForm,
    pub basic: BasicDetailsForm,
    pub features: FeaturesForm,
    pub location: LocationForm,
    pub photos: Vec<UploadFile>,
    pub contact: ContactForm,
    /// Inline error for the active step.
    pub error: Option<String>,
    pub redirect: Option<String>,
    pub toasts: ToastQueue,
}

impl ListingWizard {
    pub fn new(api: ApiClient, toasts: ToastQueue) -> Self {
        Self {
            api,
            step: WizardStep::TypeSelect,
            property_id: None,
            kind: TypeForm::default(),
            basic: BasicDetailsForm::default(),
            features: FeaturesForm::default(),
            location: LocationForm::default(),
            photos: Vec::new(),
            contact: ContactForm::default(),
            error: None,
            redirect: None,
            toasts,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn property_id(&self) -> Option<&str> {
        self.property_id.as_deref()
    }

    pub fn is_submitted(&self) -> bool {
        self.redirect.is_some()
    }

    /// Returns to the previous step without touching the server.
    pub fn back(&mut self) -> WizardStep {
        if let Some(previous) = self.step.preceding() {
            self.step = previous;
        }
        self.error = None;
        self.step
    }

    /// Saves the active step and advances when the server accepts it.
    pub async fn next(&mut self) -> AppResult<WizardStep> {
        if self.is_submitted() {
            return Err(AppError::Conflict("Listing already submitted".to_string()));
        }
        if let Err(error) = self.validate_step() {
            self.error = Some(error.user_message());
            return Err(error);
        }

        if let Err(error) = self.save_step().await {
            tracing::warn!(error = %error, step = self.step.number(), "Listing step not saved");
            self.error = Some(error.user_message());
            return Err(error);
        }

        self.error = None;
        match self.step.following() {
            Some(following) => self.step = following,
            None => {
                self.redirect = Some(SUBMITTED_REDIRECT.to_string());
                self.toasts.success("Property submitted for review");
            }
        }
        Ok(self.step)
    }

    fn validate_step(&self) -> AppResult<()> {
        match self.step {
            WizardStep::TypeSelect => validate_input(&self.kind),
            WizardStep::BasicDetails => validate_input(&self.basic),
            WizardStep::Features => validate_input(&self.features),
            WizardStep::Location => validate_input(&self.location),
            WizardStep::Photos => validate_photos(&self.photos),
            WizardStep::ContactInfo => validate_input(&self.contact),
        }
    }

    fn draft_id(&self) -> AppResult<&str> {
        self.property_id
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Start the listing from the first step".to_string()))
    }

    fn step_path(&self, section: &str) -> AppResult<String> {
        Ok(format!("{PROPERTIES_PATH}/{}/{section}", self.draft_id()?))
    }

    async fn save_step(&mut self) -> AppResult<()> {
        match self.step {
            WizardStep::TypeSelect => {
                let body = self.confirm_json(Method::POST, DRAFT_PATH, to_payload(&self.kind)?).await?;
                let id = probe_str(
                    &body,
                    &["data.propertyId", "data._id", "data.id", "propertyId", "data.property._id", "_id"],
                )
                .ok_or_else(|| AppError::Dependency("Draft created without a property id".to_string()))?;
                tracing::info!(property_id = %id, "Listing draft created");
                self.property_id = Some(id);
            }
            WizardStep::BasicDetails => {
                let path = self.step_path("basic")?;
                self.confirm_json(Method::PUT, &path, to_payload(&self.basic)?).await?;
            }
            WizardStep::Features => {
                let path = self.step_path("features")?;
                self.confirm_json(Method::PUT, &path, to_payload(&self.features)?).await?;
            }
            WizardStep::Location => {
                let path = self.step_path("location")?;
                self.confirm_json(Method::PUT, &path, to_payload(&self.location)?).await?;
            }
            WizardStep::Photos => {
                if self.photos.is_empty() {
                    return Ok(());
                }
                let path = self.step_path("photos")?;
                let parts = self
                    .photos
                    .iter()
                    .cloned()
                    .map(|photo| FormPart::file("photos", photo))
                    .collect();
                self.api
                    .send_confirmed(ApiRequest::new(Method::POST, &path).multipart(parts))
                    .await?;
            }
            WizardStep::ContactInfo => {
                let path = self.step_path("contact")?;
                self.confirm_json(Method::PUT, &path, to_payload(&self.contact)?).await?;
                let submit = self.step_path("submit")?;
                self.confirm_json(Method::POST, &submit, json!({})).await?;
            }
        }
        Ok(())
    }

    /// Steps only advance on an explicit `success: true`.
    async fn confirm_json(&self, method: Method, path: &str, body: Value) -> AppResult<Value> {
        self.api
            .send_confirmed(ApiRequest::new(method, path).json(body))
            .await
    }
}

fn validate_photos(photos: &[UploadFile]) -> AppResult<()> {
    if photos.len() > MAX_PHOTOS {
        return Err(AppError::Validation(format!("Upload at most {MAX_PHOTOS} photos")));
    }
    if let Some(photo) = photos.iter().find(|photo| !photo.content_type.starts_with("image/")) {
        return Err(AppError::Validation(format!("{} is not an image", photo.file_name)));
    }
    Ok(())
}

fn to_payload<T: Serialize>(form: &T) -> AppResult<Value> {
    Ok(serde_json::to_value(form)?)
}
