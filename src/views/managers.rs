use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::api::envelope::{probe_item, probe_list};
use crate::api::ApiClient;
use crate::collection::{matches_text, FilteredCollection, Page};
use crate::error::{AppError, AppResult};
use crate::notify::ToastQueue;
use crate::schemas::{validate_input, validation_error};
use crate::session::Role;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manager {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "fullName")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "phone", alias = "mobileNumber")]
    pub mobile: String,
    #[serde(default, alias = "assignedRegion")]
    pub region: Option<String>,
    #[serde(default = "default_active", alias = "isActive")]
    pub is_active: bool,
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
    #[serde(default, alias = "assignedProperties", deserialize_with = "de_property_ids")]
    pub assigned_properties: Vec<String>,
}

fn default_active() -> bool {
    true
}

/// Assigned properties arrive either as ids or as populated objects.
fn de_property_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .iter()
        .filter_map(|value| match value {
            Value::Object(map) => map.get("_id").or_else(|| map.get("id")).and_then(crate::auth::id_string),
            other => crate::auth::id_string(other),
        })
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Validate)]
#[validate(schema(function = "validate_manager_form"))]
pub struct ManagerForm {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
    pub mobile: String,
    pub region: String,
    /// Blank keeps the current password when editing.
    pub password: String,
    pub permissions: BTreeMap<String, bool>,
    pub assigned_properties: Vec<String>,
}

pub(crate) fn is_mobile_number(raw: &str) -> bool {
    let digits = raw.trim();
    digits.len() == 10 && digits.bytes().all(|byte| byte.is_ascii_digit())
}

fn validate_manager_form(form: &ManagerForm) -> Result<(), ValidationError> {
    if !is_mobile_number(&form.mobile) {
        return Err(validation_error("mobile_invalid", "Mobile number must be 10 digits"));
    }
    if !form.password.is_empty() && form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(validation_error(
            "password_short",
            "Password must be at least 6 characters",
        ));
    }
    Ok(())
}

impl ManagerForm {
    pub fn from_manager(manager: &Manager) -> Self {
        Self {
            name: manager.name.clone(),
            email: manager.email.clone(),
            mobile: manager.mobile.clone(),
            region: manager.region.clone().unwrap_or_default(),
            password: String::new(),
            permissions: manager.permissions.clone(),
            assigned_properties: manager.assigned_properties.clone(),
        }
    }

    fn profile_payload(&self) -> Value {
        json!({
            "name": self.name.trim(),
            "email": self.email.trim(),
            "mobile": self.mobile.trim(),
            "region": self.region.trim(),
            "permissions": self.permissions,
            "assignedProperties": self.assigned_properties,
        })
    }

    fn apply_to(&self, manager: &mut Manager) {
        manager.name = self.name.trim().to_string();
        manager.email = self.email.trim().to_string();
        manager.mobile = self.mobile.trim().to_string();
        manager.region = Some(self.region.trim().to_string()).filter(|region| !region.is_empty());
        manager.permissions = self.permissions.clone();
        manager.assigned_properties = self.assigned_properties.clone();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerScope {
    /// Regional managers of an organization.
    Regional,
    /// Property managers of a landlord.
    Property,
}

impl ManagerScope {
    pub fn role(self) -> Role {
        match self {
            Self::Regional => Role::Organization,
            Self::Property => Role::Landlord,
        }
    }

    pub fn base_path(self) -> &'static str {
        match self {
            Self::Regional => "/api/organization/regional-managers",
            Self::Property => "/api/landlord/property-managers",
        }
    }

    fn list_keys(self) -> &'static [&'static str] {
        match self {
            Self::Regional => &["data.regionalManagers", "regionalManagers", "data.managers", "data"],
            Self::Property => &["data.propertyManagers", "propertyManagers", "data.managers", "data"],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManagerEdit {
    pub id: String,
    pub form: ManagerForm,
}

pub struct ManagerDirectory {
    api: ApiClient,
    scope: ManagerScope,
    managers: FilteredCollection<Manager>,
    pub search: String,
    pub region: String,
    pub editing: Option<ManagerEdit>,
    pub pending_delete: Option<String>,
    pub loading: bool,
    pub toasts: ToastQueue,
}

impl ManagerDirectory {
    pub fn new(api: ApiClient, scope: ManagerScope, page_size: usize, toasts: ToastQueue) -> Self {
        Self {
            api: api.with_role(scope.role()),
            scope,
            managers: FilteredCollection::new(Vec::new(), page_size),
            search: String::new(),
            region: String::new(),
            editing: None,
            pending_delete: None,
            loading: false,
            toasts,
        }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.scope.base_path())
    }

    pub fn managers(&self) -> &[Manager] {
        self.managers.items()
    }

    fn find(&self, id: &str) -> AppResult<&Manager> {
        self.managers
            .find(|manager| manager.id == id)
            .ok_or_else(|| AppError::NotFound("Manager not found".to_string()))
    }

    pub async fn load(&mut self) -> AppResult<()> {
        let search = self.search.trim().to_string();
        let region = self.region.trim().to_string();
        self.loading = true;
        let result = if !search.is_empty() && !region.is_empty() {
            self.api
                .get_with(&self.path("/search"), &[("q", search), ("region", region)], None)
                .await
        } else {
            self.api.get(self.scope.base_path()).await
        };
        self.loading = false;

        match result {
            Ok(body) => {
                self.managers.replace(probe_list(&body, self.scope.list_keys()));
                tracing::debug!(scope = ?self.scope, count = self.managers.len(), "Loaded managers");
                Ok(())
            }
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    pub fn set_search(&mut self, text: &str) {
        self.search = text.to_string();
    }

    pub fn set_region(&mut self, region: &str) {
        self.region = region.to_string();
    }

    /// Distinct regions, for the region dropdown.
    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self
            .managers
            .items()
            .iter()
            .filter_map(|manager| manager.region.clone())
            .filter(|region| !region.trim().is_empty())
            .collect();
        regions.sort();
        regions.dedup();
        regions
    }

    pub fn visible(&self, page: usize) -> Page<'_, Manager> {
        let search = self.search.trim();
        let region = self.region.trim();
        self.managers.page(
            |manager| {
                let region_ok = region.is_empty()
                    || manager
                        .region
                        .as_deref()
                        .is_some_and(|value| value.trim().eq_ignore_ascii_case(region));
                region_ok
                    && matches_text(
                        [manager.name.as_str(), manager.email.as_str(), manager.mobile.as_str()],
                        search,
                    )
            },
            page,
        )
    }

    /// Loads the full record and seeds the edit form from it.
    pub async fn open_edit(&mut self, id: &str) -> AppResult<&ManagerEdit> {
        let body = match self.api.get(&self.path(&format!("/{id}"))).await {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };
        let detail: Option<Manager> = probe_item(
            &body,
            &["data.regionalManager", "data.propertyManager", "data.manager", "manager", "data"],
        );
        let form = match detail {
            Some(manager) => ManagerForm::from_manager(&manager),
            None => ManagerForm::from_manager(self.find(id)?),
        };
        let edit = self.editing.insert(ManagerEdit {
            id: id.to_string(),
            form,
        });
        Ok(&*edit)
    }

    pub fn close_edit(&mut self) {
        self.editing = None;
    }

    pub async fn submit_edit(&mut self) -> AppResult<()> {
        let Some(edit) = self.editing.clone() else {
            return Err(AppError::BadRequest("No manager is being edited".to_string()));
        };
        if let Err(error) = validate_input(&edit.form) {
            self.toasts.failure(&error);
            return Err(error);
        }

        if let Err(error) = self
            .api
            .put_json(&self.path(&format!("/{}", edit.id)), edit.form.profile_payload())
            .await
        {
            self.toasts.failure(&error);
            return Err(error);
        }
        if let Some(manager) = self.managers.find_mut(|manager| manager.id == edit.id) {
            edit.form.apply_to(manager);
        }

        if !edit.form.password.is_empty() {
            if let Err(error) = self
                .api
                .put_json(
                    &self.path(&format!("/{}/password", edit.id)),
                    json!({ "password": edit.form.password }),
                )
                .await
            {
                tracing::warn!(error = %error, manager = %edit.id, "Profile saved but password change failed");
                self.toasts
                    .warning(format!("Profile updated, password not changed: {}", error.user_message()));
                self.editing = None;
                return Err(error);
            }
        }

        self.editing = None;
        self.toasts.success("Manager updated");
        Ok(())
    }

    pub async fn create(&mut self, form: ManagerForm) -> AppResult<()> {
        let result = validate_input(&form).and_then(|()| {
            if form.password.is_empty() {
                Err(AppError::Validation("Password is required".to_string()))
            } else {
                Ok(())
            }
        });
        if let Err(error) = result {
            self.toasts.failure(&error);
            return Err(error);
        }

        let mut payload = form.profile_payload();
        payload["password"] = json!(form.password);
        let body = match self.api.post_json(self.scope.base_path(), payload).await {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };
        let created: Option<Manager> = probe_item(
            &body,
            &["data.regionalManager", "data.propertyManager", "data.manager", "manager", "data"],
        );
        self.toasts.success("Manager created");
        match created {
            Some(manager) => {
                self.managers.items_mut().insert(0, manager);
                Ok(())
            }
            None => self.load().await,
        }
    }

    pub fn request_delete(&mut self, id: &str) -> AppResult<()> {
        self.find(id)?;
        self.pending_delete = Some(id.to_string());
        Ok(())
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub async fn confirm_delete(&mut self) -> AppResult<()> {
        let Some(id) = self.pending_delete.take() else {
            return Err(AppError::BadRequest("No manager selected for deletion".to_string()));
        };
        if let Err(error) = self.api.delete(&self.path(&format!("/{id}"))).await {
            self.toasts.failure(&error);
            return Err(error);
        }
        self.managers.remove_where(|manager| manager.id == id);
        self.toasts.success("Manager deleted");
        Ok(())
    }

    pub async fn toggle_active(&mut self, id: &str) -> AppResult<bool> {
        let next = !self.find(id)?.is_active;
        if let Err(error) = self
            .api
            .put_json(&self.path(&format!("/{id}")), json!({ "isActive": next }))
            .await
        {
            self.toasts.failure(&error);
            return Err(error);
        }
        if let Some(manager) = self.managers.find_mut(|manager| manager.id == id) {
            manager.is_active = next;
        }
        self.toasts
            .success(if next { "Manager activated" } else { "Manager deactivated" });
        Ok(next)
    }
}
