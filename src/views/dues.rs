use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::api::envelope::{probe_item, probe_list};
use crate::api::ApiClient;
use crate::error::{AppError, AppResult};
use crate::notify::ToastQueue;
use crate::resolver::{resolve_owner_id, OwnerStrategy};
use crate::schemas::{de_lenient_f64, de_opt_lenient_f64, validate_input, validation_error};
use crate::session::Role;

/// Prefix of the per-role session key mirroring recent assignments.
pub const RECENT_ASSIGNMENTS_KEY: &str = "recentAssignedDues";
const RECENT_ASSIGNMENTS_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DueType {
    #[default]
    Fixed,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DueStatus {
    #[default]
    Active,
    Inactive,
}

impl DueStatus {
    pub fn flipped(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive => Self::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueCategory {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub due_type: DueType,
    #[serde(default, deserialize_with = "de_opt_lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub status: DueStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssignedDueStatus {
    #[default]
    Pending,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedDue {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "categoryId", alias = "dueId", default)]
    pub category_id: String,
    #[serde(alias = "tenantId", default)]
    pub tenant_id: String,
    #[serde(deserialize_with = "de_lenient_f64")]
    pub amount: f64,
    #[serde(alias = "dueDate")]
    pub due_date: String,
    #[serde(default)]
    pub status: AssignedDueStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(alias = "_id", alias = "tenantId")]
    pub id: String,
    #[serde(alias = "fullName", alias = "tenantName")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "mobileNumber", alias = "phone")]
    pub mobile: Option<String>,
    #[serde(default, alias = "roomNumber", alias = "roomName")]
    pub room: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Validate)]
#[validate(schema(function = "validate_category_form"))]
pub struct CategoryForm {
    pub name: String,
    pub due_type: DueType,
    /// Raw text of the amount field.
    pub amount: String,
}

fn validate_category_form(form: &CategoryForm) -> Result<(), ValidationError> {
    if form.name.trim().is_empty() {
        return Err(validation_error("name_required", "Category name is required"));
    }
    if form.due_type == DueType::Fixed {
        match form.amount.trim().parse::<f64>() {
            Ok(amount) if amount > 0.0 && amount.is_finite() => {}
            _ => {
                return Err(validation_error(
                    "amount_positive",
                    "Enter a valid amount greater than 0 for a fixed due",
                ))
            }
        }
    }
    Ok(())
}

impl CategoryForm {
    pub fn from_category(category: &DueCategory) -> Self {
        Self {
            name: category.name.clone(),
            due_type: category.due_type,
            amount: category.amount.map(|amount| amount.to_string()).unwrap_or_default(),
        }
    }

    fn payload(&self, owner_id: Option<&str>) -> Value {
        let mut body = json!({
            "name": self.name.trim(),
            "type": self.due_type,
        });
        if let Ok(amount) = self.amount.trim().parse::<f64>() {
            body["amount"] = json!(amount);
        }
        if let Some(owner) = owner_id {
            body["ownerId"] = json!(owner);
        }
        body
    }
}

#[derive(Debug, Clone, Default, PartialEq, Validate)]
#[validate(schema(function = "validate_assign_form"))]
pub struct AssignDueForm {
    pub tenant_id: String,
    pub category_id: String,
    pub amount: String,
    pub due_date: String,
}

fn validate_assign_form(form: &AssignDueForm) -> Result<(), ValidationError> {
    if form.tenant_id.trim().is_empty() {
        return Err(validation_error("tenant_required", "Select a tenant"));
    }
    if form.category_id.trim().is_empty() {
        return Err(validation_error("category_required", "Select a due category"));
    }
    match form.amount.trim().parse::<f64>() {
        Ok(amount) if amount > 0.0 && amount.is_finite() => {}
        _ => return Err(validation_error("amount_positive", "Amount must be greater than 0")),
    }
    let date = form.due_date.trim();
    if date.is_empty() {
        return Err(validation_error("date_required", "Select a due date"));
    }
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(validation_error("date_invalid", "Due date must be YYYY-MM-DD"));
    }
    Ok(())
}

/// Which dashboard hosts the dues manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuesScope {
    Landlord,
    PropertyManager,
    RegionalManager,
}

const LANDLORD_CHAIN: &[OwnerStrategy] = &[
    OwnerStrategy::Profile {
        path: "/api/landlord/profile",
        keys: &["data._id", "data.id", "landlord._id", "user._id"],
    },
    OwnerStrategy::TokenClaims,
];

const PM_CHAIN: &[OwnerStrategy] = &[
    OwnerStrategy::Endpoint {
        path: "/api/pm/my-landlord",
        keys: &["landlordId", "data.landlordId", "data.landlord._id"],
    },
    OwnerStrategy::Profile {
        path: "/api/pm/profile",
        keys: &["data.landlordId", "data.landlord._id", "data.createdBy"],
    },
    OwnerStrategy::TokenClaims,
];

const RM_CHAIN: &[OwnerStrategy] = &[
    OwnerStrategy::Profile {
        path: "/api/rm/profile",
        keys: &["data.subOwnerId", "data.organizationId", "data._id"],
    },
    OwnerStrategy::TokenClaims,
];

impl DuesScope {
    pub fn role(self) -> Role {
        match self {
            Self::Landlord => Role::Landlord,
            Self::PropertyManager => Role::PropertyManager,
            Self::RegionalManager => Role::RegionalManager,
        }
    }

    pub fn base_path(self) -> &'static str {
        match self {
            Self::Landlord => "/api/landlord/dues",
            Self::PropertyManager => "/api/pm/dues",
            Self::RegionalManager => "/api/rm/dues",
        }
    }

    pub fn tenants_path(self) -> &'static str {
        match self {
            Self::Landlord => "/api/landlord/tenants",
            Self::PropertyManager => "/api/pm/tenants",
            Self::RegionalManager => "/api/rm/tenants",
        }
    }

    pub fn recent_assignments_key(self) -> String {
        format!("{RECENT_ASSIGNMENTS_KEY}:{}", self.role().as_str())
    }

    pub fn owner_chain(self) -> &'static [OwnerStrategy] {
        match self {
            Self::Landlord => LANDLORD_CHAIN,
            Self::PropertyManager => PM_CHAIN,
            Self::RegionalManager => RM_CHAIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CategoryModal {
    Create(CategoryForm),
    Edit { id: String, form: CategoryForm },
}

impl CategoryModal {
    pub fn form_mut(&mut self) -> &mut CategoryForm {
        match self {
            Self::Create(form) | Self::Edit { form, .. } => form,
        }
    }
}

pub struct DuesManager {
    api: ApiClient,
    scope: DuesScope,
    pub owner_id: Option<String>,
    pub categories: Vec<DueCategory>,
    pub tenants: Vec<Tenant>,
    pub assigned: Vec<AssignedDue>,
    pub recent_assignments: Vec<AssignedDue>,
    pub modal: Option<CategoryModal>,
    pub pending_delete: Option<String>,
    pub loading: bool,
    pub toasts: ToastQueue,
}

impl DuesManager {
    pub fn new(api: ApiClient, scope: DuesScope, toasts: ToastQueue) -> Self {
        Self {
            api: api.with_role(scope.role()),
            scope,
            owner_id: None,
            categories: Vec::new(),
            tenants: Vec::new(),
            assigned: Vec::new(),
            recent_assignments: Vec::new(),
            modal: None,
            pending_delete: None,
            loading: false,
            toasts,
        }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.scope.base_path())
    }

    /// Resolves the owner, then loads categories and tenants together.
    pub async fn mount(&mut self) -> AppResult<()> {
        self.loading = true;
        self.owner_id = resolve_owner_id(&self.api, self.scope.owner_chain()).await;
        self.recent_assignments = self.load_recent_cache();

        let categories_path = self.path("/categories");
        let (categories, tenants) = tokio::join!(
            self.api.get(&categories_path),
            self.api.get(self.scope.tenants_path())
        );
        self.loading = false;

        let mut first_error = None;
        match categories {
            Ok(body) => self.categories = parse_categories(&body),
            Err(error) => {
                self.toasts.failure(&error);
                first_error = Some(error);
            }
        }
        match tenants {
            Ok(body) => self.tenants = probe_list(&body, &["data.tenants", "tenants", "data"]),
            Err(error) => {
                self.toasts.failure(&error);
                first_error.get_or_insert(error);
            }
        }
        tracing::info!(
            scope = ?self.scope,
            categories = self.categories.len(),
            tenants = self.tenants.len(),
            "Dues manager mounted"
        );
        first_error.map_or(Ok(()), Err)
    }

    pub async fn refresh_categories(&mut self) -> AppResult<()> {
        let body = self.api.get(&self.path("/categories")).await?;
        self.categories = parse_categories(&body);
        Ok(())
    }

    pub fn open_create(&mut self) {
        self.modal = Some(CategoryModal::Create(CategoryForm::default()));
    }

    pub fn open_edit(&mut self, id: &str) -> AppResult<()> {
        let category = self
            .categories
            .iter()
            .find(|category| category.id == id)
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        self.modal = Some(CategoryModal::Edit {
            id: category.id.clone(),
            form: CategoryForm::from_category(category),
        });
        Ok(())
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    /// Creates or updates the category in the open modal.
    pub async fn submit_category(&mut self) -> AppResult<()> {
        let Some(modal) = self.modal.clone() else {
            return Err(AppError::BadRequest("No category form is open".to_string()));
        };
        let form = match &modal {
            CategoryModal::Create(form) | CategoryModal::Edit { form, .. } => form,
        };
        if let Err(error) = validate_input(form) {
            self.toasts.failure(&error);
            return Err(error);
        }

        let payload = form.payload(self.owner_id.as_deref());
        let result = match &modal {
            CategoryModal::Create(_) => self.api.post_json(&self.path("/categories"), payload).await,
            CategoryModal::Edit { id, .. } => {
                self.api
                    .put_json(&self.path(&format!("/categories/{id}")), payload)
                    .await
            }
        };
        if let Err(error) = result {
            self.toasts.failure(&error);
            return Err(error);
        }

        self.modal = None;
        self.toasts.success(match modal {
            CategoryModal::Create(_) => "Due category created",
            CategoryModal::Edit { .. } => "Due category updated",
        });
        if let Err(error) = self.refresh_categories().await {
            self.toasts.failure(&error);
        }
        Ok(())
    }

    /// Flips ACTIVE/INACTIVE, sending only the new status.
    pub async fn toggle_status(&mut self, id: &str) -> AppResult<DueStatus> {
        let current = self
            .categories
            .iter()
            .find(|category| category.id == id)
            .map(|category| category.status)
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        let next = current.flipped();

        match self
            .api
            .put_json(&self.path(&format!("/categories/{id}/status")), json!({ "status": next }))
            .await
        {
            Ok(_) => {
                if let Some(category) = self.categories.iter_mut().find(|category| category.id == id) {
                    category.status = next;
                }
                self.toasts.success(format!("Category marked {}", status_label(next)));
                Ok(next)
            }
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    pub fn request_delete(&mut self, id: &str) {
        self.pending_delete = Some(id.to_string());
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub async fn confirm_delete(&mut self) -> AppResult<()> {
        let Some(id) = self.pending_delete.take() else {
            return Err(AppError::BadRequest("Nothing selected for deletion".to_string()));
        };
        match self.api.delete(&self.path(&format!("/categories/{id}"))).await {
            Ok(_) => {
                self.categories.retain(|category| category.id != id);
                self.toasts.success("Due category deleted");
                Ok(())
            }
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    pub async fn assign_due(&mut self, form: &AssignDueForm) -> AppResult<AssignedDue> {
        if let Err(error) = validate_input(form) {
            self.toasts.failure(&error);
            return Err(error);
        }
        let amount = form.amount.trim().parse::<f64>().unwrap_or_default();
        let payload = json!({
            "tenantId": form.tenant_id.trim(),
            "categoryId": form.category_id.trim(),
            "amount": amount,
            "dueDate": form.due_date.trim(),
            "ownerId": self.owner_id,
        });

        let body = match self.api.post_json(&self.path("/assign"), payload).await {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };

        let assigned = probe_item::<AssignedDue>(&body, &["data.assignment", "data", "assignment"])
            .unwrap_or_else(|| AssignedDue {
                id: uuid::Uuid::new_v4().to_string(),
                category_id: form.category_id.trim().to_string(),
                tenant_id: form.tenant_id.trim().to_string(),
                amount,
                due_date: form.due_date.trim().to_string(),
                status: AssignedDueStatus::Pending,
            });

        self.recent_assignments.insert(0, assigned.clone());
        self.recent_assignments.truncate(RECENT_ASSIGNMENTS_LIMIT);
        self.store_recent_cache();
        self.toasts.success("Due assigned to tenant");
        Ok(assigned)
    }

    pub async fn fetch_assigned(&mut self) -> AppResult<()> {
        match self.api.get(&self.path("/assigned")).await {
            Ok(body) => {
                self.assigned = probe_list(&body, &["data.dues", "dues", "data"]);
                Ok(())
            }
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    pub fn tenant_name(&self, tenant_id: &str) -> Option<&str> {
        self.tenants
            .iter()
            .find(|tenant| tenant.id == tenant_id)
            .map(|tenant| tenant.name.as_str())
    }

    fn load_recent_cache(&self) -> Vec<AssignedDue> {
        self.api
            .session()
            .cached(&self.scope.recent_assignments_key())
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    fn store_recent_cache(&self) {
        let value = match serde_json::to_value(&self.recent_assignments) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(error = %error, "Could not serialize recent assignments");
                return;
            }
        };
        if let Err(error) = self.api.session().set_cached(&self.scope.recent_assignments_key(), value) {
            tracing::warn!(error = %error, "Could not cache recent assignments");
        }
    }
}

fn parse_categories(body: &Value) -> Vec<DueCategory> {
    probe_list(body, &["data.categories", "categories", "data"])
}

fn status_label(status: DueStatus) -> &'static str {
    match status {
        DueStatus::Active => "active",
        DueStatus::Inactive => "inactive",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::Method;
    use serde_json::json;

    use super::{AssignDueForm, AssignedDueStatus, CategoryForm, DueStatus, DueType, DuesManager, DuesScope};
    use crate::api::ApiClient;
    use crate::notify::ToastLevel;
    use crate::session::{MemorySessionStore, Role, SessionStore};
    use crate::testing::{fake_client, toasts, FakeTransport, OWNER_ID};

    const CATEGORIES: &str = "/api/landlord/dues/categories";

    fn manager() -> (DuesManager, Arc<FakeTransport>, Arc<MemorySessionStore>) {
        let (client, transport, session) = fake_client(Role::Landlord);
        (DuesManager::new(client, DuesScope::Landlord, toasts()), transport, session)
    }

    fn seed_categories(transport: &FakeTransport) {
        transport.respond(
            Method::GET,
            CATEGORIES,
            200,
            json!({ "success": true, "data": [
                { "_id": "c1", "name": "Water", "type": "variable", "status": "ACTIVE" },
                { "_id": "c2", "name": "Maintenance", "type": "fixed", "amount": "750", "status": "INACTIVE" }
            ]}),
        );
    }

    #[tokio::test]
    async fn mount_loads_categories_and_tenants() {
        let (mut dues, transport, _) = manager();
        seed_categories(&transport);
        transport.respond(
            Method::GET,
            "/api/landlord/tenants",
            200,
            json!({ "tenants": [{ "_id": "t1", "name": "Asha", "roomNumber": "101" }] }),
        );

        dues.mount().await.expect("mount");
        assert_eq!(dues.owner_id.as_deref(), Some(OWNER_ID));
        assert_eq!(dues.categories.len(), 2);
        assert_eq!(dues.categories[1].amount, Some(750.0));
        assert_eq!(dues.tenant_name("t1"), Some("Asha"));
    }

    #[tokio::test]
    async fn fixed_category_needs_positive_amount() {
        for amount in ["", "0", "-5", "abc"] {
            let (mut dues, transport, _) = manager();
            dues.open_create();
            let form = dues.modal.as_mut().expect("modal").form_mut();
            form.name = "Electricity".to_string();
            form.due_type = DueType::Fixed;
            form.amount = amount.to_string();

            let error = dues.submit_category().await.expect_err("rejected");
            assert!(error.is_validation(), "amount {amount:?}");
            assert!(transport.requests().is_empty());
            assert!(dues.modal.is_some());
        }
    }

    #[tokio::test]
    async fn variable_category_may_omit_amount_but_not_name() {
        let (mut dues, transport, _) = manager();
        dues.open_create();
        dues.modal.as_mut().expect("modal").form_mut().due_type = DueType::Variable;
        assert!(dues.submit_category().await.expect_err("blank name").is_validation());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn creating_fixed_category_posts_and_refetches() {
        let (mut dues, transport, _) = manager();
        transport.respond(Method::POST, CATEGORIES, 201, json!({ "success": true }));
        transport.respond(
            Method::GET,
            CATEGORIES,
            200,
            json!({ "data": { "categories": [
                { "_id": "c9", "name": "Electricity", "type": "fixed", "amount": 500 }
            ]}}),
        );

        dues.open_create();
        *dues.modal.as_mut().expect("modal").form_mut() = CategoryForm {
            name: "Electricity".to_string(),
            due_type: DueType::Fixed,
            amount: "500".to_string(),
        };
        dues.submit_category().await.expect("created");

        let body = transport.last_json(Method::POST, CATEGORIES).expect("post body");
        assert_eq!(body["name"], "Electricity");
        assert_eq!(body["type"], "fixed");
        assert_eq!(body["amount"], 500.0);
        assert!(dues.modal.is_none());
        assert_eq!(dues.categories.len(), 1);
        assert_eq!(dues.categories[0].amount, Some(500.0));
        assert_eq!(dues.categories[0].status, DueStatus::Active);
    }

    #[tokio::test]
    async fn failed_submit_keeps_modal_open() {
        let (mut dues, transport, _) = manager();
        transport.respond(
            Method::POST,
            CATEGORIES,
            409,
            json!({ "success": false, "message": "Category already exists" }),
        );
        dues.open_create();
        let form = dues.modal.as_mut().expect("modal").form_mut();
        form.name = "Water".to_string();
        form.due_type = DueType::Variable;

        dues.submit_category().await.expect_err("conflict");
        assert!(dues.modal.is_some());
        let toast = dues.toasts.last().expect("toast");
        assert_eq!(toast.level, ToastLevel::Error);
        assert_eq!(toast.message, "Category already exists");
    }

    #[tokio::test]
    async fn toggle_sends_opposite_status_and_patches_list() {
        let (mut dues, transport, _) = manager();
        seed_categories(&transport);
        dues.refresh_categories().await.expect("categories");
        let path = "/api/landlord/dues/categories/c2/status";
        transport.respond(Method::PUT, path, 200, json!({ "success": true }));

        let next = dues.toggle_status("c2").await.expect("toggled");
        assert_eq!(next, DueStatus::Active);
        assert_eq!(
            transport.last_json(Method::PUT, path),
            Some(json!({ "status": "ACTIVE" }))
        );
        assert_eq!(dues.categories[1].status, DueStatus::Active);
        assert_eq!(transport.calls(Method::GET, CATEGORIES), 1);
    }

    #[tokio::test]
    async fn unconfirmed_delete_sends_nothing() {
        let (mut dues, transport, _) = manager();
        seed_categories(&transport);
        dues.refresh_categories().await.expect("categories");

        dues.request_delete("c1");
        dues.cancel_delete();
        assert!(dues.confirm_delete().await.is_err());
        assert_eq!(transport.calls(Method::DELETE, "/api/landlord/dues/categories/c1"), 0);
        assert_eq!(dues.categories.len(), 2);
    }

    #[tokio::test]
    async fn confirmed_delete_removes_entry() {
        let (mut dues, transport, _) = manager();
        seed_categories(&transport);
        dues.refresh_categories().await.expect("categories");
        transport.respond(
            Method::DELETE,
            "/api/landlord/dues/categories/c1",
            200,
            json!({ "success": true }),
        );

        dues.request_delete("c1");
        dues.confirm_delete().await.expect("deleted");
        assert_eq!(dues.categories.len(), 1);
        assert!(dues.pending_delete.is_none());
    }

    #[tokio::test]
    async fn assignment_validates_before_posting() {
        let valid = AssignDueForm {
            tenant_id: "t1".to_string(),
            category_id: "c1".to_string(),
            amount: "300".to_string(),
            due_date: "2026-11-01".to_string(),
        };
        let invalid = [
            AssignDueForm { tenant_id: String::new(), ..valid.clone() },
            AssignDueForm { amount: "0".to_string(), ..valid.clone() },
            AssignDueForm { due_date: " ".to_string(), ..valid.clone() },
            AssignDueForm { due_date: "01/11/2026".to_string(), ..valid.clone() },
        ];
        for form in invalid {
            let (mut dues, transport, _) = manager();
            assert!(dues.assign_due(&form).await.expect_err("invalid").is_validation());
            assert!(transport.requests().is_empty());
        }
    }

    #[tokio::test]
    async fn assignment_is_mirrored_into_session_cache() {
        let (mut dues, transport, session) = manager();
        transport.respond(
            Method::POST,
            "/api/landlord/dues/assign",
            201,
            json!({ "success": true, "data": {
                "_id": "a1", "categoryId": "c1", "tenantId": "t1",
                "amount": 300, "dueDate": "2026-11-01", "status": "PENDING"
            }}),
        );
        let form = AssignDueForm {
            tenant_id: "t1".to_string(),
            category_id: "c1".to_string(),
            amount: "300".to_string(),
            due_date: "2026-11-01".to_string(),
        };

        let assigned = dues.assign_due(&form).await.expect("assigned");
        assert_eq!(assigned.id, "a1");
        assert_eq!(dues.recent_assignments.len(), 1);

        let cached = session
            .cached(&DuesScope::Landlord.recent_assignments_key())
            .expect("cached");
        assert_eq!(cached[0]["id"], "a1");

        let client = ApiClient::new(Arc::new(FakeTransport::default()), session, Role::Landlord);
        let reloaded = DuesManager::new(client, DuesScope::Landlord, toasts());
        assert_eq!(reloaded.load_recent_cache(), dues.recent_assignments);
    }

    #[tokio::test]
    async fn recent_assignments_are_kept_per_role() {
        let (mut dues, transport, session) = manager();
        transport.respond(
            Method::POST,
            "/api/landlord/dues/assign",
            201,
            json!({ "data": { "_id": "a1", "tenantId": "t1", "amount": 300, "dueDate": "2026-11-01" } }),
        );
        let form = AssignDueForm {
            tenant_id: "t1".to_string(),
            category_id: "c1".to_string(),
            amount: "300".to_string(),
            due_date: "2026-11-01".to_string(),
        };
        dues.assign_due(&form).await.expect("assigned");

        session
            .set_token(Role::PropertyManager, &crate::testing::valid_token())
            .expect("pm token");
        let pm_client = ApiClient::new(Arc::new(FakeTransport::default()), session, Role::PropertyManager);
        let pm = DuesManager::new(pm_client, DuesScope::PropertyManager, toasts());
        assert!(pm.load_recent_cache().is_empty());
        assert_ne!(
            DuesScope::Landlord.recent_assignments_key(),
            DuesScope::PropertyManager.recent_assignments_key()
        );
    }

    #[tokio::test]
    async fn property_manager_scope_resolves_owner_from_my_landlord() {
        let (client, transport, _) = fake_client(Role::PropertyManager);
        transport.respond(Method::GET, "/api/pm/my-landlord", 200, json!({ "data": { "landlordId": "l-9" } }));
        transport.respond(
            Method::GET,
            "/api/pm/dues/categories",
            200,
            json!({ "categories": [{ "_id": "c1", "name": "Water", "type": "variable" }] }),
        );
        transport.respond(Method::GET, "/api/pm/tenants", 200, json!({ "data": [] }));
        let mut dues = DuesManager::new(client, DuesScope::PropertyManager, toasts());

        dues.mount().await.expect("mount");
        assert_eq!(dues.owner_id.as_deref(), Some("l-9"));
        assert_eq!(dues.categories.len(), 1);
        assert_eq!(transport.calls(Method::GET, "/api/pm/profile"), 0);
        assert_eq!(transport.calls(Method::GET, CATEGORIES), 0);
    }

    #[tokio::test]
    async fn regional_manager_scope_falls_back_through_its_chain() {
        let (client, transport, _) = fake_client(Role::RegionalManager);
        transport.respond(Method::GET, "/api/rm/profile", 200, json!({ "data": { "subOwnerId": "so-3" } }));
        transport.respond(Method::GET, "/api/rm/dues/categories", 200, json!({ "data": [] }));
        transport.respond(Method::GET, "/api/rm/tenants", 200, json!({ "data": [] }));
        let mut dues = DuesManager::new(client, DuesScope::RegionalManager, toasts());

        dues.mount().await.expect("mount");
        assert_eq!(dues.owner_id.as_deref(), Some("so-3"));
        assert_eq!(transport.calls(Method::GET, "/api/rm/dues/categories"), 1);

        let (client, transport, _) = fake_client(Role::RegionalManager);
        transport.respond(Method::GET, "/api/rm/profile", 500, json!({ "message": "down" }));
        transport.respond(Method::GET, "/api/rm/dues/categories", 200, json!({ "data": [] }));
        transport.respond(Method::GET, "/api/rm/tenants", 200, json!({ "data": [] }));
        let mut dues = DuesManager::new(client, DuesScope::RegionalManager, toasts());
        dues.mount().await.expect("mount");
        assert_eq!(dues.owner_id.as_deref(), Some(OWNER_ID));
    }

    #[tokio::test]
    async fn mount_keeps_categories_when_tenants_fail() {
        let (mut dues, transport, _) = manager();
        seed_categories(&transport);
        transport.respond(
            Method::GET,
            "/api/landlord/tenants",
            500,
            json!({ "success": false, "message": "Tenant service unavailable" }),
        );

        let error = dues.mount().await.expect_err("tenants failed");
        assert_eq!(error.user_message(), "Tenant service unavailable");
        assert_eq!(dues.categories.len(), 2);
        assert!(dues.tenants.is_empty());
        assert!(!dues.loading);
        assert_eq!(dues.toasts.last().map(|toast| toast.level), Some(ToastLevel::Error));
    }

    #[tokio::test]
    async fn fetches_assignment_history() {
        let (mut dues, transport, _) = manager();
        transport.respond(
            Method::GET,
            "/api/landlord/dues/assigned",
            200,
            json!({ "data": { "dues": [
                { "_id": "a1", "tenantId": "t1", "categoryId": "c1", "amount": "450", "dueDate": "2026-10-01", "status": "PAID" },
                { "_id": "a2", "tenantId": "t2", "categoryId": "c1", "amount": 450, "dueDate": "2026-11-01" }
            ] } }),
        );

        dues.fetch_assigned().await.expect("history");
        assert_eq!(dues.assigned.len(), 2);
        assert_eq!(dues.assigned[0].amount, 450.0);
        assert_eq!(dues.assigned[0].status, AssignedDueStatus::Paid);
        assert_eq!(dues.assigned[1].status, AssignedDueStatus::Pending);
    }
}
