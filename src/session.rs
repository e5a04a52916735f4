use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Dashboard actor. Each one keeps its bearer token under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Landlord,
    Organization,
    Tenant,
    Seller,
    PropertyManager,
    RegionalManager,
    SubOwner,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Landlord,
        Role::Organization,
        Role::Tenant,
        Role::Seller,
        Role::PropertyManager,
        Role::RegionalManager,
        Role::SubOwner,
    ];

    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Landlord => "token",
            Self::Organization => "orgToken",
            Self::Tenant => "tenanttoken",
            Self::Seller => "sellertoken",
            Self::PropertyManager => "pmToken",
            Self::RegionalManager => "rmToken",
            Self::SubOwner => "subOwnerToken",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landlord => "landlord",
            Self::Organization => "organization",
            Self::Tenant => "tenant",
            Self::Seller => "seller",
            Self::PropertyManager => "property_manager",
            Self::RegionalManager => "regional_manager",
            Self::SubOwner => "sub_owner",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "landlord" => Some(Self::Landlord),
            "organization" | "org" => Some(Self::Organization),
            "tenant" => Some(Self::Tenant),
            "seller" => Some(Self::Seller),
            "property_manager" | "pm" => Some(Self::PropertyManager),
            "regional_manager" | "rm" => Some(Self::RegionalManager),
            "sub_owner" | "subowner" => Some(Self::SubOwner),
            _ => None,
        }
    }
}

/// Typed access to the client's persistent key/value storage.
pub trait SessionStore: Send + Sync {
    fn token(&self, role: Role) -> Option<String>;
    fn set_token(&self, role: Role, token: &str) -> AppResult<()>;
    fn clear_token(&self, role: Role) -> AppResult<()>;
    fn cached(&self, key: &str) -> Option<Value>;
    fn set_cached(&self, key: &str, value: Value) -> AppResult<()>;
    fn remove_cached(&self, key: &str) -> AppResult<()>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SessionData {
    #[serde(default)]
    tokens: BTreeMap<String, String>,
    #[serde(default)]
    cache: BTreeMap<String, Value>,
}

impl SessionData {
    fn token(&self, role: Role) -> Option<String> {
        self.tokens
            .get(role.storage_key())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

fn poisoned() -> AppError {
    AppError::Internal("Session storage lock poisoned.".to_string())
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    data: RwLock<SessionData>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(role: Role, token: &str) -> Self {
        let store = Self::default();
        if let Ok(mut data) = store.data.write() {
            data.tokens
                .insert(role.storage_key().to_string(), token.to_string());
        }
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn token(&self, role: Role) -> Option<String> {
        self.data.read().ok()?.token(role)
    }

    fn set_token(&self, role: Role, token: &str) -> AppResult<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.tokens
            .insert(role.storage_key().to_string(), token.trim().to_string());
        Ok(())
    }

    fn clear_token(&self, role: Role) -> AppResult<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.tokens.remove(role.storage_key());
        Ok(())
    }

    fn cached(&self, key: &str) -> Option<Value> {
        self.data.read().ok()?.cache.get(key).cloned()
    }

    fn set_cached(&self, key: &str, value: Value) -> AppResult<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.cache.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_cached(&self, key: &str) -> AppResult<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.cache.remove(key);
        Ok(())
    }
}

/// Session store persisted as a JSON document; every write flushes the file.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    data: RwLock<SessionData>,
}

impl FileSessionStore {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => SessionData::default(),
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(path = %path.display(), error = %error, "Discarding unreadable session file");
                SessionData::default()
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => SessionData::default(),
            Err(error) => return Err(error.into()),
        };
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(&self, apply: impl FnOnce(&mut SessionData)) -> AppResult<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        apply(&mut data);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&*data)?)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn token(&self, role: Role) -> Option<String> {
        self.data.read().ok()?.token(role)
    }

    fn set_token(&self, role: Role, token: &str) -> AppResult<()> {
        let token = token.trim().to_string();
        self.mutate(|data| {
            data.tokens.insert(role.storage_key().to_string(), token);
        })
    }

    fn clear_token(&self, role: Role) -> AppResult<()> {
        self.mutate(|data| {
            data.tokens.remove(role.storage_key());
        })
    }

    fn cached(&self, key: &str) -> Option<Value> {
        self.data.read().ok()?.cache.get(key).cloned()
    }

    fn set_cached(&self, key: &str, value: Value) -> AppResult<()> {
        self.mutate(|data| {
            data.cache.insert(key.to_string(), value);
        })
    }

    fn remove_cached(&self, key: &str) -> AppResult<()> {
        self.mutate(|data| {
            data.cache.remove(key);
        })
    }
}
