use crate::api::envelope::probe_str;
use crate::api::ApiClient;

/// One way of finding the id of the account that owns the current dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerStrategy {
    /// Dedicated id endpoint, e.g. `/api/pm/my-landlord`.
    Endpoint {
        path: &'static str,
        keys: &'static [&'static str],
    },
    /// Profile endpoint whose payload embeds the owner id.
    Profile {
        path: &'static str,
        keys: &'static [&'static str],
    },
    /// The id carried by the session token itself.
    TokenClaims,
}

impl OwnerStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Endpoint { .. } => "endpoint",
            Self::Profile { .. } => "profile",
            Self::TokenClaims => "token",
        }
    }

    async fn resolve(&self, api: &ApiClient) -> Option<String> {
        match self {
            Self::Endpoint { path, keys } | Self::Profile { path, keys } => match api.get(path).await {
                Ok(body) => probe_str(&body, keys),
                Err(error) => {
                    tracing::debug!(strategy = self.name(), path, error = %error, "Owner lookup failed");
                    None
                }
            },
            Self::TokenClaims => match api.claims() {
                Ok(claims) => claims.subject_id(),
                Err(error) => {
                    tracing::debug!(error = %error, "Owner lookup from token failed");
                    None
                }
            },
        }
    }
}

/// Tries each strategy in order and stops at the first id found.
pub async fn resolve_owner_id(api: &ApiClient, strategies: &[OwnerStrategy]) -> Option<String> {
    for strategy in strategies {
        if let Some(id) = strategy.resolve(api).await {
            tracing::debug!(strategy = strategy.name(), owner_id = %id, "Resolved owner id");
            return Some(id);
        }
    }
    tracing::warn!(role = api.role().as_str(), "Could not resolve owner id");
    None
}
