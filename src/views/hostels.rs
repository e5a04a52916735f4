use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::api::envelope::probe_list;
use crate::api::ApiClient;
use crate::collection::{matches_text, FilteredCollection, Page};
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::notify::ToastQueue;
use crate::schemas::{de_lenient_u32, de_opt_lenient_f64};

const HOSTELS_PATH: &str = "/api/public/hostels";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostelGender {
    #[serde(alias = "male")]
    Boys,
    #[serde(alias = "female")]
    Girls,
    #[serde(alias = "unisex", alias = "co-living", alias = "coliving")]
    Both,
}

impl HostelGender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boys => "boys",
            Self::Girls => "girls",
            Self::Both => "both",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "boys" | "male" => Some(Self::Boys),
            "girls" | "female" => Some(Self::Girls),
            "both" | "unisex" | "co-living" | "coliving" => Some(Self::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostelListing {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "hostelName", alias = "propertyName")]
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default, alias = "area")]
    pub locality: Option<String>,
    #[serde(default, deserialize_with = "de_gender")]
    pub gender: Option<HostelGender>,
    #[serde(default, alias = "minPrice", alias = "startingPrice", deserialize_with = "de_opt_lenient_f64")]
    pub min_price: Option<f64>,
    #[serde(default, alias = "maxPrice", deserialize_with = "de_opt_lenient_f64")]
    pub max_price: Option<f64>,
    #[serde(default, alias = "availableBeds", deserialize_with = "de_lenient_u32")]
    pub available_beds: u32,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Case-insensitive; unknown labels read as no preference.
fn de_gender<'de, D>(deserializer: D) -> Result<Option<HostelGender>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(HostelGender::parse))
}

impl HostelListing {
    /// Whether the listing's price band touches `[min, max]`.
    fn overlaps(&self, min: Option<f64>, max: Option<f64>) -> bool {
        let low = self.min_price.or(self.max_price);
        let high = self.max_price.or(self.min_price);
        match (low, high) {
            (Some(low), Some(high)) => {
                min.map_or(true, |min| high >= min) && max.map_or(true, |max| low <= max)
            }
            _ => min.is_none() && max.is_none(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostelQuery {
    pub city: Option<String>,
    pub gender: Option<HostelGender>,
}

impl HostelQuery {
    fn city(&self) -> Option<String> {
        self.city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .map(str::to_lowercase)
    }

    fn cache_key(&self) -> String {
        format!(
            "{}|{}",
            self.city().unwrap_or_default(),
            self.gender.map(HostelGender::as_str).unwrap_or_default()
        )
    }
}

/// Client-side refinements applied over the fetched listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostelFilter {
    pub text: String,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub only_available: bool,
}

pub struct HostelBrowser {
    api: ApiClient,
    timeout: Duration,
    cache: Cache<String, Arc<Vec<HostelListing>>>,
    listings: FilteredCollection<HostelListing>,
    pub filter: HostelFilter,
    pub toasts: ToastQueue,
}

impl HostelBrowser {
    pub fn new(api: &ApiClient, config: &ClientConfig, toasts: ToastQueue) -> Self {
        Self {
            api: api.public(),
            timeout: config.short_timeout(),
            cache: Cache::builder()
                .max_capacity(config.listings_cache_max_entries)
                .time_to_live(config.listings_cache_ttl())
                .build(),
            listings: FilteredCollection::new(Vec::new(), config.list_page_size),
            filter: HostelFilter::default(),
            toasts,
        }
    }

    pub fn listings(&self) -> &[HostelListing] {
        self.listings.items()
    }

    /// Loads listings for `query`, reusing a cached result while it is fresh.
    pub async fn search(&mut self, query: &HostelQuery) -> AppResult<usize> {
        let key = query.cache_key();
        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(key = %key, "Hostel listings served from cache");
            self.listings.replace(cached.as_ref().clone());
            return Ok(self.listings.len());
        }

        let mut params = Vec::new();
        if let Some(city) = query.city() {
            params.push(("city", city));
        }
        if let Some(gender) = query.gender {
            params.push(("gender", gender.as_str().to_string()));
        }
        let body = match self.api.get_with(HOSTELS_PATH, &params, Some(self.timeout)).await {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };
        let listings: Vec<HostelListing> = probe_list(&body, &["data.hostels", "hostels", "data"]);
        self.cache.insert(key, Arc::new(listings.clone())).await;
        self.listings.replace(listings);
        Ok(self.listings.len())
    }

    /// Drops every cached query so the next search hits the API.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }

    pub fn set_price_range(&mut self, min: Option<f64>, max: Option<f64>) -> AppResult<()> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(AppError::Validation(
                    "Minimum price cannot exceed maximum price".to_string(),
                ));
            }
        }
        self.filter.min_price = min;
        self.filter.max_price = max;
        Ok(())
    }

    pub fn visible(&self, page: usize) -> Page<'_, HostelListing> {
        let filter = &self.filter;
        self.listings.page(
            |listing| {
                (!filter.only_available || listing.available_beds > 0)
                    && listing.overlaps(filter.min_price, filter.max_price)
                    && matches_text(
                        [listing.name.as_str(), listing.city.as_str(), listing.locality.as_deref().unwrap_or("")],
                        &filter.text,
                    )
            },
            page,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::Method;
    use serde_json::json;

    use super::{HostelBrowser, HostelGender, HostelQuery};
    use crate::config::ClientConfig;
    use crate::session::Role;
    use crate::testing::{fake_client, toasts};

    const HOSTELS: &str = "/api/public/hostels";

    fn config() -> ClientConfig {
        ClientConfig {
            list_page_size: 2,
            ..ClientConfig::default()
        }
    }

    fn listings() -> serde_json::Value {
        json!({ "success": true, "data": [
            { "_id": "h1", "name": "Shanti Boys Hostel", "city": "Indore", "locality": "Bhawarkua",
              "gender": "boys", "minPrice": "4500", "maxPrice": 6500, "availableBeds": 3 },
            { "_id": "h2", "name": "Lotus Girls PG", "city": "Indore", "locality": "Vijay Nagar",
              "gender": "female", "minPrice": 7000, "maxPrice": 9000, "availableBeds": 0 },
            { "_id": "h3", "name": "Campus Stay", "city": "Indore", "gender": "unisex", "startingPrice": 3000 }
        ] })
    }

    #[tokio::test]
    async fn caches_by_normalized_query_without_bearer() {
        let (client, transport, _) = fake_client(Role::Tenant);
        transport.respond(Method::GET, HOSTELS, 200, listings());
        let mut browser = HostelBrowser::new(&client, &config(), toasts());

        let query = HostelQuery {
            city: Some(" Indore ".to_string()),
            gender: Some(HostelGender::Boys),
        };
        assert_eq!(browser.search(&query).await.expect("first"), 3);
        let same = HostelQuery {
            city: Some("indore".to_string()),
            gender: Some(HostelGender::Boys),
        };
        browser.search(&same).await.expect("cached");
        assert_eq!(transport.calls(Method::GET, HOSTELS), 1);

        let request = transport.last(Method::GET, HOSTELS).expect("request");
        assert_eq!(request.bearer, None);
        assert_eq!(request.timeout, Some(Duration::from_millis(5000)));
        assert_eq!(
            request.query,
            vec![("city".to_string(), "indore".to_string()), ("gender".to_string(), "boys".to_string())]
        );

        browser.search(&HostelQuery::default()).await.expect("other key");
        browser.invalidate();
        browser.search(&same).await.expect("refetched");
        assert_eq!(transport.calls(Method::GET, HOSTELS), 3);
    }

    #[tokio::test]
    async fn tolerates_loose_field_formats() {
        let (client, transport, _) = fake_client(Role::Tenant);
        transport.respond(
            Method::GET,
            HOSTELS,
            200,
            json!({ "data": [
                { "_id": "h1", "name": "Shanti", "city": "Indore", "gender": "boys" },
                { "_id": "h2", "name": "Lotus", "city": "Indore", "gender": "Girls " },
                { "_id": "h3", "name": "Campus", "city": "Indore", "gender": "Other", "availableBeds": "3" }
            ] }),
        );
        let mut browser = HostelBrowser::new(&client, &config(), toasts());
        assert_eq!(browser.search(&HostelQuery::default()).await.expect("search"), 3);

        let listings = browser.listings();
        assert_eq!(listings[0].gender, Some(HostelGender::Boys));
        assert_eq!(listings[1].gender, Some(HostelGender::Girls));
        assert_eq!(listings[2].gender, None);
        assert_eq!(listings[2].available_beds, 3);
    }

    #[tokio::test]
    async fn filters_by_price_text_and_availability() {
        let (client, transport, _) = fake_client(Role::Tenant);
        transport.respond(Method::GET, HOSTELS, 200, listings());
        let mut browser = HostelBrowser::new(&client, &config(), toasts());
        browser.search(&HostelQuery::default()).await.expect("search");
        assert_eq!(browser.listings()[1].gender, Some(HostelGender::Girls));

        let page = browser.visible(1);
        assert_eq!(page.total_pages, 2);

        browser.set_price_range(Some(5000.0), Some(8000.0)).expect("range");
        let ids: Vec<_> = browser.visible(1).items.iter().map(|listing| listing.id.clone()).collect();
        assert_eq!(ids, ["h1", "h2"]);

        browser.filter.only_available = true;
        assert_eq!(browser.visible(1).total_items, 1);

        browser.set_price_range(None, None).expect("clear");
        browser.filter.only_available = false;
        browser.filter.text = "vijay".to_string();
        assert_eq!(browser.visible(1).items[0].id, "h2");

        assert!(browser.set_price_range(Some(9000.0), Some(100.0)).is_err());
    }
}
