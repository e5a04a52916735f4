use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.gharzoreality.com";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub app_name: String,
    pub environment: String,
    pub api_base_url: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
    pub short_timeout_ms: u64,
    pub session_path: PathBuf,
    pub toast_success_ms: u64,
    pub toast_error_ms: u64,
    pub reels_page_size: u32,
    pub list_page_size: usize,
    pub playback_threshold: f64,
    pub listings_cache_ttl_seconds: u64,
    pub listings_cache_max_entries: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_name: "Gharzo Console".to_string(),
            environment: "development".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: default_user_agent(),
            request_timeout_ms: 30_000,
            short_timeout_ms: 5_000,
            session_path: PathBuf::from(".gharzo/session.json"),
            toast_success_ms: 3_000,
            toast_error_ms: 5_000,
            reels_page_size: 10,
            list_page_size: 10,
            playback_threshold: 0.85,
            listings_cache_ttl_seconds: 30,
            listings_cache_max_entries: 200,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            app_name: env_or("GHARZO_APP_NAME", &defaults.app_name),
            environment: env_or("GHARZO_ENVIRONMENT", &defaults.environment),
            api_base_url: normalize_base_url(&env_or(
                "GHARZO_API_BASE_URL",
                DEFAULT_API_BASE_URL,
            )),
            user_agent: env_or("GHARZO_USER_AGENT", &defaults.user_agent),
            request_timeout_ms: env_parse_or("GHARZO_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            short_timeout_ms: env_parse_or("GHARZO_SHORT_TIMEOUT_MS", defaults.short_timeout_ms),
            session_path: env_opt("GHARZO_SESSION_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_path),
            toast_success_ms: env_parse_or("GHARZO_TOAST_SUCCESS_MS", defaults.toast_success_ms),
            toast_error_ms: env_parse_or("GHARZO_TOAST_ERROR_MS", defaults.toast_error_ms),
            reels_page_size: env_parse_or("GHARZO_REELS_PAGE_SIZE", defaults.reels_page_size)
                .max(1),
            list_page_size: env_parse_or("GHARZO_LIST_PAGE_SIZE", defaults.list_page_size).max(1),
            playback_threshold: clamp_ratio(env_parse_or(
                "GHARZO_PLAYBACK_THRESHOLD",
                defaults.playback_threshold,
            )),
            listings_cache_ttl_seconds: env_parse_or(
                "GHARZO_LISTINGS_CACHE_TTL_SECONDS",
                defaults.listings_cache_ttl_seconds,
            ),
            listings_cache_max_entries: env_parse_or(
                "GHARZO_LISTINGS_CACHE_MAX_ENTRIES",
                defaults.listings_cache_max_entries,
            ),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn short_timeout(&self) -> Duration {
        Duration::from_millis(self.short_timeout_ms)
    }

    pub fn toast_success_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_success_ms)
    }

    pub fn toast_error_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_error_ms)
    }

    pub fn listings_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.listings_cache_ttl_seconds)
    }
}

fn default_user_agent() -> String {
    format!("gharzo-client/{}", env!("CARGO_PKG_VERSION"))
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn clamp_ratio(value: f64) -> f64 {
    if value.is_nan() {
        return 0.85;
    }
    value.clamp(0.0, 1.0)
}

pub fn normalize_base_url(raw: &str) -> String {
    let mut base = raw.trim().to_string();
    if base.is_empty() {
        return DEFAULT_API_BASE_URL.to_string();
    }
    if !base.starts_with("http://") && !base.starts_with("https://") {
        base.insert_str(0, "https://");
    }
    while base.ends_with('/') {
        base.pop();
    }
    base
}
