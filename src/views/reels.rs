use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::envelope::{probe_bool, probe_item, probe_list};
use crate::api::{ApiClient, FormPart, UploadFile};
use crate::error::{AppError, AppResult};
use crate::notify::ToastQueue;
use crate::schemas::de_lenient_u32;

const REELS_PATH: &str = "/api/reels";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reel {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "organizationId", alias = "orgId")]
    pub organization_id: Option<String>,
    #[serde(alias = "videoUrl", alias = "video")]
    pub video_url: String,
    #[serde(default, alias = "thumbnailUrl", alias = "thumbnail")]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "likesCount", alias = "likes", deserialize_with = "de_lenient_u32")]
    pub likes_count: u32,
    #[serde(default, alias = "commentsCount", deserialize_with = "de_lenient_u32")]
    pub comments_count: u32,
    #[serde(default, alias = "isLiked")]
    pub is_liked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReelComment {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "comment", alias = "content")]
    pub text: String,
    #[serde(default, alias = "userName", alias = "authorName")]
    pub author: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReelLike {
    #[serde(alias = "_id", alias = "userId")]
    pub user_id: String,
    #[serde(default, alias = "userName", alias = "name")]
    pub user_name: Option<String>,
}

/// Clears the busy flag when dropped, including when the fetch future is
/// abandoned mid-request.
struct BusyGuard<'a>(&'a mut bool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Infinite-scroll reel feed with single-video playback.
pub struct ReelsFeed {
    api: ApiClient,
    limit: u32,
    threshold: f64,
    next_page: u32,
    busy: bool,
    pub has_more: bool,
    pub reels: Vec<Reel>,
    playing: Option<usize>,
    focused: usize,
    pub toasts: ToastQueue,
}

impl ReelsFeed {
    pub fn new(api: ApiClient, limit: u32, threshold: f64, toasts: ToastQueue) -> Self {
        Self {
            api,
            limit: limit.max(1),
            threshold,
            next_page: 1,
            busy: false,
            has_more: true,
            reels: Vec::new(),
            playing: None,
            focused: 0,
            toasts,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Index of the only video allowed to play.
    pub fn playing(&self) -> Option<usize> {
        self.playing
    }

    pub fn is_playing(&self, index: usize) -> bool {
        self.playing == Some(index)
    }

    pub fn focused(&self) -> usize {
        self.focused
    }

    /// Fetches the next page unless a fetch is in flight or the feed is
    /// exhausted. Returns whether a request was issued.
    pub async fn load_next_page(&mut self) -> AppResult<bool> {
        if self.busy || !self.has_more {
            return Ok(false);
        }
        self.busy = true;
        let page = self.next_page;
        let query = [("page", page.to_string()), ("limit", self.limit.to_string())];
        let in_flight = BusyGuard(&mut self.busy);
        let result = self.api.get_with(REELS_PATH, &query, None).await;
        drop(in_flight);

        let body = match result {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };

        let fetched: Vec<Reel> = probe_list(&body, &["data.reels", "reels", "data"]);
        let fetched_len = fetched.len();
        let known: std::collections::HashSet<String> =
            self.reels.iter().map(|reel| reel.id.clone()).collect();
        self.reels
            .extend(fetched.into_iter().filter(|reel| !known.contains(&reel.id)));
        self.has_more = probe_bool(
            &body,
            &["hasMore", "pagination.hasNextPage", "data.pagination.hasNextPage", "data.hasMore"],
        )
        .unwrap_or(fetched_len as u32 >= self.limit);
        self.next_page = page + 1;

        tracing::debug!(page, fetched = fetched_len, has_more = self.has_more, "Loaded reels page");
        Ok(true)
    }

    /// Called when the sentinel below the last card scrolls into view.
    pub async fn on_sentinel_visible(&mut self) -> AppResult<bool> {
        self.load_next_page().await
    }

    /// Applies an intersection observation for the card at `index`.
    pub fn on_intersection(&mut self, index: usize, ratio: f64) {
        if index >= self.reels.len() {
            return;
        }
        if ratio > self.threshold {
            self.playing = Some(index);
            self.focused = index;
        } else if self.playing == Some(index) {
            self.playing = None;
        }
    }

    /// Moves focus to the next card and returns the index to scroll to.
    pub fn next(&mut self) -> Option<usize> {
        if self.reels.is_empty() {
            return None;
        }
        let target = (self.focused + 1).min(self.reels.len() - 1);
        self.focus(target)
    }

    pub fn previous(&mut self) -> Option<usize> {
        if self.reels.is_empty() {
            return None;
        }
        let target = self.focused.saturating_sub(1);
        self.focus(target)
    }

    fn focus(&mut self, index: usize) -> Option<usize> {
        self.focused = index;
        self.playing = Some(index);
        Some(index)
    }

    fn reel_mut(&mut self, id: &str) -> AppResult<&mut Reel> {
        self.reels
            .iter_mut()
            .find(|reel| reel.id == id)
            .ok_or_else(|| AppError::NotFound("Reel not found".to_string()))
    }

    pub async fn toggle_like(&mut self, id: &str) -> AppResult<()> {
        self.reel_mut(id)?;
        let body = match self.api.post_json(&format!("{REELS_PATH}/{id}/like"), json!({})).await {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };
        let reel = self.reel_mut(id)?;
        let liked = probe_bool(&body, &["liked", "data.liked", "isLiked", "data.isLiked"])
            .unwrap_or(!reel.is_liked);
        let count = body
            .get("likesCount")
            .or_else(|| body.get("data").and_then(|data| data.get("likesCount")))
            .and_then(Value::as_u64)
            .map(|count| count as u32);
        reel.likes_count = count.unwrap_or(match (reel.is_liked, liked) {
            (false, true) => reel.likes_count + 1,
            (true, false) => reel.likes_count.saturating_sub(1),
            _ => reel.likes_count,
        });
        reel.is_liked = liked;
        Ok(())
    }

    pub async fn add_comment(&mut self, id: &str, text: &str) -> AppResult<Option<ReelComment>> {
        let text = text.trim();
        if text.is_empty() {
            let error = AppError::Validation("Comment cannot be empty".to_string());
            self.toasts.failure(&error);
            return Err(error);
        }
        self.reel_mut(id)?;
        let body = match self
            .api
            .post_json(&format!("{REELS_PATH}/{id}/comment"), json!({ "text": text }))
            .await
        {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };
        let reel = self.reel_mut(id)?;
        reel.comments_count += 1;
        Ok(probe_item(&body, &["data.comment", "comment", "data"]))
    }

    pub async fn fetch_comments(&mut self, id: &str) -> AppResult<Vec<ReelComment>> {
        match self.api.get(&format!("{REELS_PATH}/{id}/comments")).await {
            Ok(body) => Ok(probe_list(&body, &["data.comments", "comments", "data"])),
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    pub async fn fetch_likes(&mut self, id: &str) -> AppResult<Vec<ReelLike>> {
        match self.api.get(&format!("{REELS_PATH}/{id}/likes")).await {
            Ok(body) => Ok(probe_list(&body, &["data.likes", "likes", "data"])),
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    pub async fn delete_reel(&mut self, id: &str) -> AppResult<()> {
        if let Err(error) = self.api.delete(&format!("{REELS_PATH}/{id}")).await {
            self.toasts.failure(&error);
            return Err(error);
        }
        if let Some(position) = self.reels.iter().position(|reel| reel.id == id) {
            self.reels.remove(position);
            self.playing = match self.playing {
                Some(playing) if playing == position => None,
                Some(playing) if playing > position => Some(playing - 1),
                other => other,
            };
            if self.focused >= self.reels.len() {
                self.focused = self.reels.len().saturating_sub(1);
            } else if self.focused > position {
                self.focused -= 1;
            }
        }
        self.toasts.success("Reel deleted");
        Ok(())
    }

    pub async fn upload(&mut self, video: UploadFile, title: &str, description: &str) -> AppResult<Option<Reel>> {
        if title.trim().is_empty() {
            let error = AppError::Validation("Title is required".to_string());
            self.toasts.failure(&error);
            return Err(error);
        }
        if !video.content_type.starts_with("video/") {
            let error = AppError::Validation("Select a video file".to_string());
            self.toasts.failure(&error);
            return Err(error);
        }
        let parts = vec![
            FormPart::file("video", video),
            FormPart::text("title", title.trim()),
            FormPart::text("description", description.trim()),
        ];
        let body = match self.api.post_multipart(&format!("{REELS_PATH}/upload"), parts).await {
            Ok(body) => body,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };
        let created: Option<Reel> = probe_item(&body, &["data.reel", "reel", "data"]);
        if let Some(reel) = created.clone() {
            self.reels.insert(0, reel);
            self.playing = self.playing.map(|index| index + 1);
            if self.reels.len() > 1 {
                self.focused += 1;
            }
        }
        self.toasts.success("Reel uploaded");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use http::Method;
    use serde_json::{json, Value};

    use super::ReelsFeed;
    use crate::api::{ApiClient, UploadFile};
    use crate::session::{MemorySessionStore, Role};
    use crate::testing::{fake_client, toasts, valid_token, StalledTransport};

    fn reel(id: &str) -> Value {
        json!({ "_id": id, "videoUrl": format!("https://cdn/{id}.mp4"), "title": id, "likesCount": 3 })
    }

    fn feed() -> (ReelsFeed, std::sync::Arc<crate::testing::FakeTransport>) {
        let (client, transport, _) = fake_client(Role::Organization);
        (ReelsFeed::new(client, 2, 0.85, toasts()), transport)
    }

    #[tokio::test]
    async fn stops_fetching_once_exhausted() {
        let (mut feed, transport) = feed();
        transport.respond(
            Method::GET,
            "/api/reels",
            200,
            json!({ "success": true, "data": [reel("r1"), reel("r2")], "hasMore": false }),
        );

        assert!(feed.load_next_page().await.expect("first page"));
        assert!(!feed.has_more);
        assert!(!feed.on_sentinel_visible().await.expect("no-op"));
        assert!(!feed.on_sentinel_visible().await.expect("no-op"));
        assert_eq!(transport.calls(Method::GET, "/api/reels"), 1);
        assert_eq!(feed.reels.len(), 2);
    }

    #[tokio::test]
    async fn pages_forward_and_infers_has_more_from_page_size() {
        let (mut feed, transport) = feed();
        transport.respond(Method::GET, "/api/reels", 200, json!({ "reels": [reel("r1"), reel("r2")] }));
        transport.respond(Method::GET, "/api/reels", 200, json!({ "reels": [reel("r2"), reel("r3")] }));
        transport.respond(Method::GET, "/api/reels", 200, json!({ "reels": [] }));

        feed.load_next_page().await.expect("page 1");
        assert!(feed.has_more);
        feed.load_next_page().await.expect("page 2");
        feed.load_next_page().await.expect("page 3");
        assert!(!feed.has_more);

        let ids: Vec<_> = feed.reels.iter().map(|reel| reel.id.as_str()).collect();
        assert_eq!(ids, ["r1", "r2", "r3"]);
        let pages: Vec<_> = transport
            .requests()
            .iter()
            .map(|request| request.query.clone())
            .collect();
        assert_eq!(pages[1][0], ("page".to_string(), "2".to_string()));
        assert_eq!(pages[1][1], ("limit".to_string(), "2".to_string()));
    }

    #[tokio::test]
    async fn busy_flag_blocks_concurrent_fetch() {
        let (mut feed, transport) = feed();
        feed.busy = true;
        assert!(!feed.load_next_page().await.expect("skipped"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn abandoned_fetch_releases_busy_flag() {
        let session = Arc::new(MemorySessionStore::with_token(Role::Organization, &valid_token()));
        let client = ApiClient::new(Arc::new(StalledTransport), session, Role::Organization);
        let mut feed = ReelsFeed::new(client, 2, 0.85, toasts());

        let outcome = tokio::time::timeout(Duration::from_millis(20), feed.load_next_page()).await;
        assert!(outcome.is_err());
        assert!(!feed.is_busy());
        assert!(feed.has_more);
    }

    #[tokio::test]
    async fn fetches_comments_and_likes() {
        let (mut feed, transport) = feed();
        transport.respond(
            Method::GET,
            "/api/reels/r1/comments",
            200,
            json!({ "data": { "comments": [
                { "_id": "c1", "comment": "Lovely balcony", "userName": "Asha" },
                { "_id": "c2", "text": "Price?" }
            ] } }),
        );
        transport.respond(
            Method::GET,
            "/api/reels/r1/likes",
            200,
            json!({ "likes": [{ "userId": "u1", "name": "Ravi" }] }),
        );

        let comments = feed.fetch_comments("r1").await.expect("comments");
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, "Lovely balcony");
        assert_eq!(comments[0].author.as_deref(), Some("Asha"));

        let likes = feed.fetch_likes("r1").await.expect("likes");
        assert_eq!(likes[0].user_id, "u1");
        assert_eq!(likes[0].user_name.as_deref(), Some("Ravi"));

        assert!(feed.fetch_likes("r9").await.is_err());
        assert!(feed.toasts.last().is_some());
    }

    #[tokio::test]
    async fn at_most_one_video_plays() {
        let (mut feed, transport) = feed();
        transport.respond(
            Method::GET,
            "/api/reels",
            200,
            json!({ "data": [reel("r1"), reel("r2")], "hasMore": true }),
        );
        feed.load_next_page().await.expect("page");

        let observations = [(0, 0.9), (1, 0.3), (1, 0.95), (0, 0.1), (1, 0.5), (0, 0.86), (9, 1.0)];
        for (index, ratio) in observations {
            feed.on_intersection(index, ratio);
            let playing = (0..feed.reels.len()).filter(|i| feed.is_playing(*i)).count();
            assert!(playing <= 1);
        }
        assert_eq!(feed.playing(), Some(0));

        feed.on_intersection(0, 0.85);
        assert_eq!(feed.playing(), None);
    }

    #[tokio::test]
    async fn keyboard_navigation_clamps() {
        let (mut feed, transport) = feed();
        assert_eq!(feed.next(), None);
        transport.respond(
            Method::GET,
            "/api/reels",
            200,
            json!({ "data": [reel("r1"), reel("r2")], "hasMore": false }),
        );
        feed.load_next_page().await.expect("page");

        assert_eq!(feed.next(), Some(1));
        assert_eq!(feed.next(), Some(1));
        assert_eq!(feed.previous(), Some(0));
        assert_eq!(feed.previous(), Some(0));
        assert_eq!(feed.playing(), Some(0));
    }

    #[tokio::test]
    async fn like_and_comment_patch_single_entry() {
        let (mut feed, transport) = feed();
        transport.respond(
            Method::GET,
            "/api/reels",
            200,
            json!({ "data": [reel("r1"), reel("r2")], "hasMore": false }),
        );
        feed.load_next_page().await.expect("page");
        transport.respond(Method::POST, "/api/reels/r2/like", 200, json!({ "success": true, "liked": true }));
        transport.respond(
            Method::POST,
            "/api/reels/r2/comment",
            201,
            json!({ "data": { "_id": "c1", "text": "Nice room" } }),
        );

        feed.toggle_like("r2").await.expect("like");
        assert_eq!(feed.reels[1].likes_count, 4);
        assert!(feed.reels[1].is_liked);
        assert_eq!(feed.reels[0].likes_count, 3);

        let comment = feed.add_comment("r2", "  Nice room ").await.expect("comment");
        assert_eq!(comment.map(|c| c.text).as_deref(), Some("Nice room"));
        assert_eq!(feed.reels[1].comments_count, 1);
        assert!(feed.add_comment("r2", "   ").await.expect_err("blank").is_validation());
        assert_eq!(transport.calls(Method::POST, "/api/reels/r2/comment"), 1);
    }

    #[tokio::test]
    async fn delete_shifts_playback_index() {
        let (mut feed, transport) = feed();
        transport.respond(
            Method::GET,
            "/api/reels",
            200,
            json!({ "data": [reel("r1"), reel("r2")], "hasMore": false }),
        );
        feed.load_next_page().await.expect("page");
        feed.on_intersection(1, 0.99);
        transport.respond(Method::DELETE, "/api/reels/r1", 200, json!({ "success": true }));

        feed.delete_reel("r1").await.expect("deleted");
        assert_eq!(feed.reels.len(), 1);
        assert_eq!(feed.playing(), Some(0));
        assert_eq!(feed.focused(), 0);
    }

    #[tokio::test]
    async fn upload_rejects_non_video_files() {
        let (mut feed, transport) = feed();
        let image = UploadFile::new("cover.png", "image/png", vec![1, 2, 3]);
        assert!(feed.upload(image, "Tour", "").await.expect_err("not video").is_validation());
        assert!(transport.requests().is_empty());

        transport.respond(
            Method::POST,
            "/api/reels/upload",
            201,
            json!({ "data": { "reel": reel("r9") } }),
        );
        let video = UploadFile::new("tour.mp4", "video/mp4", vec![0, 0, 0, 24]);
        let created = feed.upload(video, "Tour", "Walkthrough").await.expect("uploaded");
        assert_eq!(created.map(|reel| reel.id).as_deref(), Some("r9"));
        assert_eq!(feed.reels[0].id, "r9");
    }
}
