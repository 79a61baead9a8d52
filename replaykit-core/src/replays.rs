//! Replay collection store: pagination, filtering and list mutation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream;
use reqwest::multipart::{Form, Part};
use uuid::Uuid;

use crate::client::ApiClient;
use crate::error::ReplayKitError;
use crate::types::{Page, Replay};

const REPLAYS_PATH: &str = "/api/replays";
const UPLOAD_PATH: &str = "/api/replays/upload";

/// Page size used until [`ReplayStore::set_page_size`] is called.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Progress observer for uploads; receives integer percents 0–100.
pub type ProgressFn = dyn Fn(u8) + Send + Sync;

/// Active filter criteria for the replay list.
///
/// Empty fields are omitted from the outgoing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayFilters {
    /// Free-text search.
    pub query: String,
    /// Owner username.
    pub username: String,
    /// Session label.
    pub session_name: String,
    /// Client address the session originated from.
    pub client_ip: String,
    /// Lower bound on the session date (ISO 8601).
    pub date_from: String,
    /// Upper bound on the session date (ISO 8601).
    pub date_to: String,
    /// Lifecycle status, as its wire form (`active`, `archived`, `deleted`).
    pub status: String,
}

impl ReplayFilters {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        [
            ("query", &self.query),
            ("username", &self.username),
            ("session_name", &self.session_name),
            ("client_ip", &self.client_ip),
            ("date_from", &self.date_from),
            ("date_to", &self.date_to),
            ("status", &self.status),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name, value.clone()))
        .collect()
    }
}

/// Partial update for [`ReplayFilters`].
///
/// `Some` fields overwrite the current criterion, `None` fields are left
/// untouched; setting a field to an empty string clears that criterion.
#[derive(Debug, Clone, Default)]
pub struct ReplayFilterUpdate {
    /// Free-text search.
    pub query: Option<String>,
    /// Owner username.
    pub username: Option<String>,
    /// Session label.
    pub session_name: Option<String>,
    /// Client address.
    pub client_ip: Option<String>,
    /// Lower date bound.
    pub date_from: Option<String>,
    /// Upper date bound.
    pub date_to: Option<String>,
    /// Lifecycle status.
    pub status: Option<String>,
}

struct ReplayListState {
    items: Vec<Replay>,
    current: Option<Replay>,
    total: u64,
    page: u64,
    page_size: u64,
    filters: ReplayFilters,
    loading: bool,
    error: Option<String>,
}

impl Default for ReplayListState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current: None,
            total: 0,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filters: ReplayFilters::default(),
            loading: false,
            error: None,
        }
    }
}

/// Client state for the paginated, filterable replay collection.
///
/// Fetches are fenced by a per-store sequence number: a response is applied
/// only if no newer fetch was issued while it was in flight, so a stale
/// response can never overwrite a fresher one.
pub struct ReplayStore {
    api: Arc<ApiClient>,
    state: Mutex<ReplayListState>,
    fetch_seq: AtomicU64,
}

impl ReplayStore {
    /// Creates a store over the given transport client.
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            state: Mutex::new(ReplayListState::default()),
            fetch_seq: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReplayListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the fetched page items.
    #[must_use]
    pub fn items(&self) -> Vec<Replay> {
        self.lock().items.clone()
    }

    /// The separately fetched current item, if any.
    #[must_use]
    pub fn current(&self) -> Option<Replay> {
        self.lock().current.clone()
    }

    /// Server-side size of the filtered collection.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.lock().total
    }

    /// Current 1-based page index.
    #[must_use]
    pub fn page(&self) -> u64 {
        self.lock().page
    }

    /// Current page size.
    #[must_use]
    pub fn page_size(&self) -> u64 {
        self.lock().page_size
    }

    /// Changes the page size and returns to page 1; sizes below 1 are
    /// ignored. The next fetch uses the new size.
    pub fn set_page_size(&self, page_size: u64) {
        if page_size < 1 {
            return;
        }
        let mut state = self.lock();
        state.page_size = page_size;
        state.page = 1;
    }

    /// Snapshot of the active filters.
    #[must_use]
    pub fn filters(&self) -> ReplayFilters {
        self.lock().filters.clone()
    }

    /// True while a fetch, single fetch or upload is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Current user-facing error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Clears the error slot.
    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    /// Page count derived from the current total; at least 1 even for an
    /// empty collection.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        let state = self.lock();
        total_pages_for(state.total, state.page_size)
    }

    /// Fetches the current page with the active filters.
    ///
    /// On success the returned items and total replace the local page; on
    /// failure the error slot is set and the previous items are left
    /// untouched. Returns the applied items, empty on failure or when a
    /// newer fetch superseded this one.
    pub async fn fetch(&self) -> Vec<Replay> {
        let seq = self.begin_fetch();
        let params = {
            let state = self.lock();
            let mut params = vec![
                ("page", state.page.to_string()),
                ("page_size", state.page_size.to_string()),
            ];
            params.extend(state.filters.to_params());
            params
        };

        let result = self.api.get_json::<Page<Replay>>(REPLAYS_PATH, &params).await;
        self.apply_page(seq, result)
    }

    fn begin_fetch(&self) -> u64 {
        let seq = self.fetch_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let mut state = self.lock();
        state.loading = true;
        state.error = None;
        seq
    }

    fn apply_page(&self, seq: u64, result: Result<Page<Replay>, ReplayKitError>) -> Vec<Replay> {
        let mut state = self.lock();
        if self.fetch_seq.load(Ordering::Acquire) != seq {
            // superseded while in flight; drop this response wholesale and
            // let the newest fetch settle the final state
            return Vec::new();
        }
        state.loading = false;
        match result {
            Ok(page) => {
                state.items.clone_from(&page.items);
                state.total = page.total;
                page.items
            }
            Err(err) => {
                log::warn!("failed to fetch replays: {err}");
                state.error = Some(err.user_message());
                Vec::new()
            }
        }
    }

    /// Fetches a single replay into the current-item slot.
    pub async fn fetch_one(&self, id: Uuid) -> Option<Replay> {
        {
            let mut state = self.lock();
            state.loading = true;
            state.error = None;
        }
        let path = format!("{REPLAYS_PATH}/{id}");
        let result = self.api.get_json::<Replay>(&path, &[]).await;

        let mut state = self.lock();
        state.loading = false;
        match result {
            Ok(replay) => {
                state.current = Some(replay.clone());
                Some(replay)
            }
            Err(err) => {
                log::warn!("failed to fetch replay {id}: {err}");
                state.error = Some(err.user_message());
                None
            }
        }
    }

    /// Deletes a replay, optionally removing the stored file permanently.
    ///
    /// On success the matching item is removed locally and the total drops
    /// by one; no refetch is issued. On failure the list and total stay
    /// untouched and the error slot is set.
    pub async fn delete(&self, id: Uuid, hard_delete: bool) -> bool {
        let path = format!("{REPLAYS_PATH}/{id}");
        let params = [("hard_delete", hard_delete.to_string())];
        match self.api.delete(&path, &params).await {
            Ok(()) => {
                let mut state = self.lock();
                // identifiers are unique; remove at most one entry
                if let Some(index) = state.items.iter().position(|replay| replay.id == id) {
                    state.items.remove(index);
                }
                state.total = state.total.saturating_sub(1);
                true
            }
            Err(err) => {
                log::warn!("failed to delete replay {id}: {err}");
                self.lock().error = Some(err.user_message());
                false
            }
        }
    }

    /// Uploads a replay recording as multipart form data.
    ///
    /// `on_progress` observes integer percents 0–100 as the body is
    /// streamed in chunks. On success the created replay is inserted at the
    /// head of the items list and the total grows by one. Unlike the other
    /// actions, a failure is returned to the caller after the error slot is
    /// set: upload callers need the rejected outcome to halt their flow.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayKitError::InvalidInput`] for an empty payload,
    /// otherwise any transport, server or decode failure of the upload
    /// request.
    pub async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        on_progress: Option<Arc<ProgressFn>>,
    ) -> Result<Replay, ReplayKitError> {
        if bytes.is_empty() {
            return Err(ReplayKitError::InvalidInput {
                attribute: "file".to_string(),
                reason: "upload payload is empty".to_string(),
            });
        }

        {
            let mut state = self.lock();
            state.loading = true;
            state.error = None;
        }

        let result = self
            .api
            .post_multipart::<Replay, _>(UPLOAD_PATH, || {
                upload_form(filename, &bytes, on_progress.clone())
            })
            .await;

        let mut state = self.lock();
        state.loading = false;
        match result {
            Ok(replay) => {
                state.items.insert(0, replay.clone());
                state.total += 1;
                Ok(replay)
            }
            Err(err) => {
                state.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Shallow-merges `update` into the filter set and returns to page 1.
    pub fn set_filters(&self, update: ReplayFilterUpdate) {
        let mut state = self.lock();
        let filters = &mut state.filters;
        if let Some(query) = update.query {
            filters.query = query;
        }
        if let Some(username) = update.username {
            filters.username = username;
        }
        if let Some(session_name) = update.session_name {
            filters.session_name = session_name;
        }
        if let Some(client_ip) = update.client_ip {
            filters.client_ip = client_ip;
        }
        if let Some(date_from) = update.date_from {
            filters.date_from = date_from;
        }
        if let Some(date_to) = update.date_to {
            filters.date_to = date_to;
        }
        if let Some(status) = update.status {
            filters.status = status;
        }
        state.page = 1;
    }

    /// Resets every criterion and returns to page 1.
    pub fn clear_filters(&self) {
        let mut state = self.lock();
        state.filters = ReplayFilters::default();
        state.page = 1;
    }

    /// Advances one page and re-fetches; ignored on the last page.
    pub async fn next_page(&self) {
        let page = self.page();
        self.go_to_page(page + 1).await;
    }

    /// Steps back one page and re-fetches; ignored on the first page.
    pub async fn prev_page(&self) {
        let page = self.page();
        self.go_to_page(page.saturating_sub(1)).await;
    }

    /// Jumps to `page` and re-fetches. Out-of-range requests are silently
    /// ignored: no request is issued and no state changes.
    pub async fn go_to_page(&self, page: u64) {
        {
            let mut state = self.lock();
            let limit = total_pages_for(state.total, state.page_size);
            if page < 1 || page > limit {
                return;
            }
            state.page = page;
        }
        self.fetch().await;
    }

    /// Constructs the playback streaming URL for a replay; no request is
    /// issued.
    #[must_use]
    pub fn stream_url(&self, id: Uuid) -> String {
        format!("{}{REPLAYS_PATH}/{id}/stream", self.api.base_url())
    }
}

fn total_pages_for(total: u64, page_size: u64) -> u64 {
    total.div_ceil(page_size.max(1)).max(1)
}

fn upload_form(filename: &str, bytes: &[u8], on_progress: Option<Arc<ProgressFn>>) -> Form {
    let total = bytes.len();
    if let Some(callback) = &on_progress {
        callback(0);
    }

    let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
    let mut sent = 0usize;
    let stream = stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        if let Some(callback) = &on_progress {
            let percent = u8::try_from((sent * 100) / total).unwrap_or(100);
            callback(percent);
        }
        Ok::<Vec<u8>, std::convert::Infallible>(chunk)
    }));

    let body = reqwest::Body::wrap_stream(stream);
    let part = Part::stream_with_length(body, total as u64).file_name(filename.to_string());
    Form::new().part("file", part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::storage::{KeyValueStore, MemoryStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use crate::types::ReplayStatus;
    use test_case::test_case;

    fn store_for(server: &mockito::Server) -> ReplayStore {
        let kv = Arc::new(MemoryStore::new());
        kv.set(ACCESS_TOKEN_KEY, "tok");
        kv.set(REFRESH_TOKEN_KEY, "ref");
        let session = Arc::new(Session::new(kv as Arc<dyn KeyValueStore>));
        ReplayStore::new(Arc::new(ApiClient::new(&server.url(), session)))
    }

    fn replay_json(id: Uuid, filename: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "filename": filename,
            "status": "active",
            "file_size": 1024,
            "duration_seconds": 60
        })
    }

    fn page_body(ids: &[(Uuid, &str)], total: u64) -> String {
        serde_json::json!({
            "items": ids.iter().map(|(id, name)| replay_json(*id, name)).collect::<Vec<_>>(),
            "total": total,
            "page": 1,
            "page_size": 20,
            "total_pages": total.div_ceil(20).max(1)
        })
        .to_string()
    }

    #[test_case(0, 20 => 1; "empty collection still has one page")]
    #[test_case(1, 20 => 1; "single item")]
    #[test_case(45, 20 => 3; "partial last page")]
    #[test_case(40, 20 => 2; "exact fit")]
    fn test_total_pages_for(total: u64, page_size: u64) -> u64 {
        total_pages_for(total, page_size)
    }

    #[tokio::test]
    async fn test_fetch_populates_items_and_total() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("page".into(), "1".into()),
                mockito::Matcher::UrlEncoded("page_size".into(), "20".into()),
            ]))
            .with_status(200)
            .with_body(page_body(&[(id, "one.guac")], 45))
            .create_async()
            .await;

        let store = store_for(&server);
        let items = store.fetch().await;

        mock.assert_async().await;
        assert_eq!(items.len(), 1);
        assert_eq!(store.items()[0].id, id);
        assert_eq!(store.total(), 45);
        assert_eq!(store.total_pages(), 3);
        assert!(!store.is_loading());
        assert!(store.error().is_none());
        drop(server);
    }

    #[tokio::test]
    async fn test_fetch_omits_empty_criteria() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::Exact(
                "page=1&page_size=20&username=alice".to_string(),
            ))
            .with_status(200)
            .with_body(page_body(&[], 0))
            .create_async()
            .await;

        let store = store_for(&server);
        store.set_filters(ReplayFilterUpdate {
            username: Some("alice".to_string()),
            ..ReplayFilterUpdate::default()
        });
        store.fetch().await;

        mock.assert_async().await;
        drop(server);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_items() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let ok = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[(id, "one.guac")], 1))
            .create_async()
            .await;

        let store = store_for(&server);
        store.fetch().await;
        ok.assert_async().await;

        // newer mocks take precedence over older ones for the same route
        let failing = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body(r#"{"detail": "storage offline"}"#)
            .create_async()
            .await;

        let before = store.items();
        let items = store.fetch().await;

        failing.assert_async().await;
        assert!(items.is_empty());
        assert_eq!(store.items(), before);
        assert_eq!(store.total(), 1);
        assert_eq!(store.error(), Some("storage offline".to_string()));
        assert!(!store.is_loading());
        drop(server);
    }

    #[tokio::test]
    async fn test_stale_response_is_dropped() {
        let server = mockito::Server::new_async().await;
        let store = store_for(&server);

        let stale_seq = store.begin_fetch();
        let newer_seq = store.begin_fetch();

        let stale_page = Page {
            items: vec![],
            total: 99,
            page: 1,
            page_size: 20,
            total_pages: 5,
        };
        let applied = store.apply_page(stale_seq, Ok(stale_page));
        assert!(applied.is_empty());
        assert_eq!(store.total(), 0, "stale response must not land");

        let fresh_page = Page {
            items: vec![],
            total: 7,
            page: 1,
            page_size: 20,
            total_pages: 1,
        };
        store.apply_page(newer_seq, Ok(fresh_page));
        assert_eq!(store.total(), 7);
        drop(server);
    }

    #[tokio::test]
    async fn test_fetch_one_populates_current_slot() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock("GET", format!("/api/replays/{id}").as_str())
            .with_status(200)
            .with_body(replay_json(id, "one.guac").to_string())
            .create_async()
            .await;

        let store = store_for(&server);
        let replay = store.fetch_one(id).await;

        mock.assert_async().await;
        assert_eq!(replay.unwrap().id, id);
        assert_eq!(store.current().unwrap().id, id);
        assert!(store.items().is_empty(), "current slot is separate");
        drop(server);
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one_item_and_decrements_total() {
        let mut server = mockito::Server::new_async().await;
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let list = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[(keep, "keep.guac"), (gone, "gone.guac")], 2))
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", format!("/api/replays/{gone}").as_str())
            .match_query(mockito::Matcher::UrlEncoded(
                "hard_delete".into(),
                "false".into(),
            ))
            .with_status(200)
            .with_body(r#"{"message": "Replay deleted successfully"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        store.fetch().await;
        list.assert_async().await;

        assert!(store.delete(gone, false).await);

        delete.assert_async().await;
        let items = store.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, keep);
        assert_eq!(store.total(), 1);
        assert!(store.error().is_none());
        drop(server);
    }

    #[tokio::test]
    async fn test_delete_failure_leaves_state_untouched() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let list = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[(id, "one.guac")], 1))
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", format!("/api/replays/{id}").as_str())
            .match_query(mockito::Matcher::UrlEncoded(
                "hard_delete".into(),
                "true".into(),
            ))
            .with_status(500)
            .with_body(r#"{"detail": "Failed to delete replay"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        store.fetch().await;
        list.assert_async().await;

        let before_items = store.items();
        let before_total = store.total();
        assert!(!store.delete(id, true).await);

        delete.assert_async().await;
        assert_eq!(store.items(), before_items);
        assert_eq!(store.total(), before_total);
        assert_eq!(store.error(), Some("Failed to delete replay".to_string()));
        drop(server);
    }

    #[test]
    fn test_filter_mutations_reset_page() {
        let store = {
            let session = Arc::new(Session::new(Arc::new(MemoryStore::new())));
            ReplayStore::new(Arc::new(ApiClient::new("http://127.0.0.1:1", session)))
        };

        // land on a later page without going through the network
        {
            let mut state = store.lock();
            state.total = 100;
            state.page = 4;
        }

        store.set_filters(ReplayFilterUpdate {
            query: Some("ssh".to_string()),
            ..ReplayFilterUpdate::default()
        });
        assert_eq!(store.page(), 1);
        assert_eq!(store.filters().query, "ssh");

        {
            let mut state = store.lock();
            state.page = 3;
        }
        store.clear_filters();
        assert_eq!(store.page(), 1);
        assert_eq!(store.filters(), ReplayFilters::default());
    }

    #[test]
    fn test_set_filters_merges_partially() {
        let store = {
            let session = Arc::new(Session::new(Arc::new(MemoryStore::new())));
            ReplayStore::new(Arc::new(ApiClient::new("http://127.0.0.1:1", session)))
        };

        store.set_filters(ReplayFilterUpdate {
            username: Some("alice".to_string()),
            status: Some(ReplayStatus::Active.to_string()),
            ..ReplayFilterUpdate::default()
        });
        store.set_filters(ReplayFilterUpdate {
            status: Some(String::new()),
            ..ReplayFilterUpdate::default()
        });

        let filters = store.filters();
        assert_eq!(filters.username, "alice", "untouched field survives");
        assert_eq!(filters.status, "", "empty value clears the criterion");
    }

    #[test_case(0; "below range")]
    #[test_case(4; "beyond last page")]
    #[tokio::test]
    async fn test_go_to_page_out_of_range_is_silently_ignored(target: u64) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let store = store_for(&server);
        {
            let mut state = store.lock();
            state.total = 45; // 3 pages at the default size
            state.page = 2;
        }

        store.go_to_page(target).await;

        mock.assert_async().await;
        assert_eq!(store.page(), 2, "no state change");
        assert!(store.error().is_none());
        drop(server);
    }

    #[tokio::test]
    async fn test_page_navigation_refetches_within_bounds() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(page_body(&[], 45))
            .expect(2)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("page".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(page_body(&[], 45))
            .create_async()
            .await;

        let store = store_for(&server);
        store.fetch().await;

        store.next_page().await;
        assert_eq!(store.page(), 2);

        store.prev_page().await;
        assert_eq!(store.page(), 1);
        // already on the first page: a further step back must not fire a
        // request, so the page-1 mock stays at two hits
        store.prev_page().await;
        assert_eq!(store.page(), 1);

        first.assert_async().await;
        second.assert_async().await;
        drop(server);
    }

    #[tokio::test]
    async fn test_upload_reports_progress_and_prepends_item() {
        let mut server = mockito::Server::new_async().await;
        let existing = Uuid::new_v4();
        let uploaded = Uuid::new_v4();
        let list = server
            .mock("GET", "/api/replays")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[(existing, "old.guac")], 1))
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/api/replays/upload")
            .match_header(
                "content-type",
                mockito::Matcher::Regex("multipart/form-data.*".to_string()),
            )
            .with_status(201)
            .with_body(replay_json(uploaded, "new.guac").to_string())
            .create_async()
            .await;

        let store = store_for(&server);
        store.fetch().await;
        list.assert_async().await;

        let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: Arc<ProgressFn> = Arc::new(move |percent| {
            sink.lock().unwrap().push(percent);
        });

        let replay = store
            .upload("new.guac", vec![0u8; 150_000], Some(callback))
            .await
            .unwrap();

        upload.assert_async().await;
        assert_eq!(replay.id, uploaded);

        let percents = seen.lock().unwrap().clone();
        assert_eq!(percents.first(), Some(&0));
        assert_eq!(percents.last(), Some(&100));
        assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]));

        let items = store.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, uploaded, "new item lands at the head");
        assert_eq!(store.total(), 2);
        drop(server);
    }

    #[tokio::test]
    async fn test_upload_failure_sets_error_and_reraises() {
        let mut server = mockito::Server::new_async().await;
        let upload = server
            .mock("POST", "/api/replays/upload")
            .with_status(400)
            .with_body(r#"{"detail": "Unsupported recording format"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        let err = store
            .upload("bad.bin", vec![1, 2, 3], None)
            .await
            .unwrap_err();

        upload.assert_async().await;
        match err {
            ReplayKitError::Api { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "Unsupported recording format");
            }
            other => panic!("expected Api error, got {other}"),
        }
        assert_eq!(
            store.error(),
            Some("Unsupported recording format".to_string())
        );
        assert!(store.items().is_empty());
        assert_eq!(store.total(), 0);
        drop(server);
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_payload_locally() {
        let server = mockito::Server::new_async().await;
        let store = store_for(&server);
        let err = store.upload("empty.guac", Vec::new(), None).await.unwrap_err();
        assert!(matches!(err, ReplayKitError::InvalidInput { .. }));
        drop(server);
    }

    #[test]
    fn test_stream_url_is_constructed_not_fetched() {
        let session = Arc::new(Session::new(Arc::new(MemoryStore::new())));
        let store = ReplayStore::new(Arc::new(ApiClient::new(
            "https://replay.example.com/",
            session,
        )));
        let id = Uuid::new_v4();
        assert_eq!(
            store.stream_url(id),
            format!("https://replay.example.com/api/replays/{id}/stream")
        );
    }
}
