//! Dashboard statistics store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::ApiClient;
use crate::types::{ReplaysByDay, StatsOverview, TopUser};

const OVERVIEW_PATH: &str = "/api/stats/overview";
const TOP_USERS_PATH: &str = "/api/stats/top-users";
const OVER_TIME_PATH: &str = "/api/stats/replays-over-time";

/// Ranking entries fetched by [`StatsStore::fetch_all`].
pub const DEFAULT_TOP_USERS_LIMIT: u32 = 5;
/// Series window in days fetched by [`StatsStore::fetch_all`].
pub const DEFAULT_OVER_TIME_DAYS: u32 = 14;

#[derive(Default)]
struct StatsState {
    overview: StatsOverview,
    top_users: Vec<TopUser>,
    replays_over_time: Vec<ReplaysByDay>,
    loading: bool,
    error: Option<String>,
}

/// Client state for dashboard statistics.
///
/// No pagination or filtering: the overview, ranking and time series are
/// fetched independently, and a failure in one never blocks the others.
pub struct StatsStore {
    api: Arc<ApiClient>,
    state: Mutex<StatsState>,
}

impl StatsStore {
    /// Creates a store over the given transport client.
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            state: Mutex::new(StatsState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the overview summary.
    #[must_use]
    pub fn overview(&self) -> StatsOverview {
        self.lock().overview.clone()
    }

    /// Snapshot of the top-user ranking.
    #[must_use]
    pub fn top_users(&self) -> Vec<TopUser> {
        self.lock().top_users.clone()
    }

    /// Snapshot of the daily replay series.
    #[must_use]
    pub fn replays_over_time(&self) -> Vec<ReplaysByDay> {
        self.lock().replays_over_time.clone()
    }

    /// True while an overview fetch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Current user-facing error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Fetches the overview summary; failure sets the error slot and keeps
    /// the previous summary.
    pub async fn fetch_overview(&self) -> Option<StatsOverview> {
        {
            let mut state = self.lock();
            state.loading = true;
            state.error = None;
        }
        let result = self.api.get_json::<StatsOverview>(OVERVIEW_PATH, &[]).await;

        let mut state = self.lock();
        state.loading = false;
        match result {
            Ok(overview) => {
                state.overview = overview.clone();
                Some(overview)
            }
            Err(err) => {
                log::warn!("failed to fetch stats overview: {err}");
                state.error = Some(err.user_message());
                None
            }
        }
    }

    /// Fetches the top-`limit` ranking; failure keeps the previous ranking.
    pub async fn fetch_top_users(&self, limit: u32) -> Vec<TopUser> {
        let params = [("limit", limit.to_string())];
        match self
            .api
            .get_json::<Vec<TopUser>>(TOP_USERS_PATH, &params)
            .await
        {
            Ok(users) => {
                self.lock().top_users.clone_from(&users);
                users
            }
            Err(err) => {
                log::warn!("failed to fetch top users: {err}");
                Vec::new()
            }
        }
    }

    /// Fetches the daily series for the last `days` days; failure keeps the
    /// previous series.
    pub async fn fetch_replays_over_time(&self, days: u32) -> Vec<ReplaysByDay> {
        let params = [("days", days.to_string())];
        match self
            .api
            .get_json::<Vec<ReplaysByDay>>(OVER_TIME_PATH, &params)
            .await
        {
            Ok(series) => {
                self.lock().replays_over_time.clone_from(&series);
                series
            }
            Err(err) => {
                log::warn!("failed to fetch replays over time: {err}");
                Vec::new()
            }
        }
    }

    /// Runs all three fetches concurrently and completes when all finish;
    /// a failure in one does not block the others from updating their own
    /// slice of state.
    pub async fn fetch_all(&self) {
        let (_, _, _) = futures::join!(
            self.fetch_overview(),
            self.fetch_top_users(DEFAULT_TOP_USERS_LIMIT),
            self.fetch_replays_over_time(DEFAULT_OVER_TIME_DAYS),
        );
    }
}
