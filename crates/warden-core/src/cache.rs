//! Reuse of category results between evaluation cycles

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use warden_api::BatteryStatus;
use warden_config::UserRelatedData;
use warden_host_api::NetworkIdMatcher;
use warden_util::CategoryId;

use crate::CategoryItselfHandling;

#[derive(Debug, Clone)]
struct ReportedStatus {
    user: Arc<UserRelatedData>,
    battery: BatteryStatus,
    time: i64,
    network_id: Option<String>,
}

/// Per-category results for the most recently reported status
///
/// A result is only recomputed once it stops being valid for the reported
/// status, so callers get the same `Arc` for as long as nothing relevant
/// changed.
pub struct CategoryHandlingCache {
    matcher: Arc<dyn NetworkIdMatcher>,
    status: Option<ReportedStatus>,
    handlings: HashMap<CategoryId, Arc<CategoryItselfHandling>>,
}

impl CategoryHandlingCache {
    pub fn new(matcher: Arc<dyn NetworkIdMatcher>) -> Self {
        Self {
            matcher,
            status: None,
            handlings: HashMap::new(),
        }
    }

    /// Set the status later lookups are evaluated for.
    ///
    /// Drops cached results that are no longer valid, including those of
    /// categories the user no longer has.
    pub fn report_status(
        &mut self,
        user: Arc<UserRelatedData>,
        battery: BatteryStatus,
        time: i64,
        network_id: Option<String>,
    ) {
        let before = self.handlings.len();

        self.handlings.retain(|id, handling| match user.category(id.as_str()) {
            Some(category) => handling.is_valid(category, &user, battery, time, network_id.as_deref()),
            None => false,
        });

        let dropped = before - self.handlings.len();
        if dropped > 0 {
            debug!(dropped, remaining = self.handlings.len(), "Dropped outdated category results");
        }

        self.status = Some(ReportedStatus {
            user,
            battery,
            time,
            network_id,
        });
    }

    /// Result for a category of the reported user.
    ///
    /// `None` if no status was reported yet or the user has no such category.
    pub fn get(&mut self, category_id: &str) -> Option<Arc<CategoryItselfHandling>> {
        let status = self.status.as_ref()?;
        let category = status.user.category(category_id)?;

        if let Some(handling) = self.handlings.get(category_id) {
            return Some(Arc::clone(handling));
        }

        let handling = Arc::new(CategoryItselfHandling::calculate(
            category,
            &status.user,
            status.battery,
            status.time,
            status.network_id.as_deref(),
            self.matcher.as_ref(),
        ));
        self.handlings.insert(category.id().clone(), Arc::clone(&handling));

        Some(handling)
    }

    pub fn len(&self) -> usize {
        self.handlings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlings.is_empty()
    }

    /// Forget all results and the reported status
    pub fn clear(&mut self) {
        self.handlings.clear();
        self.status = None;
    }
}

/// [`CategoryHandlingCache`] behind a mutex, for callers on several threads
///
/// Reporting a status and reading results happen under one lock, so a
/// caller never sees results computed for another caller's status.
pub struct SharedCategoryHandlingCache {
    inner: Mutex<CategoryHandlingCache>,
}

impl SharedCategoryHandlingCache {
    pub fn new(matcher: Arc<dyn NetworkIdMatcher>) -> Self {
        Self {
            inner: Mutex::new(CategoryHandlingCache::new(matcher)),
        }
    }

    pub fn with_status<R>(
        &self,
        user: Arc<UserRelatedData>,
        battery: BatteryStatus,
        time: i64,
        network_id: Option<String>,
        f: impl FnOnce(&mut CategoryHandlingCache) -> R,
    ) -> R {
        // results stay consistent even if a holder panicked
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.report_status(user, battery, time, network_id);
        f(&mut cache)
    }

    /// Results for several categories at once; unknown ids are skipped
    pub fn get_batch<'a>(
        &self,
        user: Arc<UserRelatedData>,
        battery: BatteryStatus,
        time: i64,
        network_id: Option<String>,
        category_ids: impl IntoIterator<Item = &'a CategoryId>,
    ) -> HashMap<CategoryId, Arc<CategoryItselfHandling>> {
        self.with_status(user, battery, time, network_id, |cache| {
            category_ids
                .into_iter()
                .filter_map(|id| cache.get(id.as_str()).map(|handling| (id.clone(), handling)))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{category, monday, shared_user};
    use warden_host_api::ExactNetworkIdMatcher;

    fn cache() -> CategoryHandlingCache {
        CategoryHandlingCache::new(Arc::new(ExactNetworkIdMatcher))
    }

    #[test]
    fn nothing_before_first_status() {
        let mut cache = cache();
        assert!(cache.get("games").is_none());
    }

    #[test]
    fn unknown_category_is_none() {
        let mut cache = cache();
        cache.report_status(shared_user(vec![category("games")]), BatteryStatus::default(), monday(10, 0), None);
        assert!(cache.get("school").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn valid_result_is_reused() {
        let mut cache = cache();
        let user = shared_user(vec![category("games")]);

        cache.report_status(Arc::clone(&user), BatteryStatus::default(), monday(10, 0), None);
        let first = cache.get("games").unwrap();

        cache.report_status(Arc::clone(&user), BatteryStatus::default(), monday(10, 5), None);
        let second = cache.get("games").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_result_is_recomputed() {
        let mut cache = cache();
        let user = shared_user(vec![category("games")]);

        cache.report_status(Arc::clone(&user), BatteryStatus::default(), monday(10, 0), None);
        let first = cache.get("games").unwrap();

        cache.report_status(
            Arc::clone(&user),
            BatteryStatus::default(),
            first.depends_on_max_time + 1,
            None,
        );
        assert!(cache.is_empty());

        let second = cache.get("games").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.depends_on_min_time, first.depends_on_max_time + 1);
    }

    #[test]
    fn vanished_category_is_evicted() {
        let mut cache = cache();
        cache.report_status(
            shared_user(vec![category("games"), category("video")]),
            BatteryStatus::default(),
            monday(10, 0),
            None,
        );
        cache.get("games").unwrap();
        cache.get("video").unwrap();
        assert_eq!(cache.len(), 2);

        // the user data changed as well, so no result survives
        cache.report_status(shared_user(vec![category("games")]), BatteryStatus::default(), monday(10, 0), None);
        assert!(cache.is_empty());
        assert!(cache.get("video").is_none());
        assert!(cache.get("games").is_some());
    }

    #[test]
    fn clear_forgets_status() {
        let mut cache = cache();
        cache.report_status(shared_user(vec![category("games")]), BatteryStatus::default(), monday(10, 0), None);
        cache.get("games").unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("games").is_none());
    }

    #[test]
    fn shared_cache_batch_lookup() {
        let shared = SharedCategoryHandlingCache::new(Arc::new(ExactNetworkIdMatcher));
        let user = shared_user(vec![category("games"), category("video")]);
        let ids = [CategoryId::new("games"), CategoryId::new("missing")];

        let results = shared.get_batch(Arc::clone(&user), BatteryStatus::default(), monday(10, 0), None, &ids);

        assert_eq!(results.len(), 1);
        assert!(results.contains_key("games"));

        let cached = shared.with_status(user, BatteryStatus::default(), monday(10, 1), None, |cache| cache.len());
        assert_eq!(cached, 1);
    }
}
