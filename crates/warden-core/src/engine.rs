//! Blocking engine
//!
//! Combines foreground app classification with the cached per-category
//! results into one decision per app.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;
use warden_api::{AppDecisionView, BatteryStatus, BlockingLevel, BlockingReason, EvaluationReportView};
use warden_config::{DeviceRelatedData, UserRelatedData};
use warden_host_api::NetworkIdMatcher;
use warden_util::CategoryId;

use crate::{AppBaseHandling, CategoryHandlingCache, CategoryItselfHandling, ForegroundApp};

/// Everything a decision depends on, for one instant
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub user: &'a Arc<UserRelatedData>,
    pub device: &'a DeviceRelatedData,
    pub battery: BatteryStatus,
    /// Epoch milliseconds
    pub now: i64,
    pub network_id: Option<&'a str>,
    /// Suspend all blocking, e.g. while the device is locked
    pub pause_foreground_app_loop: bool,
    /// Keep enforcing but stop counting usage
    pub pause_counting: bool,
}

/// Decision for one foreground app
#[derive(Debug, Clone)]
pub struct AppDecision {
    pub app: ForegroundApp,
    pub handling: AppBaseHandling,
    pub reason: BlockingReason,
    pub notification_reason: BlockingReason,
    /// Category of the chain that caused the block
    pub blocking_category: Option<CategoryId>,
    pub level: Option<BlockingLevel>,
}

impl AppDecision {
    pub fn is_blocked(&self) -> bool {
        self.reason.is_blocking()
    }

    pub fn to_view(&self) -> AppDecisionView {
        AppDecisionView {
            package: self.app.package_name.clone(),
            activity: self.app.activity_name.clone(),
            handling: self.handling.kind(),
            category_ids: self
                .handling
                .category_chain()
                .map(|chain| chain.category_ids().to_vec())
                .unwrap_or_default(),
            reason: self.reason,
            notification_reason: self.notification_reason,
            blocking_category: self.blocking_category.clone(),
            level: self.level,
        }
    }
}

/// Outcome of one evaluation cycle
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub evaluated_at: i64,
    pub decisions: Vec<AppDecision>,
    /// Every category result consulted for this report
    pub handlings: BTreeMap<CategoryId, Arc<CategoryItselfHandling>>,
    /// Categories foreground usage should be added to
    pub categories_to_count: BTreeSet<CategoryId>,
    /// Usage that may be added before evaluating again; `i64::MAX` if unlimited
    pub max_time_to_add: i64,
    /// Earliest instant at which a consulted result stops being valid
    pub reevaluate_at: Option<i64>,
}

impl EvaluationReport {
    pub fn any_blocked(&self) -> bool {
        self.decisions.iter().any(AppDecision::is_blocked)
    }

    pub fn to_view(&self) -> EvaluationReportView {
        let mut view = EvaluationReportView::new(self.evaluated_at);
        view.reevaluate_at = self.reevaluate_at;
        view.categories_to_count = self.categories_to_count.iter().cloned().collect();
        view.max_time_to_add = (self.max_time_to_add != i64::MAX).then_some(self.max_time_to_add);
        view.apps = self.decisions.iter().map(AppDecision::to_view).collect();
        view
    }
}

/// Evaluates foreground apps against the policy snapshot
pub struct BlockingEngine {
    cache: CategoryHandlingCache,
}

impl BlockingEngine {
    pub fn new(matcher: Arc<dyn NetworkIdMatcher>) -> Self {
        Self {
            cache: CategoryHandlingCache::new(matcher),
        }
    }

    /// Drop all cached category results
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cached_categories(&self) -> usize {
        self.cache.len()
    }

    pub fn evaluate(&mut self, ctx: &EvaluationContext<'_>, apps: &[ForegroundApp]) -> EvaluationReport {
        let base_handlings: Vec<AppBaseHandling> = apps
            .iter()
            .map(|app| {
                AppBaseHandling::calculate(
                    app,
                    ctx.pause_foreground_app_loop,
                    ctx.pause_counting,
                    ctx.user,
                    ctx.device,
                )
            })
            .collect();

        // the network is only looked at if some category asks for it
        let network_id = base_handlings
            .iter()
            .any(AppBaseHandling::needs_network_id)
            .then_some(ctx.network_id)
            .flatten();

        self.cache
            .report_status(Arc::clone(ctx.user), ctx.battery, ctx.now, network_id.map(str::to_string));

        let counted_categories = AppBaseHandling::categories_for_counting(&base_handlings);
        let mut handlings = BTreeMap::new();
        let mut decisions = Vec::with_capacity(apps.len());

        for (app, base) in apps.iter().zip(base_handlings) {
            let decision = self.decide(app, base, &mut handlings);
            if decision.is_blocked() {
                debug!(
                    package = ?decision.app.package_name,
                    reason = %decision.reason,
                    category = ?decision.blocking_category,
                    "App blocked"
                );
            }
            decisions.push(decision);
        }

        let categories_to_count: BTreeSet<CategoryId> = counted_categories
            .into_iter()
            .filter(|id| handlings.get(id).is_some_and(|handling| handling.should_count_time))
            .collect();

        let max_time_to_add = categories_to_count
            .iter()
            .filter_map(|id| handlings.get(id))
            .map(|handling| handling.max_time_to_add)
            .min()
            .unwrap_or(i64::MAX);

        let reevaluate_at = handlings.values().map(|handling| handling.depends_on_max_time).min();

        EvaluationReport {
            evaluated_at: ctx.now,
            decisions,
            handlings,
            categories_to_count,
            max_time_to_add,
            reevaluate_at,
        }
    }

    fn decide(
        &mut self,
        app: &ForegroundApp,
        handling: AppBaseHandling,
        consulted: &mut BTreeMap<CategoryId, Arc<CategoryItselfHandling>>,
    ) -> AppDecision {
        let mut decision = AppDecision {
            app: app.clone(),
            handling,
            reason: BlockingReason::None,
            notification_reason: BlockingReason::None,
            blocking_category: None,
            level: None,
        };

        match &decision.handling {
            AppBaseHandling::BlockDueToNoCategory => {
                decision.reason = BlockingReason::NotPartOfAnCategory;
                decision.notification_reason = BlockingReason::NotPartOfAnCategory;
                decision.level = Some(BlockingLevel::App);
            }
            AppBaseHandling::UseCategories(chain) => {
                let mut notifications_blocked = false;

                for id in chain.category_ids() {
                    let Some(handling) = self.cache.get(id.as_str()) else {
                        continue;
                    };
                    consulted.insert(id.clone(), Arc::clone(&handling));

                    notifications_blocked |= handling.block_all_notifications;
                    if decision.blocking_category.is_none() && handling.should_block_activities() {
                        decision.reason = handling.activity_blocking_reason();
                        decision.blocking_category = Some(id.clone());
                    }
                }

                decision.level = Some(chain.level());
                decision.notification_reason = if decision.reason.is_blocking() {
                    decision.reason
                } else if notifications_blocked {
                    BlockingReason::NotificationsAreBlocked
                } else {
                    BlockingReason::None
                };
            }
            AppBaseHandling::Idle
            | AppBaseHandling::PauseLogic
            | AppBaseHandling::Whitelist
            | AppBaseHandling::TemporarilyAllowed => {}
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{category, child_category, day_of_epoch, millis, monday, rule, used, user_with};
    use warden_api::HandlingKind;
    use warden_config::{CategoryApp, CategoryNetworkId, CategoryRelatedData};
    use warden_host_api::ExactNetworkIdMatcher;
    use warden_util::{DaysOfWeek, MAX_MINUTE_OF_DAY};

    const MINUTE: i64 = 60_000;

    fn engine() -> BlockingEngine {
        BlockingEngine::new(Arc::new(ExactNetworkIdMatcher))
    }

    fn user(categories: Vec<CategoryRelatedData>, apps: &[(&str, &str)]) -> Arc<UserRelatedData> {
        let mut user = user_with(categories);
        for (package, category_id) in apps {
            user.category_apps.insert(
                package.to_string(),
                CategoryApp {
                    package_name: package.to_string(),
                    category_id: CategoryId::new(*category_id),
                },
            );
        }
        Arc::new(user)
    }

    fn context<'a>(user: &'a Arc<UserRelatedData>, device: &'a DeviceRelatedData, now: i64) -> EvaluationContext<'a> {
        EvaluationContext {
            user,
            device,
            battery: BatteryStatus::default(),
            now,
            network_id: None,
            pause_foreground_app_loop: false,
            pause_counting: false,
        }
    }

    fn games_with_quota(max_millis: i64) -> CategoryRelatedData {
        let mut games = child_category("games", "all");
        games.rules.push(rule("games", DaysOfWeek::ALL_DAYS.bits(), 0, MAX_MINUTE_OF_DAY, max_millis));
        games
    }

    #[test]
    fn test_allowed_app_is_counted() {
        let user = user(
            vec![category("all"), games_with_quota(30 * MINUTE)],
            &[("com.example.game", "games")],
        );
        let device = DeviceRelatedData::default();
        let mut engine = engine();

        let report = engine.evaluate(&context(&user, &device, monday(10, 0)), &[ForegroundApp::new("com.example.game")]);

        assert!(!report.any_blocked());
        let decision = &report.decisions[0];
        assert_eq!(decision.reason, BlockingReason::None);
        assert_eq!(decision.level, Some(BlockingLevel::App));
        // only the category with rules counts time
        assert_eq!(report.categories_to_count, BTreeSet::from([CategoryId::new("games")]));
        assert_eq!(report.max_time_to_add, 30 * MINUTE);
        assert_eq!(report.reevaluate_at, Some(millis(2025, 12, 30, 0, 0)));
        assert_eq!(report.handlings.len(), 2);
    }

    #[test]
    fn test_parent_category_blocks_child() {
        let now = monday(10, 0);
        let mut all = category("all");
        all.rules.push(rule("all", DaysOfWeek::MONDAY, 0, MAX_MINUTE_OF_DAY, 60 * MINUTE));
        all.used_times.push(used("all", day_of_epoch(now), 0, MAX_MINUTE_OF_DAY, 60 * MINUTE));
        let user = user(vec![all, child_category("games", "all")], &[("com.example.game", "games")]);
        let device = DeviceRelatedData::default();

        let report = engine().evaluate(&context(&user, &device, now), &[ForegroundApp::new("com.example.game")]);

        let decision = &report.decisions[0];
        assert_eq!(decision.reason, BlockingReason::TimeOver);
        assert_eq!(decision.notification_reason, BlockingReason::TimeOver);
        assert_eq!(decision.blocking_category, Some(CategoryId::new("all")));
        assert!(report.any_blocked());
    }

    #[test]
    fn test_leaf_reason_wins() {
        let mut all = category("all");
        all.category.temporarily_blocked = true;
        let mut games = child_category("games", "all");
        games.category.min_battery_level_mobile = 50;
        let user = user(vec![all, games], &[("com.example.game", "games")]);
        let device = DeviceRelatedData::default();
        let mut ctx = context(&user, &device, monday(10, 0));
        ctx.battery = BatteryStatus::new(20, false);

        let report = engine().evaluate(&ctx, &[ForegroundApp::new("com.example.game")]);

        let decision = &report.decisions[0];
        assert_eq!(decision.reason, BlockingReason::BatteryLimit);
        assert_eq!(decision.blocking_category, Some(CategoryId::new("games")));
    }

    #[test]
    fn test_unassigned_app() {
        let user = user(vec![category("all")], &[]);
        let device = DeviceRelatedData::default();

        let report = engine().evaluate(
            &context(&user, &device, monday(10, 0)),
            &[ForegroundApp::new("com.example.unknown")],
        );

        let decision = &report.decisions[0];
        assert_eq!(decision.handling, AppBaseHandling::BlockDueToNoCategory);
        assert_eq!(decision.reason, BlockingReason::NotPartOfAnCategory);
        assert!(report.handlings.is_empty());
        assert_eq!(report.reevaluate_at, None);
    }

    #[test]
    fn test_notifications_blocked_without_blocking_app() {
        let mut all = category("all");
        all.category.block_all_notifications = true;
        let user = user(vec![all], &[("com.example.chat", "all")]);
        let device = DeviceRelatedData::default();

        let report = engine().evaluate(&context(&user, &device, monday(10, 0)), &[ForegroundApp::new("com.example.chat")]);

        let decision = &report.decisions[0];
        assert_eq!(decision.reason, BlockingReason::None);
        assert_eq!(decision.notification_reason, BlockingReason::NotificationsAreBlocked);
        assert!(!report.any_blocked());
    }

    #[test]
    fn test_network_only_passed_when_needed() {
        let mut school = category("school");
        school.networks.push(CategoryNetworkId {
            item_id: "school".into(),
            hashed_network_id: "school-net".into(),
        });
        let user = user(
            vec![category("all"), school],
            &[("com.example.game", "all"), ("com.example.homework", "school")],
        );
        let device = DeviceRelatedData::default();
        let mut ctx = context(&user, &device, monday(10, 0));
        ctx.network_id = Some("home-net");
        let mut engine = engine();

        let report = engine.evaluate(&ctx, &[ForegroundApp::new("com.example.homework")]);
        assert_eq!(report.decisions[0].reason, BlockingReason::MissingRequiredNetwork);

        ctx.network_id = Some("school-net");
        let report = engine.evaluate(&ctx, &[ForegroundApp::new("com.example.homework")]);
        assert_eq!(report.decisions[0].reason, BlockingReason::None);

        let report = engine.evaluate(&ctx, &[ForegroundApp::new("com.example.game")]);
        assert_eq!(report.decisions[0].reason, BlockingReason::None);
    }

    #[test]
    fn test_pause_counting_keeps_enforcing() {
        let now = monday(10, 0);
        let mut games = games_with_quota(30 * MINUTE);
        games.used_times.push(used("games", day_of_epoch(now), 0, MAX_MINUTE_OF_DAY, 30 * MINUTE));
        let user = user(vec![category("all"), games], &[("com.example.game", "games")]);
        let device = DeviceRelatedData::default();
        let mut ctx = context(&user, &device, now);
        ctx.pause_counting = true;

        let report = engine().evaluate(&ctx, &[ForegroundApp::new("com.example.game")]);

        assert_eq!(report.decisions[0].reason, BlockingReason::TimeOver);
        assert!(report.categories_to_count.is_empty());
        assert_eq!(report.max_time_to_add, i64::MAX);
    }

    #[test]
    fn test_paused_loop_blocks_nothing() {
        let user = user(vec![category("all")], &[]);
        let device = DeviceRelatedData::default();
        let mut ctx = context(&user, &device, monday(10, 0));
        ctx.pause_foreground_app_loop = true;

        let report = engine().evaluate(&ctx, &[ForegroundApp::new("com.example.unknown")]);

        assert_eq!(report.decisions[0].handling, AppBaseHandling::PauseLogic);
        assert!(!report.any_blocked());
    }

    #[test]
    fn test_results_are_reused_until_invalid() {
        let user = user(
            vec![category("all"), games_with_quota(30 * MINUTE)],
            &[("com.example.game", "games")],
        );
        let device = DeviceRelatedData::default();
        let mut engine = engine();
        let apps = [ForegroundApp::new("com.example.game")];

        let first = engine.evaluate(&context(&user, &device, monday(10, 0)), &apps);
        let second = engine.evaluate(&context(&user, &device, monday(10, 1)), &apps);
        assert!(Arc::ptr_eq(&first.handlings["games"], &second.handlings["games"]));
        assert_eq!(engine.cached_categories(), 2);

        let next_day = engine.evaluate(&context(&user, &device, millis(2025, 12, 30, 0, 1)), &apps);
        assert!(!Arc::ptr_eq(&first.handlings["games"], &next_day.handlings["games"]));
    }

    #[test]
    fn test_view_conversion() {
        let user = user(
            vec![category("all"), games_with_quota(30 * MINUTE)],
            &[("com.example.game", "games")],
        );
        let device = DeviceRelatedData::default();
        let apps = [ForegroundApp::new("com.example.game"), ForegroundApp::idle()];

        let view = engine().evaluate(&context(&user, &device, monday(10, 0)), &apps).to_view();

        assert_eq!(view.apps.len(), 2);
        assert_eq!(view.apps[0].handling, HandlingKind::UseCategories);
        assert_eq!(view.apps[0].category_ids, vec![CategoryId::new("games"), CategoryId::new("all")]);
        assert_eq!(view.apps[1].handling, HandlingKind::Idle);
        assert_eq!(view.max_time_to_add, Some(30 * MINUTE));
        assert_eq!(view.categories_to_count, vec![CategoryId::new("games")]);
    }
}
