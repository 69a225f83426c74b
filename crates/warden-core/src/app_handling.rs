//! Classification of a foreground app

use std::collections::BTreeSet;
use warden_api::{BlockingLevel, HandlingKind};
use warden_config::{DeviceRelatedData, NOT_ASSIGNED_SYSTEM_IMAGE_APP, UserRelatedData};
use warden_util::CategoryId;

/// An app reported as running in the foreground
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForegroundApp {
    pub package_name: Option<String>,
    pub activity_name: Option<String>,
    /// Part of the system image rather than installed by the user
    pub is_system_image_app: bool,
}

impl ForegroundApp {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: Some(package_name.into()),
            ..Default::default()
        }
    }

    pub fn with_activity(mut self, activity_name: impl Into<String>) -> Self {
        self.activity_name = Some(activity_name.into());
        self
    }

    pub fn system_image(mut self) -> Self {
        self.is_system_image_app = true;
        self
    }

    /// No app in the foreground
    pub fn idle() -> Self {
        Self::default()
    }
}

/// A category and its ancestors, leaf first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryChain {
    category_ids: Vec<CategoryId>,
    should_count: bool,
    level: BlockingLevel,
    needs_network_id: bool,
}

impl CategoryChain {
    /// Panics if `category_ids` is empty.
    pub fn new(category_ids: Vec<CategoryId>, should_count: bool, level: BlockingLevel, needs_network_id: bool) -> Self {
        assert!(!category_ids.is_empty(), "category chain must not be empty");

        Self {
            category_ids,
            should_count,
            level,
            needs_network_id,
        }
    }

    pub fn category_ids(&self) -> &[CategoryId] {
        &self.category_ids
    }

    /// The category the app is assigned to
    pub fn leaf(&self) -> &CategoryId {
        &self.category_ids[0]
    }

    pub fn should_count(&self) -> bool {
        self.should_count
    }

    pub fn level(&self) -> BlockingLevel {
        self.level
    }

    pub fn needs_network_id(&self) -> bool {
        self.needs_network_id
    }
}

/// How a foreground app is handled before looking at category state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppBaseHandling {
    Idle,
    PauseLogic,
    Whitelist,
    TemporarilyAllowed,
    BlockDueToNoCategory,
    UseCategories(CategoryChain),
}

impl AppBaseHandling {
    pub fn calculate(
        app: &ForegroundApp,
        pause_foreground_app_loop: bool,
        pause_counting: bool,
        user: &UserRelatedData,
        device: &DeviceRelatedData,
    ) -> Self {
        if pause_foreground_app_loop {
            return Self::PauseLogic;
        }

        let Some(package_name) = app.package_name.as_deref() else {
            return Self::Idle;
        };

        let ignored_activity = app
            .activity_name
            .as_deref()
            .is_some_and(|activity| device.is_ignored_activity(package_name, activity));
        if package_name == device.own_package_name || device.ignored_apps.contains(package_name) || ignored_activity {
            return Self::Whitelist;
        }

        if device.temporarily_allowed_apps.contains(package_name) {
            return Self::TemporarilyAllowed;
        }

        let app_level = user.find_category_app(package_name).or_else(|| {
            if app.is_system_image_app {
                user.find_category_app(NOT_ASSIGNED_SYSTEM_IMAGE_APP)
            } else {
                None
            }
        });
        let assignment = match app.activity_name.as_deref() {
            Some(activity) if device.enable_activity_level_blocking => user
                .find_category_app(&format!("{}:{}", package_name, activity))
                .or(app_level),
            _ => app_level,
        };

        let start = assignment
            .and_then(|assignment| user.category(assignment.category_id.as_str()))
            .or_else(|| {
                user.user
                    .category_for_not_assigned_apps
                    .as_ref()
                    .and_then(|id| user.category(id.as_str()))
            });

        let Some(start) = start else {
            return Self::BlockDueToNoCategory;
        };

        let category_ids = user.category_with_parent_categories(start.id());
        let needs_network_id = category_ids
            .iter()
            .filter_map(|id| user.category(id.as_str()))
            .any(|category| !category.networks.is_empty());
        let level = match assignment {
            Some(assignment) if !assignment.specifies_activity() => BlockingLevel::App,
            _ => BlockingLevel::Activity,
        };

        Self::UseCategories(CategoryChain::new(
            category_ids,
            !pause_counting,
            level,
            needs_network_id,
        ))
    }

    pub fn kind(&self) -> HandlingKind {
        match self {
            Self::Idle => HandlingKind::Idle,
            Self::PauseLogic => HandlingKind::PauseLogic,
            Self::Whitelist => HandlingKind::Whitelist,
            Self::TemporarilyAllowed => HandlingKind::TemporarilyAllowed,
            Self::BlockDueToNoCategory => HandlingKind::BlockDueToNoCategory,
            Self::UseCategories(_) => HandlingKind::UseCategories,
        }
    }

    pub fn category_chain(&self) -> Option<&CategoryChain> {
        match self {
            Self::UseCategories(chain) => Some(chain),
            _ => None,
        }
    }

    pub fn needs_network_id(&self) -> bool {
        self.category_chain().is_some_and(CategoryChain::needs_network_id)
    }

    /// Every category usage should be counted for, across all handlings
    pub fn categories_for_counting(handlings: &[AppBaseHandling]) -> BTreeSet<CategoryId> {
        handlings
            .iter()
            .filter_map(Self::category_chain)
            .filter(|chain| chain.should_count())
            .flat_map(|chain| chain.category_ids().iter().cloned())
            .collect()
    }
}
