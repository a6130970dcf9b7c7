//! App Core for promptshelf.
//!
//! Composition root: builds one subscription bus, one entity store and the
//! services sharing them. The store lives as long as the session; `logout`
//! tears it down.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::managers::entity_store::EntityStore;
use crate::managers::optimistic_mutator::OptimisticMutator;
use crate::managers::scheduled_task::ScheduledTask;
use crate::managers::session_manager::{AuthGate, SessionManager};
use crate::managers::subscription_bus::SubscriptionBus;
use crate::services::api_client::{EngagementApi, HttpEngagementApi};
use crate::services::bookmark_service::BookmarkService;
use crate::services::category_service::CategoryService;
use crate::services::invalidation::Invalidator;
use crate::services::like_service::LikeService;
use crate::services::trending_ranker::{TrendingRanker, TrendingRotation};
use crate::types::errors::{ApiError, EngagementError};
use crate::types::session::UserIdentity;
use crate::types::settings::ClientSettings;

/// Central application struct holding the store and all services.
pub struct App {
    pub settings: ClientSettings,
    pub bus: Arc<SubscriptionBus>,
    pub store: Arc<EntityStore>,
    pub session: Arc<SessionManager>,
    pub mutator: OptimisticMutator,
    pub invalidator: Arc<Invalidator>,
    pub bookmarks: BookmarkService,
    pub categories: CategoryService,
    pub likes: LikeService,
    pub trending: Arc<TrendingRanker>,
    pub rotation: Arc<TrendingRotation>,
}

impl App {
    /// Creates an App over an arbitrary backend, signed out.
    pub fn new(settings: ClientSettings, api: Arc<dyn EngagementApi>) -> Self {
        Self::with_session(settings, Arc::new(SessionManager::new()), api)
    }

    /// Creates an App talking HTTP to `settings.api.base_url`.
    pub fn connect(settings: ClientSettings) -> Result<Self, ApiError> {
        let session = Arc::new(SessionManager::new());
        let api = HttpEngagementApi::new(
            settings.api.base_url.clone(),
            Duration::from_secs(settings.api.request_timeout_secs),
            session.clone(),
        )?;
        tracing::info!(base_url = %settings.api.base_url, "backend client ready");
        Ok(Self::with_session(settings, session, Arc::new(api)))
    }

    pub fn with_session(
        settings: ClientSettings,
        session: Arc<SessionManager>,
        api: Arc<dyn EngagementApi>,
    ) -> Self {
        let bus = SubscriptionBus::new();
        let store = Arc::new(EntityStore::new(bus.clone()));
        let auth: Arc<dyn AuthGate> = session.clone();
        let mutator = OptimisticMutator::new();
        let invalidator = Arc::new(Invalidator::new(store.clone(), api.clone(), auth.clone()));

        let bookmarks = BookmarkService::new(
            store.clone(),
            mutator.clone(),
            api.clone(),
            auth.clone(),
            invalidator.clone(),
        );
        let categories = CategoryService::new(
            store.clone(),
            api.clone(),
            auth.clone(),
            invalidator.clone(),
            settings.categories.clone(),
        );
        let likes = LikeService::new(store.clone(), mutator.clone(), api.clone(), auth);
        let trending = Arc::new(TrendingRanker::new(api, bus.clone(), settings.trending.clone()));

        Self {
            settings,
            bus,
            store,
            session,
            mutator,
            invalidator,
            bookmarks,
            categories,
            likes,
            trending,
            rotation: TrendingRotation::new(),
        }
    }

    /// Opens the session and loads the bookmark and category lists.
    ///
    /// The session is open once this returns; the returned future resolves
    /// when both lists are loaded.
    pub fn login(&self, user: UserIdentity) -> impl Future<Output = Result<(), EngagementError>> + Send + 'static {
        if self.session.is_authenticated() {
            self.store.clear();
        }
        self.session.login(user);
        let invalidator = self.invalidator.clone();
        async move {
            let (categories, bookmarks) = tokio::join!(
                invalidator.refresh_categories(),
                invalidator.refresh_bookmarks()
            );
            let categories = categories?;
            let bookmarks = bookmarks?;
            tracing::info!(
                bookmarks = bookmarks.len(),
                categories = categories.len(),
                "session state loaded"
            );
            Ok(())
        }
    }

    /// Closes the session and drops every cached engagement entity.
    /// Mutations still in flight resolve without touching the new state.
    pub fn logout(&self) -> Option<UserIdentity> {
        let previous = self.session.logout();
        self.store.clear();
        previous
    }

    /// Loads the trending list now and keeps refreshing it until the returned
    /// handle is dropped.
    pub fn start_background(&self) -> ScheduledTask {
        let ranker = self.trending.clone();
        tokio::spawn(async move {
            ranker.refresh().await;
        });
        self.trending.start_auto_refresh()
    }

    /// Starts the highlighted-entry rotation over the trending list.
    pub fn start_rotation(&self) -> ScheduledTask {
        self.rotation.start(self.trending.clone())
    }
}
