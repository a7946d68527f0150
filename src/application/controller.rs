use crate::application::recommendations::{CarouselKey, RecommendationBoard, RecommendationFeeds};
use crate::application::session_factory::SessionFactory;
use crate::application::ticker::{TickerFlow, TickerGuard};
use crate::domain::models::{
    FocusTechnique, Session, SessionHistoryEntry, SessionOutcome, SessionType, TimerSettings,
};
use crate::domain::scheduler::{FocusScheduler, SchedulerSnapshot, StartRequest, TickOutcome};
use crate::infrastructure::learning_api_client::LearningApiClient;
use crate::infrastructure::session_history_repository::SessionHistoryRepository;
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// One per mounted screen. Cloning shares the same scheduler.
#[derive(Clone)]
pub struct SchedulerController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    scheduler: Mutex<FocusScheduler>,
    factory: SessionFactory,
    feeds: RecommendationFeeds,
    history: Arc<dyn SessionHistoryRepository>,
    active_session: watch::Sender<Option<String>>,
    ticker: StdMutex<Option<TickerGuard>>,
    tick_period: Option<Duration>,
}

impl SchedulerController {
    pub fn new(
        settings: TimerSettings,
        api: Arc<dyn LearningApiClient>,
        history: Arc<dyn SessionHistoryRepository>,
    ) -> Self {
        Self::build(settings, api, history, Some(TICK_PERIOD))
    }

    /// No tick source is spawned; the owner drives [`Self::tick`] itself.
    pub fn without_ticker(
        settings: TimerSettings,
        api: Arc<dyn LearningApiClient>,
        history: Arc<dyn SessionHistoryRepository>,
    ) -> Self {
        Self::build(settings, api, history, None)
    }

    fn build(
        settings: TimerSettings,
        api: Arc<dyn LearningApiClient>,
        history: Arc<dyn SessionHistoryRepository>,
        tick_period: Option<Duration>,
    ) -> Self {
        let (active_session, active_receiver) = watch::channel(None);
        Self {
            inner: Arc::new(ControllerInner {
                scheduler: Mutex::new(FocusScheduler::new(settings)),
                factory: SessionFactory::new(Arc::clone(&api)),
                feeds: RecommendationFeeds::new(api, active_receiver),
                history,
                active_session,
                ticker: StdMutex::new(None),
                tick_period,
            }),
        }
    }

    pub async fn snapshot(&self) -> SchedulerSnapshot {
        self.inner.scheduler.lock().await.snapshot()
    }

    pub async fn is_running(&self) -> bool {
        self.inner.scheduler.lock().await.is_running()
    }

    pub async fn settings(&self) -> TimerSettings {
        self.inner.scheduler.lock().await.settings().clone()
    }

    pub async fn update_settings(&self, settings: TimerSettings) {
        self.inner.scheduler.lock().await.update_settings(settings);
    }

    /// Loads the focus technique carousel. Call once the screen is shown.
    pub fn mount(&self) -> JoinHandle<()> {
        self.inner.feeds.load_focus_techniques()
    }

    /// Releases the tick source and discards whatever session is active.
    pub async fn unmount(&self) {
        self.stop().await;
    }

    pub async fn start(&self, session_type: SessionType) -> SchedulerSnapshot {
        let snapshot = self.begin_session(session_type).await;
        if snapshot.is_running {
            self.acquire_ticker();
        }
        snapshot
    }

    pub async fn pause(&self) -> SchedulerSnapshot {
        let mut scheduler = self.inner.scheduler.lock().await;
        if scheduler.pause() {
            self.release_ticker();
            info!("paused at {}s remaining", scheduler.remaining_seconds());
        }
        scheduler.snapshot()
    }

    pub async fn resume(&self) -> SchedulerSnapshot {
        let snapshot = {
            let mut scheduler = self.inner.scheduler.lock().await;
            if !scheduler.resume() {
                return scheduler.snapshot();
            }
            scheduler.snapshot()
        };
        self.acquire_ticker();
        info!("resumed at {}s remaining", snapshot.remaining_seconds);
        snapshot
    }

    pub async fn stop(&self) -> SchedulerSnapshot {
        self.release_ticker();
        let mut scheduler = self.inner.scheduler.lock().await;
        if let Some(stopped) = scheduler.stop() {
            self.publish_active(None);
            info!("stopped {} session id={}", stopped.session_type.as_str(), stopped.id);
            self.record(&stopped, SessionOutcome::Stopped);
        }
        scheduler.snapshot()
    }

    pub async fn reset_counters(&self) -> SchedulerSnapshot {
        let mut scheduler = self.inner.scheduler.lock().await;
        scheduler.reset_counters();
        scheduler.snapshot()
    }

    /// One countdown step. A natural completion records the session and,
    /// when the policy proposes one, fulfils the follow-up request the
    /// scheduler issued with it. A start or stop that lands first wins.
    pub async fn tick(&self) -> TickOutcome {
        let outcome = self.inner.scheduler.lock().await.tick();
        match &outcome {
            TickOutcome::Completed(completion) => {
                self.publish_active(None);
                info!(
                    "completed {} session id={}",
                    completion.session.session_type.as_str(),
                    completion.session.id
                );
                self.record(&completion.session, SessionOutcome::Completed);
                if let Some(next) = &completion.next {
                    self.fulfil(next.clone()).await;
                }
            }
            TickOutcome::Counting { remaining_seconds } => {
                debug!("tick: {remaining_seconds}s remaining");
            }
            TickOutcome::Ignored => {}
        }
        outcome
    }

    pub fn recommendations(&self) -> RecommendationBoard {
        self.inner.feeds.board()
    }

    pub async fn refresh_ambient_sound(&self) -> JoinHandle<()> {
        let tag = self.current_tag().await;
        self.inner.feeds.refresh_ambient_sound(tag)
    }

    pub async fn refresh_motivational_message(&self) -> JoinHandle<()> {
        let tag = self.current_tag().await;
        self.inner.feeds.refresh_motivational_message(tag)
    }

    pub fn reload_focus_techniques(&self) -> JoinHandle<()> {
        self.inner.feeds.load_focus_techniques()
    }

    pub fn cycle_focus_technique(&self, key: CarouselKey) -> Option<FocusTechnique> {
        self.inner.feeds.cycle_technique(key)
    }

    async fn current_tag(&self) -> &'static str {
        self.inner
            .scheduler
            .lock()
            .await
            .active_session()
            .map(|session| session.session_type)
            .unwrap_or(SessionType::Focus)
            .recommendation_tag()
    }

    async fn begin_session(&self, session_type: SessionType) -> SchedulerSnapshot {
        let request = self.inner.scheduler.lock().await.request_start(session_type);
        if let Some(discarded) = &request.discarded {
            self.publish_active(None);
            self.record(discarded, SessionOutcome::Stopped);
        }
        self.fulfil(request).await
    }

    async fn fulfil(&self, request: StartRequest) -> SchedulerSnapshot {
        let session_type = request.session_type;
        let created = self
            .inner
            .factory
            .create(session_type, request.duration_minutes)
            .await;
        let origin = created.origin();
        let session = created.into_session();
        let session_id = session.id.clone();

        let mut scheduler = self.inner.scheduler.lock().await;
        if scheduler.activate(&request, session) {
            info!(
                "started {} session id={session_id} origin={} duration={}m",
                session_type.as_str(),
                origin.as_str(),
                request.duration_minutes
            );
            self.publish_active(Some(session_id));
            let tag = session_type.recommendation_tag();
            self.inner.feeds.refresh_ambient_sound(tag);
            self.inner.feeds.refresh_motivational_message(tag);
        } else {
            debug!("dropping superseded {} session id={session_id}", session_type.as_str());
        }
        scheduler.snapshot()
    }

    fn acquire_ticker(&self) {
        let Some(period) = self.inner.tick_period else {
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let guard = TickerGuard::spawn(period, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return TickerFlow::Stop;
                };
                let controller = SchedulerController { inner };
                let outcome = controller.tick().await;
                let follow_up = matches!(
                    &outcome,
                    TickOutcome::Completed(completion) if completion.next.is_some()
                );
                match (controller.is_running().await, follow_up) {
                    (false, _) => TickerFlow::Stop,
                    (true, true) => TickerFlow::Rearm,
                    (true, false) => TickerFlow::Continue,
                }
            }
        });
        *self.ticker_slot() = Some(guard);
    }

    fn release_ticker(&self) {
        self.ticker_slot().take();
    }

    fn ticker_slot(&self) -> StdMutexGuard<'_, Option<TickerGuard>> {
        match self.inner.ticker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish_active(&self, session_id: Option<String>) {
        self.inner.active_session.send_replace(session_id);
    }

    fn record(&self, session: &Session, outcome: SessionOutcome) {
        let entry = SessionHistoryEntry::from_session(session, outcome, Utc::now());
        if let Err(error) = self.inner.history.record(&entry) {
            warn!("failed to record session history for {}: {error}", session.id);
        }
    }
}
