use crate::domain::models::{AmbientSound, FocusTechnique, MotivationalMessage};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::learning_api_client::LearningApiClient;
use log::{debug, warn};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum FeedState<T> {
    Idle,
    Loading,
    Ready(T),
    Unavailable,
}

impl<T> Default for FeedState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> FeedState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselKey {
    Left,
    Right,
}

impl CarouselKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "arrowleft" | "prev" | "previous" => Some(Self::Left),
            "right" | "arrowright" | "next" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Keyboard-navigable list of focus techniques; wraps around at both ends.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FocusTechniqueCarousel {
    techniques: Vec<FocusTechnique>,
    index: usize,
}

impl FocusTechniqueCarousel {
    pub fn new(techniques: Vec<FocusTechnique>) -> Self {
        Self {
            techniques,
            index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&FocusTechnique> {
        self.techniques.get(self.index)
    }

    pub fn next(&mut self) -> Option<&FocusTechnique> {
        if !self.is_empty() {
            self.index = (self.index + 1) % self.len();
        }
        self.current()
    }

    pub fn previous(&mut self) -> Option<&FocusTechnique> {
        if !self.is_empty() {
            self.index = (self.index + self.len() - 1) % self.len();
        }
        self.current()
    }

    pub fn handle_key(&mut self, key: CarouselKey) -> Option<&FocusTechnique> {
        match key {
            CarouselKey::Left => self.previous(),
            CarouselKey::Right => self.next(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationBoard {
    pub ambient_sound: FeedState<AmbientSound>,
    pub motivational_message: FeedState<MotivationalMessage>,
    pub focus_techniques: FeedState<FocusTechniqueCarousel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feed {
    AmbientSound,
    MotivationalMessage,
    FocusTechniques,
}

impl Feed {
    fn label(self) -> &'static str {
        match self {
            Self::AmbientSound => "ambient sound",
            Self::MotivationalMessage => "motivational message",
            Self::FocusTechniques => "focus techniques",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

// The board plus, per feed, the id of the newest request. Only the newest
// request may write its slot.
#[derive(Debug, Default)]
struct BoardCell {
    board: RecommendationBoard,
    requests: [u64; 3],
}

/// Fire-and-forget fetchers. Callers get a `JoinHandle` they are free to drop;
/// timer state never waits on these.
#[derive(Clone)]
pub struct RecommendationFeeds {
    api: Arc<dyn LearningApiClient>,
    cell: Arc<Mutex<BoardCell>>,
    active_session: watch::Receiver<Option<String>>,
}

impl RecommendationFeeds {
    pub fn new(
        api: Arc<dyn LearningApiClient>,
        active_session: watch::Receiver<Option<String>>,
    ) -> Self {
        Self {
            api,
            cell: Arc::new(Mutex::new(BoardCell::default())),
            active_session,
        }
    }

    pub fn board(&self) -> RecommendationBoard {
        lock_cell(&self.cell).board.clone()
    }

    pub fn refresh_ambient_sound(&self, mood: &str) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let mood = mood.to_string();
        self.spawn_fetch(
            Feed::AmbientSound,
            true,
            async move { api.recommend_ambient_sound(&mood).await },
            |board| &mut board.ambient_sound,
        )
    }

    pub fn refresh_motivational_message(&self, category: &str) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let category = category.to_string();
        self.spawn_fetch(
            Feed::MotivationalMessage,
            true,
            async move { api.random_motivational_message(&category).await },
            |board| &mut board.motivational_message,
        )
    }

    pub fn load_focus_techniques(&self) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        self.spawn_fetch(
            Feed::FocusTechniques,
            false,
            async move {
                api.list_focus_techniques()
                    .await
                    .map(FocusTechniqueCarousel::new)
            },
            |board| &mut board.focus_techniques,
        )
    }

    pub fn cycle_technique(&self, key: CarouselKey) -> Option<FocusTechnique> {
        let mut cell = lock_cell(&self.cell);
        match &mut cell.board.focus_techniques {
            FeedState::Ready(carousel) => carousel.handle_key(key).cloned(),
            _ => None,
        }
    }

    // A result is dropped when a newer request for the same feed exists. A
    // session-bound result is also dropped once its session is no longer
    // active; the slot then falls back to Idle.
    fn spawn_fetch<T, Fut, S>(
        &self,
        feed: Feed,
        session_bound: bool,
        fetch: Fut,
        slot: S,
    ) -> JoinHandle<()>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, InfraError>> + Send + 'static,
        S: Fn(&mut RecommendationBoard) -> &mut FeedState<T> + Send + 'static,
    {
        let requested_for = self.active_session.borrow().clone();
        let request = {
            let mut cell = lock_cell(&self.cell);
            cell.requests[feed.index()] += 1;
            *slot(&mut cell.board) = FeedState::Loading;
            cell.requests[feed.index()]
        };

        let shared = Arc::clone(&self.cell);
        let active_session = self.active_session.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            let stale = session_bound && *active_session.borrow() != requested_for;

            let mut cell = lock_cell(&shared);
            if cell.requests[feed.index()] != request {
                debug!("dropping {} result superseded by a newer request", feed.label());
                return;
            }
            let state = if stale {
                debug!("discarding stale {} result for session {requested_for:?}", feed.label());
                FeedState::Idle
            } else {
                match result {
                    Ok(value) => FeedState::Ready(value),
                    Err(error) => {
                        warn!("{} feed unavailable: {error}", feed.label());
                        FeedState::Unavailable
                    }
                }
            };
            *slot(&mut cell.board) = state;
        })
    }
}

fn lock_cell(cell: &Mutex<BoardCell>) -> MutexGuard<'_, BoardCell> {
    match cell.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
