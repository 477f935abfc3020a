//! Page view state machines
//!
//! The listing page moves `Loading -> {Loaded, Empty, Errored}` and the
//! detail page moves `Loading -> {Ready, NotFound, Unavailable, Errored}`.
//! Both are terminal after one fetch; neither retries.

use crate::db::{run_blocking, GameRecord, GameStore};
use crate::error::FetchError;
use crate::registry::{GameRegistry, GameUnit, UnitHandle};
use hyper::StatusCode;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where the views fetch game records from
pub trait GameSource: Send + Sync {
    fn list_games(&self) -> impl Future<Output = Result<Vec<GameRecord>, FetchError>> + Send;

    fn find_game(&self, id: i64) -> impl Future<Output = Result<Option<GameRecord>, FetchError>> + Send;
}

/// Reads straight from the in-process store
#[derive(Clone)]
pub struct LocalSource {
    store: Arc<dyn GameStore>,
}

impl LocalSource {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }
}

impl GameSource for LocalSource {
    async fn list_games(&self) -> Result<Vec<GameRecord>, FetchError> {
        Ok(run_blocking(Arc::clone(&self.store), |s| s.list_games()).await?)
    }

    async fn find_game(&self, id: i64) -> Result<Option<GameRecord>, FetchError> {
        Ok(run_blocking(Arc::clone(&self.store), move |s| s.get_game(id)).await?)
    }
}

/// Escape text for inclusion in HTML content or attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Parse a route segment into an id. Only the canonical decimal form of an
/// id matches, so "01" or "+1" never find record 1.
pub fn parse_game_id(segment: &str) -> Option<i64> {
    segment
        .parse::<i64>()
        .ok()
        .filter(|id| id.to_string() == segment)
}

const BACK_LINK: &str = r#"<a href="/" class="back-link">Back to Games</a>"#;

fn status_block(class: &str, message: &str, back_link: bool) -> String {
    let link = if back_link { BACK_LINK } else { "" };
    format!(
        r#"<div class="{class}"><p>{message}</p>{link}</div>"#,
        class = class,
        message = message,
        link = link
    )
}

// ==================== Listing ====================

#[derive(Debug, Clone, PartialEq)]
pub enum ListingState {
    Loading,
    Loaded(Vec<GameRecord>),
    Empty,
    Errored(String),
}

/// The game picker page
#[derive(Debug)]
pub struct ListingView {
    state: ListingState,
}

impl Default for ListingView {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingView {
    pub fn new() -> Self {
        Self {
            state: ListingState::Loading,
        }
    }

    pub fn state(&self) -> &ListingState {
        &self.state
    }

    /// Fetch the catalog once. Does nothing outside the loading state.
    pub async fn load<S: GameSource>(&mut self, source: &S) {
        if self.state != ListingState::Loading {
            return;
        }

        self.state = match source.list_games().await {
            Ok(games) if games.is_empty() => ListingState::Empty,
            Ok(games) => {
                debug!(count = games.len(), "Games loaded");
                ListingState::Loaded(games)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch games");
                ListingState::Errored(e.to_string())
            }
        };
    }

    pub fn status_code(&self) -> StatusCode {
        match self.state {
            ListingState::Errored(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::OK,
        }
    }

    pub fn render(&self) -> String {
        match &self.state {
            ListingState::Loading => {
                status_block("home-page-status", "Loading awesome games... 🎮", false)
            }
            ListingState::Errored(message) => status_block(
                "home-page-status home-page-error",
                &format!("Oops! Couldn't load games: {} 😭", escape_html(message)),
                false,
            ),
            ListingState::Empty => status_block(
                "home-page-status",
                "No games available right now. Check back soon! ✨",
                false,
            ),
            ListingState::Loaded(games) => {
                let cards: String = games.iter().map(render_card).collect();
                format!(
                    r#"<div class="home-page">
    <header class="home-page-header">
        <h1>Choose Your Adventure!</h1>
        <p>Pick a game below and let the fun begin!</p>
    </header>
    <div class="game-list">
{cards}    </div>
    <footer class="home-page-footer">
        <p>More fun games coming soon! 🚀</p>
    </footer>
</div>"#,
                    cards = cards
                )
            }
        }
    }
}

fn render_card(game: &GameRecord) -> String {
    let title = escape_html(&game.title);
    format!(
        r#"        <a href="/game/{id}" class="game-card-link">
            <div class="game-card">
                <div class="game-card-image-container">
                    <img src="{icon}" alt="{title} game icon" class="game-card-icon">
                </div>
                <div class="game-card-content">
                    <h3 class="game-card-title">{title}</h3>
                    <p class="game-card-description">{description}</p>
                </div>
                <div class="game-card-play-button-container">
                    <span class="game-card-play-button">Play Now ✨</span>
                </div>
            </div>
        </a>
"#,
        id = game.id,
        icon = escape_html(&game.icon_url),
        title = title,
        description = escape_html(game.description.as_deref().unwrap_or_default()),
    )
}

// ==================== Detail ====================

/// A record whose unit was found in the registry
pub struct ReadyGame {
    pub game: GameRecord,
    pub handle: UnitHandle,
    unit: Option<Arc<dyn GameUnit>>,
}

impl ReadyGame {
    pub fn is_mounted(&self) -> bool {
        self.unit.is_some()
    }
}

pub enum DetailState {
    Loading,
    Ready(ReadyGame),
    NotFound,
    Unavailable(GameRecord),
    Errored(String),
}

/// Discriminant of [`DetailState`] for logging and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailPhase {
    Loading,
    Ready,
    NotFound,
    Unavailable,
    Errored,
}

/// The page hosting a single game
pub struct DetailView {
    game_id: String,
    state: DetailState,
}

impl DetailView {
    /// `game_id` is the raw route segment
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            state: DetailState::Loading,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn phase(&self) -> DetailPhase {
        match self.state {
            DetailState::Loading => DetailPhase::Loading,
            DetailState::Ready(_) => DetailPhase::Ready,
            DetailState::NotFound => DetailPhase::NotFound,
            DetailState::Unavailable(_) => DetailPhase::Unavailable,
            DetailState::Errored(_) => DetailPhase::Errored,
        }
    }

    /// Look the game up and resolve its unit. Does nothing outside the
    /// loading state.
    pub async fn load<S: GameSource>(&mut self, source: &S, registry: &GameRegistry) {
        if !matches!(self.state, DetailState::Loading) {
            return;
        }

        let Some(id) = parse_game_id(&self.game_id) else {
            debug!(game_id = %self.game_id, "Not a game id");
            self.state = DetailState::NotFound;
            return;
        };

        self.state = match source.find_game(id).await {
            Err(e) => {
                warn!(game_id = id, error = %e, "Failed to fetch game details");
                DetailState::Errored(e.to_string())
            }
            Ok(None) => DetailState::NotFound,
            Ok(Some(game)) => match registry.resolve(&game.game_component_path) {
                Some(handle) => DetailState::Ready(ReadyGame {
                    game,
                    handle,
                    unit: None,
                }),
                None => {
                    warn!(
                        game_id = id,
                        path = %game.game_component_path,
                        "No game unit registered for component path"
                    );
                    DetailState::Unavailable(game)
                }
            },
        };
    }

    /// Materialise the resolved unit. Until this completes a ready page
    /// shows the loading fallback.
    pub async fn mount(&mut self) {
        if let DetailState::Ready(ready) = &mut self.state {
            if ready.unit.is_none() {
                let unit = ready.handle.load().await;
                debug!(unit = unit.name(), game_id = ready.game.id, "Game unit mounted");
                ready.unit = Some(unit);
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.state {
            DetailState::Loading | DetailState::Ready(_) => StatusCode::OK,
            DetailState::NotFound => StatusCode::NOT_FOUND,
            DetailState::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DetailState::Errored(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Title for the page shell
    pub fn title(&self) -> String {
        match &self.state {
            DetailState::Ready(ready) => ready.game.title.clone(),
            DetailState::Unavailable(game) => game.title.clone(),
            DetailState::NotFound => "Game not found".to_string(),
            _ => "Kids Games".to_string(),
        }
    }

    /// Markup for the current state. A ready game that is not mounted yet
    /// shows the "Starting game engine" fallback; server-rendered pages
    /// call `mount` first, so they are only sent once the unit is ready.
    pub fn render(&self) -> String {
        match &self.state {
            DetailState::Loading => {
                status_block("game-page-status", "Loading your game... 🚀", false)
            }
            DetailState::Errored(message) => status_block(
                "game-page-status game-page-error",
                &format!("Oops! Could not load game: {} 😢", escape_html(message)),
                true,
            ),
            DetailState::NotFound => status_block(
                "game-page-status game-page-not-found",
                "Game not found. It might have been removed.",
                true,
            ),
            DetailState::Unavailable(_) => status_block(
                "game-page-status game-page-error",
                "This game is currently not available or configured incorrectly. 🛠️",
                true,
            ),
            DetailState::Ready(ready) => {
                let content = match &ready.unit {
                    Some(unit) => unit.render(),
                    None => status_block("game-page-status", "Starting game engine...⚙️", false),
                };
                format!(
                    r#"<div class="game-page">
    <header class="game-page-header">
        <a href="/" class="back-link"><span role="img" aria-label="Back arrow">←</span> Back to All Games</a>
        <h1>{title}</h1>
    </header>
    <main class="game-content-area">
{content}
    </main>
</div>"#,
                    title = escape_html(&ready.game.title),
                    content = content
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{default_catalog, Database, NUMBER_GUESS_PATH};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source with call counting and optional failure
    struct FakeSource {
        games: Vec<GameRecord>,
        fail_with: Option<u16>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_games(games: Vec<GameRecord>) -> Self {
            Self {
                games,
                fail_with: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                games: Vec::new(),
                fail_with: Some(status),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl GameSource for FakeSource {
        async fn list_games(&self) -> Result<Vec<GameRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(status) => Err(FetchError::Status(status)),
                None => Ok(self.games.clone()),
            }
        }

        async fn find_game(&self, id: i64) -> Result<Option<GameRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(status) => Err(FetchError::Status(status)),
                None => Ok(self.games.iter().find(|g| g.id == id).cloned()),
            }
        }
    }

    fn number_guess_record() -> GameRecord {
        GameRecord {
            id: 1,
            title: "Number Guessing Game".to_string(),
            description: Some("Guess the secret number between 1 and 100!".to_string()),
            icon_url: "/assets/game_icon.png".to_string(),
            game_component_path: NUMBER_GUESS_PATH.to_string(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_parse_game_id() {
        assert_eq!(parse_game_id("1"), Some(1));
        assert_eq!(parse_game_id("-3"), Some(-3));
        assert_eq!(parse_game_id("01"), None);
        assert_eq!(parse_game_id("+1"), None);
        assert_eq!(parse_game_id("abc"), None);
        assert_eq!(parse_game_id(""), None);
    }

    #[tokio::test]
    async fn test_listing_loaded() {
        let source = FakeSource::with_games(vec![number_guess_record()]);
        let mut view = ListingView::new();
        assert_eq!(view.state(), &ListingState::Loading);
        assert!(view.render().contains("Loading awesome games"));

        view.load(&source).await;
        assert_eq!(view.state(), &ListingState::Loaded(vec![number_guess_record()]));
        assert_eq!(view.status_code(), StatusCode::OK);

        let html = view.render();
        assert!(html.contains(r#"href="/game/1""#));
        assert!(html.contains("Number Guessing Game"));
        assert!(html.contains(r#"src="/assets/game_icon.png""#));
        assert!(html.contains("Guess the secret number between 1 and 100!"));
    }

    #[tokio::test]
    async fn test_listing_empty_is_not_error() {
        let source = FakeSource::with_games(Vec::new());
        let mut view = ListingView::new();
        view.load(&source).await;

        assert_eq!(view.state(), &ListingState::Empty);
        assert_eq!(view.status_code(), StatusCode::OK);
        assert!(view.render().contains("No games available right now"));
        assert!(!view.render().contains("Oops"));
    }

    #[tokio::test]
    async fn test_listing_errored_shows_message() {
        let source = FakeSource::failing(500);
        let mut view = ListingView::new();
        view.load(&source).await;

        assert_eq!(
            view.state(),
            &ListingState::Errored("HTTP error! status: 500".to_string())
        );
        assert_eq!(view.status_code(), StatusCode::BAD_GATEWAY);
        assert!(view
            .render()
            .contains("Oops! Couldn't load games: HTTP error! status: 500"));
    }

    #[tokio::test]
    async fn test_listing_is_terminal() {
        let source = FakeSource::failing(503);
        let mut view = ListingView::new();
        view.load(&source).await;
        view.load(&source).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listing_escapes_titles() {
        let mut game = number_guess_record();
        game.title = "<script>alert(1)</script>".to_string();
        let source = FakeSource::with_games(vec![game]);
        let mut view = ListingView::new();
        view.load(&source).await;

        let html = view.render();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_detail_ready_then_mounted() {
        let source = FakeSource::with_games(vec![number_guess_record()]);
        let registry = GameRegistry::with_builtin_games();
        let mut view = DetailView::new("1");
        assert_eq!(view.phase(), DetailPhase::Loading);

        view.load(&source, &registry).await;
        assert_eq!(view.phase(), DetailPhase::Ready);
        assert_eq!(view.status_code(), StatusCode::OK);
        assert_eq!(view.title(), "Number Guessing Game");

        // Until mounted the content area shows the fallback
        let pending = view.render();
        assert!(pending.contains("Starting game engine"));
        assert!(pending.contains("Back to All Games"));

        view.mount().await;
        match view.state() {
            DetailState::Ready(ready) => assert!(ready.is_mounted()),
            _ => panic!("expected ready state"),
        }
        let html = view.render();
        assert!(!html.contains("Starting game engine"));
        assert!(html.contains("number-guess-form"));
    }

    #[tokio::test]
    async fn test_detail_unknown_id_is_not_found() {
        let source = FakeSource::with_games(vec![number_guess_record()]);
        let registry = GameRegistry::with_builtin_games();

        for id in ["999", "0", "01", "abc", ""] {
            let mut view = DetailView::new(id);
            view.load(&source, &registry).await;
            assert_eq!(view.phase(), DetailPhase::NotFound, "id {:?}", id);
            assert_eq!(view.status_code(), StatusCode::NOT_FOUND);
            let html = view.render();
            assert!(html.contains("Game not found"));
            assert!(html.contains(r#"href="/""#));
        }
    }

    #[tokio::test]
    async fn test_detail_unregistered_path_is_unavailable() {
        let source = FakeSource::with_games(vec![number_guess_record()]);
        let mut registry = GameRegistry::with_builtin_games();
        registry.unregister(NUMBER_GUESS_PATH);

        let mut view = DetailView::new("1");
        view.load(&source, &registry).await;
        assert_eq!(view.phase(), DetailPhase::Unavailable);
        assert_eq!(view.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        // Mounting an unavailable game is a no-op
        view.mount().await;
        assert_eq!(view.phase(), DetailPhase::Unavailable);
        assert!(view.render().contains("not available or configured incorrectly"));
    }

    #[tokio::test]
    async fn test_detail_fetch_failure_is_errored() {
        let source = FakeSource::failing(502);
        let registry = GameRegistry::with_builtin_games();
        let mut view = DetailView::new("1");
        view.load(&source, &registry).await;

        assert_eq!(view.phase(), DetailPhase::Errored);
        let html = view.render();
        assert!(html.contains("Oops! Could not load game: HTTP error! status: 502"));
        assert!(html.contains("Back to Games"));
    }

    #[tokio::test]
    async fn test_detail_invalid_id_skips_fetch() {
        let source = FakeSource::with_games(vec![number_guess_record()]);
        let registry = GameRegistry::with_builtin_games();
        let mut view = DetailView::new("not-a-number");
        view.load(&source, &registry).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_local_source_reads_store() {
        let db = Database::open_in_memory().unwrap();
        db.seed_if_empty(&default_catalog()).unwrap();
        let source = LocalSource::new(Arc::new(db));

        let games = source.list_games().await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(source.find_game(1).await.unwrap().unwrap().title, "Number Guessing Game");
        assert!(source.find_game(2).await.unwrap().is_none());
    }
}
