//! Web portal pages
//!
//! Serves the game picker and per-game pages, the embedded stylesheet and
//! files from the assets directory.

use crate::client::GamesClient;
use crate::db::GameRecord;
use crate::error::FetchError;
use crate::registry::GameRegistry;
use crate::views::{escape_html, DetailView, GameSource, ListingView, LocalSource};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Data source for the pages: the local store or a remote games API
#[derive(Clone)]
pub enum PortalSource {
    Local(LocalSource),
    Remote(GamesClient),
}

impl GameSource for PortalSource {
    async fn list_games(&self) -> Result<Vec<GameRecord>, FetchError> {
        match self {
            PortalSource::Local(source) => source.list_games().await,
            PortalSource::Remote(client) => GameSource::list_games(client).await,
        }
    }

    async fn find_game(&self, id: i64) -> Result<Option<GameRecord>, FetchError> {
        match self {
            PortalSource::Local(source) => source.find_game(id).await,
            PortalSource::Remote(client) => client.find_game(id).await,
        }
    }
}

/// Render the game picker
pub async fn listing_page<S: GameSource>(source: &S) -> Response<Full<Bytes>> {
    let mut view = ListingView::new();
    view.load(source).await;
    html_response(view.status_code(), page("Kids Games", &view.render()))
}

/// Render the page for one game
pub async fn detail_page<S: GameSource>(
    source: &S,
    registry: &GameRegistry,
    game_id: &str,
) -> Response<Full<Bytes>> {
    let mut view = DetailView::new(game_id);
    view.load(source, registry).await;
    view.mount().await;
    debug!(game_id, phase = ?view.phase(), "Detail page rendered");
    html_response(view.status_code(), page(&view.title(), &view.render()))
}

/// Serve the portal stylesheet
pub fn serve_css() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/css")
        .body(Full::new(Bytes::from(PORTAL_CSS)))
        .expect("valid response with StatusCode enum and static header")
}

/// Serve a file from the assets directory
pub async fn serve_asset(assets_dir: &Path, relative: &str) -> Response<Full<Bytes>> {
    let Some(path) = asset_path(assets_dir, relative) else {
        warn!(path = relative, "Rejected asset path");
        return not_found_page();
    };

    match tokio::fs::read(&path).await {
        Ok(contents) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type_for(&path))
            .body(Full::new(Bytes::from(contents)))
            .expect("valid response with StatusCode enum and static header"),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Asset not readable");
            not_found_page()
        }
    }
}

/// Page for routes that do not exist
pub fn not_found_page() -> Response<Full<Bytes>> {
    html_response(
        StatusCode::NOT_FOUND,
        page(
            "Not found",
            r#"<div class="home-page-status"><p>This page does not exist.</p><a href="/" class="back-link">Back to Games</a></div>"#,
        ),
    )
}

/// Resolve `relative` inside `assets_dir`, refusing anything that could
/// escape it
fn asset_path(assets_dir: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty() {
        return None;
    }
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(assets_dir.join(relative))
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("html") => "text/html; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn html_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .expect("valid response with StatusCode enum and static header")
}

/// Wrap a rendered view in the document shell
pub fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" href="/portal.css">
</head>
<body>
    <div class="app-container">
{body}
    </div>
</body>
</html>
"#,
        title = escape_html(title),
        body = body
    )
}

const PORTAL_CSS: &str = r#":root {
    --color-tomato: #ff6347;
    --color-steel-blue: #4682b4;
    --color-gold: #ffd700;
    --color-lime-green: #32cd32;
    --color-white: #ffffff;
    --color-black: #000000;
    --color-background-light: #f9f9f9;
    --font-primary: "Comic Neue", "Trebuchet MS", sans-serif;
    --font-headings: "Baloo 2", "Trebuchet MS", sans-serif;
}

body {
    margin: 0;
    background: #fffaf0;
    font-family: var(--font-primary);
}

.app-container {
    min-height: 100vh;
}

.home-page, .game-page {
    padding: 20px;
    margin: 0 auto;
}

.home-page { max-width: 1200px; }
.game-page { max-width: 1000px; }

.home-page-header {
    text-align: center;
    margin-bottom: 40px;
}

.home-page-header h1, .game-page-header h1 {
    font-family: var(--font-headings);
    color: var(--color-tomato);
    font-size: 3em;
    margin-bottom: 10px;
}

.home-page-header p {
    color: var(--color-steel-blue);
    font-size: 1.2em;
}

.game-list {
    display: grid;
    grid-template-columns: repeat(auto-fill, minmax(300px, 1fr));
    gap: 30px;
}

.game-card-link {
    text-decoration: none;
    color: inherit;
    display: block;
    transition: transform 0.3s ease;
}

.game-card {
    background-color: var(--color-white);
    border-radius: 15px;
    box-shadow: 0 8px 16px rgba(0, 0, 0, 0.1);
    overflow: hidden;
    display: flex;
    flex-direction: column;
    height: 100%;
}

.game-card-link:hover .game-card {
    transform: translateY(-5px);
    box-shadow: 0 12px 24px rgba(0, 0, 0, 0.15);
}

.game-card-image-container {
    background-color: var(--color-gold);
    display: flex;
    justify-content: center;
    align-items: center;
    height: 180px;
}

.game-card-icon {
    max-width: 100px;
    max-height: 100px;
    object-fit: contain;
}

.game-card-content {
    padding: 20px;
    flex-grow: 1;
    text-align: center;
}

.game-card-title {
    font-family: var(--font-headings);
    color: var(--color-tomato);
    font-size: 1.6em;
    margin: 0 0 10px;
}

.game-card-description {
    color: var(--color-steel-blue);
    line-height: 1.5;
}

.game-card-play-button-container {
    padding: 0 20px 20px;
}

.game-card-play-button {
    display: block;
    background-color: var(--color-lime-green);
    color: var(--color-white);
    font-weight: bold;
    text-align: center;
    padding: 12px 20px;
    border-radius: 25px;
}

.home-page-footer {
    text-align: center;
    margin-top: 50px;
    padding: 20px;
    color: var(--color-steel-blue);
    border-top: 1px solid #eee;
}

.game-page-header {
    display: flex;
    flex-direction: column;
    align-items: center;
    margin-bottom: 30px;
}

.back-link {
    display: inline-flex;
    align-items: center;
    gap: 8px;
    color: var(--color-steel-blue);
    text-decoration: none;
    font-size: 1.1em;
    padding: 8px 15px;
    border-radius: 20px;
    background-color: #f0f0f0;
    align-self: flex-start;
}

.back-link:hover {
    background-color: var(--color-gold);
    color: var(--color-black);
}

.game-content-area {
    background-color: var(--color-background-light);
    border-radius: 10px;
    padding: 20px;
    box-shadow: 0 4px 12px rgba(0, 0, 0, 0.08);
}

.home-page-status, .game-page-status {
    text-align: center;
    font-size: 1.5em;
    color: var(--color-steel-blue);
    padding: 50px 20px;
    min-height: 300px;
    display: flex;
    flex-direction: column;
    justify-content: center;
    align-items: center;
    gap: 20px;
}

.home-page-error p, .game-page-error p {
    color: var(--color-tomato);
}

.number-guess {
    text-align: center;
}

.number-guess-form input {
    font-size: 1.4em;
    width: 6em;
    padding: 8px;
    border-radius: 10px;
    border: 2px solid var(--color-steel-blue);
}

.btn {
    font-size: 1.1em;
    padding: 10px 20px;
    border-radius: 20px;
    border: none;
    cursor: pointer;
}

.btn-primary { background: var(--color-lime-green); color: var(--color-white); }
.btn-secondary { background: var(--color-gold); color: var(--color-black); }

.number-guess-feedback {
    font-size: 1.3em;
    color: var(--color-tomato);
    min-height: 1.5em;
}
"#;
