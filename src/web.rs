use crate::{
    DefinitionResolver, Dictionary, DictionaryError, KeyValueStore, Page, PopoverConfig,
    PopoverHandle, PreferenceState, ResolvedEntry, Theme, WordList, WordPopover, WordSpan,
    merge_theme,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

type SharedState = Arc<AppState>;

pub struct AppState {
    pub dictionary: Arc<Dictionary>,
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub dictionary: PathBuf,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            dictionary: PathBuf::from("dict.json"),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
    Dictionary(DictionaryError),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
            WebError::Dictionary(err) => write!(f, "dictionary error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

impl From<DictionaryError> for WebError {
    fn from(value: DictionaryError) -> Self {
        WebError::Dictionary(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let dictionary = Dictionary::open(&config.dictionary)?;
    info!(
        path = %config.dictionary.display(),
        entries = dictionary.len(),
        "Dictionary loaded"
    );
    let state = Arc::new(AppState {
        dictionary: Arc::new(dictionary),
    });
    let router = build_router(state);
    info!(%config.addr, "Binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

/// Preferences carried in request cookies; changes become `Set-Cookie`
/// headers on the response.
#[derive(Debug, Clone, Default)]
pub struct CookieStore {
    jar: CookieJar,
}

impl CookieStore {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = CookieJar::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(text) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(text.to_owned()).flatten() {
                jar.add_original(cookie);
            }
        }
        Self { jar }
    }

    pub fn apply_changes(&self, response: &mut Response) {
        for cookie in self.jar.delta() {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(err) => warn!(name = cookie.name(), error = %err, "skipping unencodable cookie"),
            }
        }
    }
}

impl KeyValueStore for CookieStore {
    fn get(&self, name: &str) -> Option<String> {
        self.jar.get(name).map(|cookie| cookie.value().to_string())
    }

    fn set(&mut self, name: &str, value: &str) {
        self.jar.add(
            Cookie::build((name.to_string(), value.to_string()))
                .path("/")
                .permanent(),
        );
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/popover", get(api_popover))
        .route("/api/popover/config", get(api_popover_config))
        .route("/api/theme", get(api_theme))
        .route("/api/definition", get(api_definition))
        .route("/api/preferences", get(get_preferences).post(set_preferences))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "lexitip-web" }))
}

#[derive(Debug, Deserialize)]
struct PopoverParams {
    word: String,
    lemma: Option<String>,
    #[serde(default)]
    classes: String,
    theme: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PopoverPayload {
    show: bool,
    content: Option<String>,
    theme: String,
}

/// The popover the browser is about to display, as described by a request.
struct RequestPopover {
    word: WordSpan,
    theme: String,
    content: Option<String>,
}

impl PopoverHandle for RequestPopover {
    fn theme(&self) -> &str {
        &self.theme
    }

    fn set_theme(&mut self, classes: String) {
        self.theme = classes;
    }

    fn set_content(&mut self, html: String) {
        self.content = Some(html);
    }
}

impl WordPopover for RequestPopover {
    fn reference(&self) -> &WordSpan {
        &self.word
    }
}

async fn api_popover(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<PopoverParams>,
) -> Json<PopoverPayload> {
    let page = Page::new(CookieStore::from_headers(&headers));
    let mut word = WordSpan::new(params.word).with_class_list(&params.classes);
    if let Some(lemma) = params.lemma {
        word = word.with_lemma(lemma);
    }
    let mut popover = RequestPopover {
        word,
        theme: params
            .theme
            .unwrap_or_else(|| PopoverConfig::DEFINITION_THEME.to_string()),
        content: None,
    };
    let resolver = DefinitionResolver::new(&state.dictionary);
    let decision = page.on_word_popover_show(&mut popover, &resolver);
    Json(PopoverPayload {
        show: decision.is_shown(),
        content: popover.content,
        theme: popover.theme,
    })
}

#[derive(Debug, Deserialize)]
struct ThemeParams {
    #[serde(default)]
    classes: String,
}

async fn api_theme(headers: HeaderMap, Query(params): Query<ThemeParams>) -> impl IntoResponse {
    let page = Page::new(CookieStore::from_headers(&headers));
    Json(json!({
        "theme": merge_theme(page.theme(), &params.classes),
    }))
}

async fn api_popover_config() -> impl IntoResponse {
    Json(json!({
        "definition": PopoverConfig::definition(),
        "help": PopoverConfig::help(),
    }))
}

#[derive(Debug, Deserialize)]
struct DefinitionParams {
    key: String,
}

async fn api_definition(
    State(state): State<SharedState>,
    Query(params): Query<DefinitionParams>,
) -> Result<Json<ResolvedEntry>, ApiError> {
    DefinitionResolver::new(&state.dictionary)
        .explain(&params.key)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No definition for {:?}", params.key)))
}

async fn get_preferences(headers: HeaderMap) -> Json<PreferenceState> {
    Json(Page::new(CookieStore::from_headers(&headers)).state())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceUpdate {
    word_list: Option<String>,
    theme: Option<String>,
}

async fn set_preferences(
    headers: HeaderMap,
    Json(update): Json<PreferenceUpdate>,
) -> Result<Response, ApiError> {
    let word_list = update
        .word_list
        .map(|value| value.parse::<WordList>())
        .transpose()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    let theme = update
        .theme
        .map(|value| value.parse::<Theme>())
        .transpose()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let mut page = Page::new(CookieStore::from_headers(&headers));
    if let Some(word_list) = word_list {
        page.change_word_list(word_list);
    }
    if let Some(theme) = theme {
        page.change_theme(theme);
    }
    let mut response = Json(page.state()).into_response();
    page.store().apply_changes(&mut response);
    Ok(response)
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let dictionary = Dictionary::from_pairs([
            ("run", "v\trun quickly\nn\ta fast pace"),
            ("ran", ">run"),
        ])
        .unwrap();
        build_router(Arc::new(AppState {
            dictionary: Arc::new(dictionary),
        }))
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn popover_shows_for_listed_word() {
        let response = test_router()
            .oneshot(
                Request::get("/api/popover?word=ran&classes=word+ielts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let payload: PopoverPayload = json_body(response).await;
        assert!(payload.show);
        assert_eq!(payload.theme, "light-border definition-popup");
        assert!(payload.content.unwrap().contains("<span class=\"pos\">n</span>"));
    }

    #[tokio::test]
    async fn popover_respects_cookie_preferences() {
        let response = test_router()
            .oneshot(
                Request::get("/api/popover?word=ran&classes=word+ielts")
                    .header(header::COOKIE, "wordList=off; theme=dark")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let payload: PopoverPayload = json_body(response).await;
        assert!(!payload.show);
        assert_eq!(payload.content, None);
        assert_eq!(payload.theme, "dark definition-popup");
    }

    #[tokio::test]
    async fn theme_endpoint_merges_classes() {
        let response = test_router()
            .oneshot(
                Request::get("/api/theme?classes=light-border+help-popup")
                    .header(header::COOKIE, "theme=dark")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let payload: serde_json::Value = json_body(response).await;
        assert_eq!(payload["theme"], "dark help-popup");
    }

    #[tokio::test]
    async fn definition_endpoint_reports_missing_keys() {
        let response = test_router()
            .oneshot(
                Request::get("/api/definition?key=walk")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preferences_update_sets_cookies() {
        let response = test_router()
            .oneshot(
                Request::post("/api/preferences")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::COOKIE, "theme=light")
                    .body(Body::from(r#"{"theme":"dark","wordList":"cet6"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().any(|c| c.starts_with("theme=dark")));
        assert!(cookies.iter().any(|c| c.starts_with("wordList=cet6")));
        let payload: serde_json::Value = json_body(response).await;
        assert_eq!(payload["theme"], "dark");
        assert_eq!(payload["wordList"], "cet6");
    }

    #[tokio::test]
    async fn preferences_reject_unknown_values() {
        let response = test_router()
            .oneshot(
                Request::post("/api/preferences")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"theme":"purple"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn preferences_clamp_invalid_cookies() {
        let response = test_router()
            .oneshot(
                Request::get("/api/preferences")
                    .header(header::COOKIE, "theme=purple; wordList=cet6")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let payload: serde_json::Value = json_body(response).await;
        assert_eq!(payload["theme"], "light");
        assert_eq!(payload["wordList"], "cet6");
    }
}
