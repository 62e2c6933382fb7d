//! HTTP surface.
//!
//! Routes:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Index page |
//! | `GET` | `/<host>/<org>/<repo>[@<ver>]` | Module list, or the queued page |
//! | `GET` | `/<host>/<org>/<repo>[@<ver>]/<module>[/<file>]` | Artifact bytes, or the queued page |
//! | `GET` | `/subscribe/<same-path>` | `text/event-stream`, emits `ready` once modules are available |
//!
//! The queued page is a 200: the build is in progress and the embedded
//! script reloads the page when the subscribe stream reports readiness.

use std::convert::Infallible;
use std::io::Read;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use tracing::{error, info};

use crate::pool::{fingerprint, JobKind, WorkerPool};
use crate::repository::{Cached, DocsRepository};
use crate::service::{DocsService, ServiceError};
use crate::source::{ParseError, RemoteSource};

/// Shared state handed to every route handler.
#[derive(Clone)]
struct AppState {
    service: DocsService,
    pool: WorkerPool,
}

/// Build the application router.
#[must_use]
pub fn router(service: DocsService, pool: WorkerPool) -> Router {
    let state = AppState { service, pool };
    Router::new()
        .route("/", get(index))
        .route("/subscribe/{*path}", get(subscribe))
        .fallback(get(docs))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    host: &str,
    port: u16,
    service: DocsService,
    pool: WorkerPool,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(service, pool);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(%host, port, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> Html<String> {
    Html(page(
        "docharbor",
        "<h1>docharbor</h1>\
         <p>On-demand documentation for remote Zig modules.</p>\
         <p>Browse <code>/&lt;host&gt;/&lt;org&gt;/&lt;repo&gt;[@&lt;version&gt;]</code> \
         to list a repository's modules, or \
         <code>/&lt;host&gt;/&lt;org&gt;/&lt;repo&gt;/&lt;module&gt;</code> \
         for one module's documentation. Supported hosts: github.com, gitlab.com.</p>",
    ))
}

async fn docs(State(state): State<AppState>, uri: Uri) -> Response {
    let source = match RemoteSource::parse(uri.path()) {
        Ok(source) => source,
        Err(e) => return parse_error_response(&e),
    };

    if source.module.is_empty() {
        modules_page(&state, &source)
    } else {
        resource_response(&state, &source).await
    }
}

fn modules_page(state: &AppState, source: &RemoteSource) -> Response {
    match state.service.modules(source) {
        Ok(Cached::Ready(names)) => Html(render_modules(source, &names)).into_response(),
        Ok(Cached::Queued) => Html(render_queued(source)).into_response(),
        Err(e) => service_error_response(&e),
    }
}

async fn resource_response(state: &AppState, source: &RemoteSource) -> Response {
    let resource = match state.service.resource(source) {
        Ok(Cached::Ready(resource)) => resource,
        Ok(Cached::Queued) => return Html(render_queued(source)).into_response(),
        Err(e) => return service_error_response(&e),
    };

    let read = tokio::task::spawn_blocking(move || {
        let mut file = resource.file;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok::<_, std::io::Error>((bytes, resource.content_type))
    })
    .await;

    match read {
        Ok(Ok((bytes, content_type))) => {
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Ok(Err(e)) => {
            error!(%source, error = %e, "reading artifact failed");
            internal_error()
        }
        Err(e) => {
            error!(%source, error = %e, "read task failed");
            internal_error()
        }
    }
}

async fn subscribe(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri
        .path()
        .strip_prefix("/subscribe")
        .unwrap_or_else(|| uri.path());
    let source = match RemoteSource::parse(path) {
        Ok(source) => source,
        Err(e) => return parse_error_response(&e),
    };

    let repository = state.service.repository().clone();
    let pool = state.pool.clone();
    let stream = futures::stream::once(async move {
        if wait_until_ready(&repository, &pool, &source).await {
            Some(Ok::<_, Infallible>(Event::default().event("ready").data("{}")))
        } else {
            None
        }
    })
    .filter_map(|item| async move { item });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Wait for the artifact to become available.
///
/// Returns `false` once no relevant job remains in flight while the artifact
/// is still absent (a failed or skipped build); the stream then closes
/// silently and the client is free to retry.
async fn wait_until_ready(
    repository: &DocsRepository,
    pool: &WorkerPool,
    source: &RemoteSource,
) -> bool {
    let latest_key = fingerprint(JobKind::SyncLatest, &source.repository, &source.version);
    let repo_key = fingerprint(JobKind::SyncRepository, &source.repository, &source.version);
    loop {
        let notified = pool.completions().notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if repository.is_ready(source) {
            return true;
        }
        let in_flight = pool.is_running(&latest_key)
            || pool.is_running(&repo_key)
            || (source.is_latest() && pool.has_repository_sync(&source.repository));
        if !in_flight {
            return false;
        }
        notified.await;
    }
}

fn parse_error_response(error: &ParseError) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
}

fn service_error_response(error: &ServiceError) -> Response {
    match error {
        ServiceError::ModuleNotFound(_) | ServiceError::UnrecognizedFileExtension(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
        other => {
            error!(error = %other, "request failed");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error".to_string(),
    )
        .into_response()
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

fn render_modules(source: &RemoteSource, names: &[String]) -> String {
    let items: String = names
        .iter()
        .map(|name| {
            format!(
                "<li><a href=\"/{repo}@{version}/{name}\">{name}</a></li>\n",
                repo = source.repository,
                version = source.version,
            )
        })
        .collect();
    page(
        &source.repository,
        &format!(
            "<h1>{repo} <small>{version}</small></h1>\n<ul>\n{items}</ul>",
            repo = source.repository,
            version = source.version,
        ),
    )
}

fn render_queued(source: &RemoteSource) -> String {
    page(
        "Build queued",
        &format!(
            "<h1>Documentation build queued</h1>\n\
             <p>{source} is being synced. This page reloads when it is ready.</p>\n\
             <script>\n\
             const events = new EventSource(\"/subscribe/{repo}@{version}\");\n\
             events.addEventListener(\"ready\", () => {{\n\
               events.close();\n\
               location.reload();\n\
             }});\n\
             </script>",
            repo = source.repository,
            version = source.version,
        ),
    )
}
