use axum::Router;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Instant;

use crate::blacklist::UrlBlacklist;
use crate::error::Error;
use crate::handlers;
use crate::memory::{InMemoryLabelStore, InMemoryMailStore, InMemoryUserStore};
use crate::store::{SharedLabelStore, SharedMailStore, SharedUserStore};

/// Everything a handler can reach
#[derive(Clone)]
pub struct AppState {
    pub users: SharedUserStore,
    pub labels: SharedLabelStore,
    pub mails: SharedMailStore,
    pub blacklist: Arc<dyn UrlBlacklist>,
}

impl AppState {
    pub fn new(
        users: SharedUserStore,
        labels: SharedLabelStore,
        mails: SharedMailStore,
        blacklist: Arc<dyn UrlBlacklist>,
    ) -> Self {
        Self {
            users,
            labels,
            mails,
            blacklist,
        }
    }

    /// Fresh in-memory stores
    pub fn in_memory(blacklist: Arc<dyn UrlBlacklist>) -> Self {
        Self::new(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryLabelStore::new()),
            Arc::new(InMemoryMailStore::new()),
            blacklist,
        )
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/users", post(handlers::register))
        .route("/api/users/:id", get(handlers::get_user))
        .route("/api/tokens", post(handlers::login))
        .route(
            "/api/labels",
            get(handlers::list_labels).post(handlers::create_label),
        )
        .route(
            "/api/labels/:id",
            get(handlers::get_label)
                .patch(handlers::update_label)
                .delete(handlers::delete_label),
        )
        .route(
            "/api/mails",
            get(handlers::inbox).post(handlers::create_mail),
        )
        .route("/api/mails/search/", get(handlers::missing_search_query))
        .route("/api/mails/search/:query", get(handlers::search_mails))
        .route(
            "/api/mails/:id",
            get(handlers::get_mail)
                .patch(handlers::update_mail)
                .delete(handlers::delete_mail),
        )
        .route("/api/mails/:id/labels", put(handlers::set_mail_labels))
        .fallback(|| async { Error::not_found("Not found") })
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request<B>(req: Request<B>, next: Next<B>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Serve the API on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> hyper::Result<()>
where
    F: Future<Output = ()>,
{
    let addr = listener.local_addr().ok();
    let server = axum::Server::from_tcp(listener)?
        .serve(router(state).into_make_service())
        .with_graceful_shutdown(shutdown);

    if let Some(addr) = addr {
        tracing::info!("webmail API listening on http://{}", addr);
    }
    server.await
}
