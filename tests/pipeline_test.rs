mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use helpers::{ChangeCounter, RecordingNavigator, bearer, client, serve, signed_in_client};
use membuddy_client::Error;
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Items endpoint that accepts only `valid` and counts every hit.
fn items_route(valid: &'static str, hits: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/api/memory/items",
        get(move |headers: HeaderMap| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                if bearer(&headers).as_deref() == Some(valid) {
                    Json(json!([{"id": 1, "content": "c", "memory_aids": []}])).into_response()
                } else {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"detail": "Not authenticated"})),
                    )
                        .into_response()
                }
            }
        }),
    )
}

fn refresh_route(hits: Arc<AtomicUsize>, succeed: bool) -> Router {
    Router::new().route(
        "/api/auth/refresh",
        post(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                if succeed {
                    Json(json!({
                        "access_token": "tok2",
                        "token_type": "bearer",
                        "refresh_token": "ref2",
                    }))
                    .into_response()
                } else {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"detail": "Invalid refresh token"})),
                    )
                        .into_response()
                }
            }
        }),
    )
}

#[tokio::test]
async fn bearer_attached_only_when_signed_in() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new().route(
        "/api/review/schedule",
        get({
            let seen = seen.clone();
            move |headers: HeaderMap| {
                let seen = seen.clone();
                async move {
                    seen.lock().push(bearer(&headers));
                    Json(json!([]))
                }
            }
        }),
    );
    let base = serve(router).await;

    client(base.clone()).get_review_schedule().await.unwrap();
    signed_in_client(base, "tok1", None)
        .get_review_schedule()
        .await
        .unwrap();

    assert_eq!(*seen.lock(), vec![None, Some("tok1".to_string())]);
}

#[tokio::test]
async fn unauthorized_refreshes_and_retries_once() {
    let item_hits = Arc::new(AtomicUsize::new(0));
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let router = items_route("tok2", item_hits.clone()).merge(refresh_route(refresh_hits.clone(), true));
    let api = signed_in_client(serve(router).await, "tok1", Some("ref1"));

    let items = api.get_memory_items().await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(item_hits.load(Ordering::SeqCst), 2);
    assert_eq!(refresh_hits.load(Ordering::SeqCst), 1);
    assert_eq!(api.session().token().as_deref(), Some("tok2"));
    assert_eq!(api.session().refresh_token().as_deref(), Some("ref2"));
}

#[tokio::test]
async fn failed_refresh_ends_session_once() {
    let item_hits = Arc::new(AtomicUsize::new(0));
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let router = items_route("never", item_hits.clone()).merge(refresh_route(refresh_hits.clone(), false));
    let nav = RecordingNavigator::at("/memory-library");
    let api = signed_in_client(serve(router).await, "tok1", Some("ref1")).with_navigator(nav.clone());
    let changes = ChangeCounter::attach(api.session());

    let err = api.get_memory_items().await.unwrap_err();

    assert!(matches!(err, Error::Unauthorized { .. }));
    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Unauthorized: Not authenticated");
    assert_eq!(item_hits.load(Ordering::SeqCst), 1);
    assert_eq!(refresh_hits.load(Ordering::SeqCst), 1);
    assert!(!api.session().is_authenticated());
    assert_eq!(changes.get(), 1);
    assert_eq!(nav.visits(), vec!["/auth/login"]);
}

#[tokio::test]
async fn refused_refresh_body_clears_once_and_fails() {
    let item_hits = Arc::new(AtomicUsize::new(0));
    let router = items_route("tok2", item_hits.clone()).route(
        "/api/auth/refresh",
        post(|| async { Json(json!({"detail": "ok", "token_type": "bearer"})) }),
    );
    let nav = RecordingNavigator::at("/memory-library");
    let api = signed_in_client(serve(router).await, "tok1", Some("ref1")).with_navigator(nav.clone());
    let changes = ChangeCounter::attach(api.session());

    let err = api.get_memory_items().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(item_hits.load(Ordering::SeqCst), 1);
    assert!(!api.session().is_authenticated());
    assert_eq!(changes.get(), 1);
    assert_eq!(nav.visits(), vec!["/auth/login"]);
}

#[tokio::test]
async fn retry_still_unauthorized_gives_up() {
    let item_hits = Arc::new(AtomicUsize::new(0));
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let router = items_route("never", item_hits.clone()).merge(refresh_route(refresh_hits.clone(), true));
    let nav = RecordingNavigator::at("/");
    let api = signed_in_client(serve(router).await, "tok1", Some("ref1")).with_navigator(nav.clone());

    let err = api.get_memory_items().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(item_hits.load(Ordering::SeqCst), 2);
    assert_eq!(refresh_hits.load(Ordering::SeqCst), 1);
    assert!(!api.session().is_authenticated());
    assert_eq!(nav.visits().len(), 1);
}

#[tokio::test]
async fn unauthorized_without_refresh_token_skips_refresh() {
    let item_hits = Arc::new(AtomicUsize::new(0));
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let router = items_route("never", item_hits.clone()).merge(refresh_route(refresh_hits.clone(), true));
    let api = signed_in_client(serve(router).await, "tok1", None);

    let err = api.get_memory_items().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(item_hits.load(Ordering::SeqCst), 1);
    assert_eq!(refresh_hits.load(Ordering::SeqCst), 0);
    assert!(!api.session().is_authenticated());
}

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_refresh() {
    let item_hits = Arc::new(AtomicUsize::new(0));
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let router = items_route("tok2", item_hits.clone()).merge(refresh_route(refresh_hits.clone(), true));
    let api = signed_in_client(serve(router).await, "tok1", Some("ref1"));

    let (a, b) = tokio::join!(api.get_memory_items(), api.get_memory_items());

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(refresh_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_status_carries_message_or_generic_text() {
    let router = Router::new()
        .route(
            "/api/memory/items/{id}",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"message": "Memory item not found"})),
                )
            }),
        )
        .route(
            "/api/memory/items",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
    let api = signed_in_client(serve(router).await, "tok1", None);

    let err = api.get_memory_item(&"42".into()).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Memory item not found");

    let err = api.get_memory_items().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "API error: 500");

    // Non-401 failures never touch the session.
    assert!(api.session().is_authenticated());
}

#[tokio::test]
async fn cancelled_scope_abandons_in_flight_call() {
    let router = Router::new().route(
        "/api/memory/items",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!([]))
        }),
    );
    let api = signed_in_client(serve(router).await, "tok1", None);
    let cancel = CancellationToken::new();
    let view = api.scoped(cancel.clone());

    let trigger = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(view.get_memory_items(), trigger);

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(api.session().is_authenticated());
}

#[tokio::test]
async fn cancellation_during_refresh_keeps_session() {
    let item_hits = Arc::new(AtomicUsize::new(0));
    let router = items_route("tok2", item_hits).route(
        "/api/auth/refresh",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::UNAUTHORIZED
        }),
    );
    let api = signed_in_client(serve(router).await, "tok1", Some("ref1"));
    let changes = ChangeCounter::attach(api.session());
    let cancel = CancellationToken::new();
    let view = api.scoped(cancel.clone());

    let trigger = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(view.get_memory_items(), trigger);

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(api.session().token().as_deref(), Some("tok1"));
    assert_eq!(changes.get(), 0);
}
