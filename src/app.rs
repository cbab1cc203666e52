use std::net::SocketAddr;

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth, bookings, properties, rate_limit, reviews, state::AppState};

pub fn build_app(state: AppState) -> Router {
    let limiter = state.limiter.clone();
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(properties::router())
                .merge(bookings::router())
                .merge(reviews::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = addr.parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::memory::{MemoryStore, Seed};

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        req.body(Body::empty()).unwrap()
    }

    async fn register(app: &Router, email: &str, role: &str) -> String {
        let (status, body) = call(
            app,
            json_request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                json!({
                    "email": email,
                    "password": "correct-horse",
                    "first_name": "Test",
                    "last_name": "User",
                    "role": role,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_ok() {
        let app = build_app(AppState::fake(MemoryStore::default()));
        let res = app
            .oneshot(get("/api/v1/health", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = build_app(AppState::fake(MemoryStore::default()));
        let (status, err) = call(&app, get("/api/v1/me", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(err["code"], "UNAUTHORIZED");
        assert_eq!(err["message"], "missing Authorization header");

        let (status, err) = call(&app, get("/api/v1/bookings", Some("not-a-jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(err["message"], "invalid or expired token");
    }

    #[tokio::test]
    async fn malformed_input_gets_a_json_error() {
        let store = MemoryStore::default();
        let seed = Seed::new(&store).await;
        let booking = seed
            .booking(
                crate::dates::DateRange::new(
                    time::macros::date!(2099 - 06 - 01),
                    time::macros::date!(2099 - 06 - 05),
                )
                .unwrap(),
            )
            .await;
        let app = build_app(AppState::fake(store));
        let token = register(&app, "typo@example.com", "guest").await;

        let (status, err) = call(
            &app,
            json_request(
                Method::PUT,
                &format!("/api/v1/bookings/{}", booking.id),
                Some(&token),
                json!({ "status": "archived" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "INVALID_INPUT");
        assert!(err["message"]
            .as_str()
            .unwrap()
            .contains("invalid booking status"));

        let (status, err) = call(&app, get("/api/v1/properties/not-a-uuid", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "INVALID_INPUT");

        let (status, err) = call(
            &app,
            get("/api/v1/properties/search?guests=many", None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn booking_flow_over_http() {
        let store = MemoryStore::default();
        let seed = Seed::new(&store).await;
        let app = build_app(AppState::fake(store));
        let token = register(&app, "traveller@example.com", "guest").await;

        let (status, me) = call(&app, get("/api/v1/me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "traveller@example.com");

        let property_uri = format!("/api/v1/properties/{}", seed.property.id);
        let (status, property) = call(&app, get(&property_uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(property["type"], "apartment");
        assert_eq!(property["status"], "active");

        let stay = json!({
            "property_id": seed.property.id,
            "check_in": "2099-06-01",
            "check_out": "2099-06-05",
            "guests": 2,
        });
        let (status, booking) = call(
            &app,
            json_request(Method::POST, "/api/v1/bookings", Some(&token), stay.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{booking}");
        assert_eq!(booking["status"], "pending");
        assert_eq!(booking["total_price"], 400.0);
        assert_eq!(booking["check_in"], "2099-06-01");

        let (status, err) = call(
            &app,
            json_request(Method::POST, "/api/v1/bookings", Some(&token), stay),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "CONFLICT");
        assert_eq!(
            err["message"],
            "property is not available for the selected dates"
        );

        let availability = format!(
            "{property_uri}/availability?check_in=2099-06-04&check_out=2099-06-06"
        );
        let (status, body) = call(&app, get(&availability, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], false);

        let (status, mine) = call(&app, get("/api/v1/bookings", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn booking_requests_are_rate_limited_per_client() {
        let store = MemoryStore::default();
        let seed = Seed::new(&store).await;
        let state = AppState::fake(store);
        let limits = crate::config::RateLimitConfig {
            enabled: true,
            booking: 1,
            ..state.config.rate_limit.clone()
        };
        let app = build_app(state.with_limiter(crate::rate_limit::RateLimiter::new(
            limits,
            Some(std::sync::Arc::new(
                crate::rate_limit::fakes::MemoryCounter::default(),
            )),
            std::sync::Arc::new(crate::clock::SystemClock),
        )));
        let token = register(&app, "eager@example.com", "guest").await;

        let stay = |check_in: &str, check_out: &str| {
            let mut req = json_request(
                Method::POST,
                "/api/v1/bookings",
                Some(&token),
                json!({
                    "property_id": seed.property.id,
                    "check_in": check_in,
                    "check_out": check_out,
                    "guests": 1,
                }),
            );
            req.headers_mut()
                .insert("x-forwarded-for", "198.51.100.4".parse().unwrap());
            req
        };

        let (status, _) = call(&app, stay("2099-07-01", "2099-07-03")).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, err) = call(&app, stay("2099-08-01", "2099-08-03")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err["code"], "RATE_LIMITED");

        // reads stay within the default bucket
        let (status, _) = call(&app, get("/api/v1/bookings", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn inverted_dates_are_bad_requests() {
        let store = MemoryStore::default();
        let seed = Seed::new(&store).await;
        let app = build_app(AppState::fake(store));
        let token = register(&app, "early@example.com", "guest").await;

        let (status, err) = call(
            &app,
            json_request(
                Method::POST,
                "/api/v1/bookings",
                Some(&token),
                json!({
                    "property_id": seed.property.id,
                    "check_in": "2099-06-05",
                    "check_out": "2099-06-05",
                    "guests": 1,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["message"], "check-out date must be after check-in date");
    }

    #[tokio::test]
    async fn search_returns_a_page() {
        let store = MemoryStore::default();
        Seed::new(&store).await;
        let app = build_app(AppState::fake(store));

        let (status, page) = call(
            &app,
            get("/api/v1/properties/search?city=porto&guests=2&limit=5", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["limit"], 5);
        assert_eq!(page["total_pages"], 1);
    }
}
