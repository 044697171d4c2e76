//! HTTP router for the care service.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Trace → 3. Timeout → 4. Rate limiter → 5. Auth validator → 6. Audit logger

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::media::MAX_IMAGE_BYTES;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    build_router(ctx)
}

/// Build router from pre-constructed `ApiContext`.
#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    let request_timeout = ctx.core.config.request_timeout;

    // Protected routes — require auth + full middleware stack
    //
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Rate limit → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/sign-out", post(endpoints::auth::sign_out))
        .route("/auth/session", get(endpoints::auth::current))
        .route(
            "/accounts",
            get(endpoints::accounts::list).post(endpoints::accounts::create),
        )
        .route("/accounts/search", get(endpoints::accounts::search))
        .route(
            "/accounts/:id",
            get(endpoints::accounts::detail).patch(endpoints::accounts::update),
        )
        .route(
            "/accounts/:id/profile-image",
            put(endpoints::accounts::upload_image)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 1024)),
        )
        .route("/accounts/:id/overview", get(endpoints::accounts::overview))
        .route(
            "/accounts/:id/transactions",
            get(endpoints::wallet::transactions),
        )
        .route(
            "/accounts/:id/wallet/reconcile",
            get(endpoints::wallet::reconcile),
        )
        .route(
            "/accounts/:id/wallet/deposit",
            post(endpoints::wallet::deposit),
        )
        .route(
            "/accounts/:id/wallet/withdraw",
            post(endpoints::wallet::withdraw),
        )
        .route(
            "/appointments",
            get(endpoints::appointments::list_mine).post(endpoints::appointments::book),
        )
        .route(
            "/appointments/:id",
            put(endpoints::appointments::reschedule).delete(endpoints::appointments::cancel),
        )
        .route("/appointments/:id/pay", post(endpoints::wallet::pay))
        .route(
            "/admin/appointments",
            get(endpoints::appointments::list_facility),
        )
        .route(
            "/admin/facilities/:facility_id/appointments",
            get(endpoints::appointments::list_for_facility),
        )
        .route(
            "/admin/patients/:patient_id/appointments/:id",
            patch(endpoints::appointments::admin_update),
        )
        .route(
            "/admin/facilities",
            post(endpoints::accounts::create_facility_admin),
        )
        .route("/admin/stats", get(endpoints::reports::stats))
        .route("/admin/activity", get(endpoints::reports::activity))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (rate-limited only, no auth required)
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/sign-in", post(endpoints::auth::sign_in))
        .route("/auth/register", post(endpoints::auth::register))
        .route("/auth/bootstrap", post(endpoints::auth::bootstrap))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .nest("/api", protected.merge(unprotected))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::types::RateLimiter;
    use crate::config::AppConfig;
    use crate::media::MemoryImageHost;

    struct TestApp {
        app: Router,
        core: Arc<CoreState>,
        _dir: tempfile::TempDir,
    }

    fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("care.db");
        let config = AppConfig::from_lookup(move |key| {
            (key == "NAIJACARE_DB_PATH").then(|| db_path.display().to_string())
        })
        .unwrap();
        let core = Arc::new(CoreState::new(config, Arc::new(MemoryImageHost::new())));
        TestApp {
            app: api_router(core.clone()),
            core,
            _dir: dir,
        }
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn sign_in(app: &Router, email: &str, password: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/auth/sign-in",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "sign-in failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Bootstrap an admin, create a patient with a password, sign both in.
    async fn admin_and_patient(app: &Router) -> (String, String, String) {
        let (status, _) = send(
            app,
            "POST",
            "/api/auth/bootstrap",
            None,
            Some(json!({ "name": "Ada Admin", "email": "ada@clinic.ng", "password": "admin-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let admin_token = sign_in(app, "ada@clinic.ng", "admin-pass").await;

        let (status, body) = send(
            app,
            "POST",
            "/api/accounts",
            Some(&admin_token),
            Some(json!({
                "role": "patient",
                "name": "Chidi Okafor",
                "email": "chidi@example.ng",
                "password": "patient-pass"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let patient_id = body["account"]["id"].as_str().unwrap().to_string();
        let patient_token = sign_in(app, "chidi@example.ng", "patient-pass").await;

        (admin_token, patient_token, patient_id)
    }

    #[tokio::test]
    async fn health_is_public() {
        let t = test_app();
        let (status, body) = send(&t.app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "NaijaCare");
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let t = test_app();
        let (status, body) = send(&t.app, "GET", "/api/appointments", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");

        let (status, _) =
            send(&t.app, "GET", "/api/appointments", Some("not-a-token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let t = test_app();
        admin_and_patient(&t.app).await;
        let (status, _) = send(
            &t.app,
            "POST",
            "/api/auth/sign-in",
            None,
            Some(json!({ "email": "chidi@example.ng", "password": "nope-nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_responses_are_not_cached() {
        let t = test_app();
        let (_, patient_token, _) = admin_and_patient(&t.app).await;
        let request = Request::builder()
            .uri("/api/auth/session")
            .header("Authorization", format!("Bearer {patient_token}"))
            .body(Body::empty())
            .unwrap();
        let response = t.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
    }

    #[tokio::test]
    async fn sign_out_revokes_token() {
        let t = test_app();
        let (_, patient_token, _) = admin_and_patient(&t.app).await;

        let (status, _) =
            send(&t.app, "POST", "/api/auth/sign-out", Some(&patient_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) =
            send(&t.app, "GET", "/api/auth/session", Some(&patient_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn second_bootstrap_conflicts() {
        let t = test_app();
        admin_and_patient(&t.app).await;
        let (status, body) = send(
            &t.app,
            "POST",
            "/api/auth/bootstrap",
            None,
            Some(json!({ "name": "Eve", "email": "eve@clinic.ng", "password": "whatever" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let t = test_app();
        let (status, body) = send(
            &t.app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "No Email" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn patient_cannot_reach_admin_routes() {
        let t = test_app();
        let (_, patient_token, _) = admin_and_patient(&t.app).await;
        let (status, body) =
            send(&t.app, "GET", "/api/admin/stats", Some(&patient_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn booking_confirmation_and_payment_flow() {
        let t = test_app();
        let (admin_token, patient_token, patient_id) = admin_and_patient(&t.app).await;

        let (status, body) = send(
            &t.app,
            "POST",
            &format!("/api/accounts/{patient_id}/wallet/deposit"),
            Some(&patient_token),
            Some(json!({ "amount": 5000, "method": "card" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["balance"], 5000);

        let (status, body) = send(
            &t.app,
            "POST",
            "/api/appointments",
            Some(&patient_token),
            Some(json!({
                "appointment_type": "virtual",
                "date": "2030-03-14",
                "time": "10:30",
                "message": "Recurring headaches"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["appointment"]["status"], "pending");
        let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &t.app,
            "PATCH",
            &format!("/api/admin/patients/{patient_id}/appointments/{appointment_id}"),
            Some(&admin_token),
            Some(json!({
                "status": "confirmed",
                "amount": 3000,
                "doctor_name": "Dr. Bello",
                "meeting_link": "https://meet.example.ng/abc"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["appointment"]["status"], "confirmed");
        assert_eq!(body["appointment"]["meeting_link"], "https://meet.example.ng/abc");

        let (status, body) = send(
            &t.app,
            "POST",
            &format!("/api/appointments/{appointment_id}/pay"),
            Some(&patient_token),
            Some(json!({ "method": "wallet" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["balance"], 2000);

        let (status, body) = send(
            &t.app,
            "GET",
            &format!("/api/accounts/{patient_id}/transactions"),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactions"].as_array().unwrap().len(), 2);

        let (status, body) = send(
            &t.app,
            "GET",
            &format!("/api/accounts/{patient_id}/wallet/reconcile"),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["consistent"], true);

        let (status, body) =
            send(&t.app, "GET", "/api/admin/stats", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"], 1);
        assert_eq!(body["appointments"], 1);
        assert_eq!(body["revenue"], 3000);

        let (status, body) =
            send(&t.app, "GET", "/api/admin/appointments", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["appointments"][0]["owner_email"], "chidi@example.ng");
        assert_eq!(body["appointments"][0]["payment_status"], "paid");
    }

    #[tokio::test]
    async fn self_registered_patient_can_be_served() {
        let t = test_app();
        let (admin_token, _, _) = admin_and_patient(&t.app).await;

        let (status, body) = send(
            &t.app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Tunde Bakare", "email": "tunde@example.ng", "password": "tunde-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let patient_id = body["account"]["id"].as_str().unwrap().to_string();
        assert!(body["account"]["facility_id"].is_string());
        let token = sign_in(&t.app, "tunde@example.ng", "tunde-pass").await;

        let (status, body) = send(
            &t.app,
            "POST",
            "/api/appointments",
            Some(&token),
            Some(json!({
                "appointment_type": "in-person",
                "date": "2030-06-02",
                "time": "09:00",
                "message": "Annual check-up"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

        let (_, body) =
            send(&t.app, "GET", "/api/admin/appointments", Some(&admin_token), None).await;
        assert!(body["appointments"]
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a["id"] == appointment_id.as_str()));

        let (status, body) = send(
            &t.app,
            "PATCH",
            &format!("/api/admin/patients/{patient_id}/appointments/{appointment_id}"),
            Some(&admin_token),
            Some(json!({ "status": "confirmed", "amount": 3000 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        send(
            &t.app,
            "POST",
            &format!("/api/accounts/{patient_id}/wallet/deposit"),
            Some(&token),
            Some(json!({ "amount": 5000, "method": "card" })),
        )
        .await;
        let (status, body) = send(
            &t.app,
            "POST",
            &format!("/api/appointments/{appointment_id}/pay"),
            Some(&token),
            Some(json!({ "method": "wallet" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["balance"], 2000);
    }

    #[tokio::test]
    async fn facilities_are_isolated() {
        let t = test_app();
        let (admin_token, _, patient_id) = admin_and_patient(&t.app).await;

        let (status, body) = send(
            &t.app,
            "POST",
            "/api/admin/facilities",
            Some(&admin_token),
            Some(json!({ "name": "Bisi Lawal", "email": "bisi@ikeja.ng", "password": "second-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let second_facility = body["account"]["id"].as_str().unwrap().to_string();
        let second_token = sign_in(&t.app, "bisi@ikeja.ng", "second-pass").await;

        let registration = json!({ "name": "Kemi Ade", "email": "kemi@example.ng", "password": "kemi-pass" });
        let (status, _) =
            send(&t.app, "POST", "/api/auth/register", None, Some(registration.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut registration = registration;
        registration["facility_id"] = json!(second_facility);
        let (status, body) =
            send(&t.app, "POST", "/api/auth/register", None, Some(registration)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let kemi_id = body["account"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["account"]["facility_id"], second_facility.as_str());

        let (status, _) = send(
            &t.app,
            "GET",
            &format!("/api/accounts/{kemi_id}"),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(
            &t.app,
            "GET",
            &format!("/api/accounts/{patient_id}"),
            Some(&second_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = send(&t.app, "GET", "/api/admin/stats", Some(&admin_token), None).await;
        assert_eq!(body["users"], 1);
        let (_, body) = send(&t.app, "GET", "/api/admin/stats", Some(&second_token), None).await;
        assert_eq!(body["users"], 1);
        let (status, body) = send(
            &t.app,
            "GET",
            &format!("/api/admin/facilities/{second_facility}/appointments"),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    }

    #[tokio::test]
    async fn oversized_price_is_rejected() {
        let t = test_app();
        let (admin_token, patient_token, patient_id) = admin_and_patient(&t.app).await;
        let (_, body) = send(
            &t.app,
            "POST",
            "/api/appointments",
            Some(&patient_token),
            Some(json!({
                "appointment_type": "in-person",
                "date": "2030-01-10",
                "time": "13:00",
                "message": "Follow-up"
            })),
        )
        .await;
        let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &t.app,
            "PATCH",
            &format!("/api/admin/patients/{patient_id}/appointments/{appointment_id}"),
            Some(&admin_token),
            Some(json!({ "amount": i64::MAX, "payment_status": "paid" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

        let (status, body) =
            send(&t.app, "GET", "/api/admin/stats", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["revenue"], 0);
    }

    #[tokio::test]
    async fn wallet_withdrawal_beyond_balance_is_payment_required() {
        let t = test_app();
        let (_, patient_token, patient_id) = admin_and_patient(&t.app).await;
        let (status, body) = send(
            &t.app,
            "POST",
            &format!("/api/accounts/{patient_id}/wallet/withdraw"),
            Some(&patient_token),
            Some(json!({ "amount": 100, "method": "wallet" })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_FUNDS");
    }

    #[tokio::test]
    async fn nhis_search_finds_patient() {
        let t = test_app();
        let (admin_token, _, patient_id) = admin_and_patient(&t.app).await;

        let (_, body) = send(
            &t.app,
            "GET",
            &format!("/api/accounts/{patient_id}"),
            Some(&admin_token),
            None,
        )
        .await;
        let nhis = body["account"]["nhis_number"].as_str().unwrap().to_string();
        assert!(nhis.starts_with("NHIS"));

        let query = nhis.to_lowercase();
        let (status, body) = send(
            &t.app,
            "GET",
            &format!("/api/accounts/search?q={query}"),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accounts"][0]["id"], patient_id.as_str());

        let (status, body) = send(
            &t.app,
            "GET",
            "/api/accounts/search?q=NH",
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["accounts"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn profile_image_upload_stores_url() {
        let t = test_app();
        let (_, patient_token, patient_id) = admin_and_patient(&t.app).await;

        let request = Request::builder()
            .method("PUT")
            .uri(format!("/api/accounts/{patient_id}/profile-image?file_name=me.png"))
            .header("Authorization", format!("Bearer {patient_token}"))
            .body(Body::from(vec![0x89, b'P', b'N', b'G']))
            .unwrap();
        let response = t.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["account"]["profile_image"]
            .as_str()
            .unwrap()
            .starts_with("memory://images/"));
    }

    #[tokio::test]
    async fn rate_limit_returns_429() {
        let t = test_app();
        let ctx = ApiContext::new(t.core.clone());
        *ctx.rate_limiter.lock().unwrap() = RateLimiter::with_limits(1, 100);
        let app = api_router_with_ctx(ctx);

        let (status, _) = send(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }
}
