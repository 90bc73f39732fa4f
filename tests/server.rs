//! End-to-end tests of the HTTP API, driven through the axum router
//! in-process with an in-memory store and a canned remote site.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use vitiscrap::auth::{AuthService, TokenService};
use vitiscrap::scrape::{FetchError, Fetcher, Retriever};
use vitiscrap::server::{router, AppState};
use vitiscrap::store::InMemoryStore;

const SECRET: &str = "segredo-de-teste";

const PAGE: &str = r#"<html><body><table class="tb_base tb_dados">
<thead><tr><th>País</th><th>Quantidade (Kg)</th><th>Valor (US$)</th></tr></thead>
<tbody><tr><td>Chile</td><td>1.000</td><td>2.500</td></tr>
<tr><td>Argentina</td><td>300</td><td>900</td></tr></tbody>
</table></body></html>"#;

/// Serves `PAGE` while up; fails like a dead host while down.
struct FakeSite {
    up: AtomicBool,
    body: &'static str,
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if self.up.load(Ordering::SeqCst) {
            Ok(self.body.to_string())
        } else {
            Err(FetchError::Timeout {
                url: url.to_string(),
            })
        }
    }
}

struct Harness {
    app: Router,
    site: Arc<FakeSite>,
}

fn harness_with(body: &'static str) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let site = Arc::new(FakeSite {
        up: AtomicBool::new(true),
        body,
    });
    let auth = Arc::new(AuthService::new(
        store.clone(),
        TokenService::new(SECRET, Duration::minutes(60)),
    ));
    let retriever = Arc::new(Retriever::new(
        "http://vitibrasil.test/index.php",
        site.clone(),
        store,
    ));
    Harness {
        app: router(AppState::new(auth, retriever)),
        site,
    }
}

fn harness() -> Harness {
    harness_with(PAGE)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let challenge = resp
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body, challenge)
}

fn register_req(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn token_req(username: &str, password: &str) -> Request<Body> {
    let basic = STANDARD.encode(format!("{}:{}", username, password));
    Request::builder()
        .method("POST")
        .uri("/auth/token")
        .header(header::AUTHORIZATION, format!("Basic {}", basic))
        .body(Body::empty())
        .unwrap()
}

fn scrap_req(query: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(format!("/scrap/tabela{}", query));
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::empty()).unwrap()
}

async fn login(app: &Router) -> String {
    let (status, _, _) = send(
        app,
        register_req(json!({"username": "usuario1", "password": "senha123", "email": "u1@email.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = send(app, token_req("usuario1", "senha123")).await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

// ─── Auth ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_register_returns_identity_without_hash() {
    let h = harness();
    let (status, body, _) = send(
        &h.app,
        register_req(json!({"username": "usuario1", "password": "senha123", "email": "u1@email.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "usuario1");
    assert_eq!(body["email"], "u1@email.com");
    assert!(body["id"].as_i64().is_some());
    let text = body.to_string();
    assert!(!text.contains("senha123"));
    assert!(!text.contains("argon2"));
}

#[tokio::test]
async fn test_register_accepts_portuguese_field_names() {
    let h = harness();
    let (status, _, _) = send(
        &h.app,
        register_req(json!({"usuario": "usuario2", "senha": "senha123", "email": "u2@email.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let h = harness();
    login(&h.app).await;

    for dup in [
        json!({"username": "usuario1", "password": "outra123", "email": "novo@email.com"}),
        json!({"username": "novo", "password": "outra123", "email": "u1@email.com"}),
    ] {
        let (status, body, _) = send(&h.app, register_req(dup)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "username or email already exists");
        assert_eq!(body["code"], "conflict");
    }
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let h = harness();
    let (status, body, _) = send(
        &h.app,
        register_req(json!({"username": "ab", "password": "senha123", "email": "a@b.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_parameter");

    let (status, _, _) = send(&h.app, register_req(json!({"username": "abc"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_with_bad_credentials() {
    let h = harness();
    login(&h.app).await;

    let (status, body, challenge) = send(&h.app, token_req("usuario1", "errada")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "invalid credentials");
    assert_eq!(challenge.as_deref(), Some("Basic"));

    let req = Request::builder()
        .method("POST")
        .uri("/auth/token")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Scrape ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scrap_requires_token() {
    let h = harness();
    let (status, _, challenge) = send(&h.app, scrap_req("?ano=2023", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(challenge.as_deref(), Some("Bearer"));

    let (status, body, _) = send(&h.app, scrap_req("?ano=2023", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_scrap_rejects_expired_token() {
    let h = harness();
    let expired = TokenService::new(SECRET, Duration::minutes(60))
        .issue_at("usuario1", Utc::now() - Duration::minutes(61))
        .unwrap();
    let (status, body, _) = send(&h.app, scrap_req("", Some(&expired))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "token_expired");
    assert_eq!(body["detail"], "token expired");
}

#[tokio::test]
async fn test_auth_is_checked_before_parameters() {
    let h = harness();
    let (status, _, _) = send(&h.app, scrap_req("?ano=1800", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_scrap_returns_table_by_names() {
    let h = harness();
    let token = login(&h.app).await;

    let query = "?ano=2022&opcao=Exporta%C3%A7%C3%A3o&subopcao=Espumantes";
    let (status, body, _) = send(&h.app, scrap_req(query, Some(&token))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(
        body["fonte"],
        "http://vitibrasil.test/index.php?ano=2022&opcao=opt_06&subopcao=subopt_02"
    );
    assert_eq!(body["ano"], "2022");
    assert_eq!(body["opcao"], "06");
    assert_eq!(body["subopcao"], "02");
    assert_eq!(body["tabela"].as_array().unwrap().len(), 2);
    assert_eq!(body["tabela"][0]["País"], "Chile");
    assert_eq!(body["tabela"][1]["Valor (US$)"], "900");
}

#[tokio::test]
async fn test_scrap_defaults() {
    let h = harness();
    let token = login(&h.app).await;
    let (status, body, _) = send(&h.app, scrap_req("", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ano"], "2023");
    assert_eq!(body["opcao"], "02");
    assert_eq!(body["subopcao"], "01");
}

#[tokio::test]
async fn test_scrap_invalid_parameters() {
    let h = harness();
    let token = login(&h.app).await;

    for query in [
        "?ano=1969",
        "?ano=2025",
        "?ano=dois-mil",
        "?opcao=07",
        "?opcao=03&subopcao=09",
        "?opcao=Processamento&subopcao=Espumantes",
    ] {
        let (status, body, _) = send(&h.app, scrap_req(query, Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", query);
        assert_eq!(body["code"], "invalid_parameter", "{}", query);
    }
}

#[tokio::test]
async fn test_scrap_falls_back_to_backup_when_site_is_down() {
    let h = harness();
    let token = login(&h.app).await;

    let (status, live, _) = send(&h.app, scrap_req("?ano=2020", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    h.site.up.store(false, Ordering::SeqCst);

    let (status, backup, _) = send(&h.app, scrap_req("?ano=2020", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        backup["fonte"],
        format!("{} (backup local)", live["fonte"].as_str().unwrap())
    );
    assert_eq!(backup["tabela"], live["tabela"]);

    let (status, body, _) = send(&h.app, scrap_req("?ano=2019", Some(&token))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "service_unavailable");
}

#[tokio::test]
async fn test_scrap_page_without_table_is_404() {
    let h = harness_with("<html><body>nada</body></html>");
    let token = login(&h.app).await;
    let (status, body, _) = send(&h.app, scrap_req("", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
