// tests/common/mod.rs

use std::sync::Arc;

use qcm_backend::{
    config::Config,
    repository::{DynRepository, MemoryQcmRepository},
    routes,
    state::AppState,
    utils::jwt::sign_jwt,
};

pub const TEST_SECRET: &str = "test_secret_for_integration_tests";

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_dir: "logs".to_string(),
    }
}

pub fn test_router() -> axum::Router {
    let repo: DynRepository = Arc::new(MemoryQcmRepository::new());
    routes::create_router(AppState {
        repo,
        config: test_config(),
    })
}

/// Spawns the app on a random port with a fresh in-memory store.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
pub async fn spawn_app() -> String {
    let app = test_router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

pub fn bearer(user_id: &str, role: &str) -> String {
    let token = sign_jwt(user_id, role, TEST_SECRET, 600).expect("Failed to sign token");
    format!("Bearer {}", token)
}

/// Creates a question through the admin API and returns its id.
pub async fn create_question(
    client: &reqwest::Client,
    address: &str,
    admin: &str,
    body: serde_json::Value,
) -> i64 {
    let response = client
        .post(format!("{}/api/admin/qcm/questions", address))
        .header("Authorization", admin)
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201, "question creation failed");
    let created: serde_json::Value = response.json().await.unwrap();
    created["id"].as_i64().expect("id missing")
}

pub fn question_body(
    school: &str,
    matiere: &str,
    correct: &[&str],
    points: i32,
    status: &str,
) -> serde_json::Value {
    serde_json::json!({
        "text": format!("Question worth {} points", points),
        "options": [
            {"id": "A", "text": "First"},
            {"id": "B", "text": "Second"},
            {"id": "C", "text": "Third"},
            {"id": "D", "text": "Fourth"}
        ],
        "correct_ids": correct,
        "explanation": "Because.",
        "school": school,
        "matiere": matiere,
        "difficulty": "HARD",
        "points": points,
        "status": status
    })
}
