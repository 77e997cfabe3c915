use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use lostfound_api::auth::{AppState, AppStateInner, create_token};
use lostfound_api::routes::router;
use lostfound_db::Database;
use lostfound_matching::{Evaluator, HashingEmbedder, MatchConfig};

const SECRET: &str = "integration-test-secret";
const DIM: usize = 256;

fn app() -> (Router, AppState) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let config = MatchConfig {
        embedding_dim: DIM,
        ..MatchConfig::default()
    };
    let evaluator = Evaluator::new(db.clone(), Arc::new(HashingEmbedder::new(DIM)), config).unwrap();
    let state: AppState = Arc::new(AppStateInner {
        db,
        evaluator: Arc::new(evaluator),
        jwt_secret: SECRET.into(),
        token_ttl: chrono::Duration::days(30),
    });
    (router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
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

async fn register(app: &Router, name: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

fn lost_wallet() -> Value {
    json!({
        "category": "Electronics",
        "name": "Wallet",
        "description": "black leather wallet",
        "color": "Black",
        "date": "2024-05-01",
        "time": "14:30",
        "location": "Main library",
        "ownerName": "Alex",
        "email": "alex@example.com",
    })
}

fn found_wallet() -> Value {
    json!({
        "category": "Electronics",
        "description": "black leather wallet with cards",
        "color": "Black",
        "dateFound": "2024-05-02",
        "locationFound": "Main library entrance",
        "finderName": "Sam",
        "contact": "sam@example.com",
    })
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn register_and_login_flow() {
    let (app, _) = app();
    register(&app, "Alex", "alex@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": "Other", "email": "ALEX@example.com", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["msg"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "nopass@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "alex@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "Alex");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "alex@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_non_bearer_header_is_401() {
    let (app, _) = app();

    let (status, _) = send(&app, Method::POST, "/api/items/lost", None, Some(lost_wallet())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/items/notifications")
        .header(header::AUTHORIZATION, "Basic YWxleDpwdw==")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_422_without_data() {
    let (app, _) = app();
    let token = create_token(SECRET, Uuid::new_v4(), "late@example.com", chrono::Duration::hours(-2)).unwrap();

    let (status, body) = send(&app, Method::GET, "/api/items/notifications", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["msg"]);
}

#[tokio::test]
async fn forged_or_garbage_token_is_422() {
    let (app, _) = app();
    let forged = create_token("some-other-secret", Uuid::new_v4(), "x@example.com", chrono::Duration::hours(1)).unwrap();

    for token in [forged.as_str(), "not-a-jwt"] {
        let (status, _) = send(&app, Method::GET, "/api/items/notifications", Some(token), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[tokio::test]
async fn matching_pair_notifies_only_the_lost_owner() {
    let (app, _) = app();
    let owner = register(&app, "Alex", "alex@example.com").await;
    let finder = register(&app, "Sam", "sam@example.com").await;

    let mut lost = lost_wallet();
    lost["brand"] = json!("Fossil");
    lost["landmark"] = json!("near the printers");
    lost["phone"] = json!("555-0100");
    let (status, body) = send(&app, Method::POST, "/api/items/lost", Some(&owner), Some(lost)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["matches"], 0);
    let lost_id = body["id"].as_str().unwrap().to_string();

    let mut found = found_wallet();
    found["custody"] = json!("front_desk");
    found["consent"] = json!(true);
    let (status, body) = send(&app, Method::POST, "/api/items/found", Some(&finder), Some(found)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["matches"], 1);
    let found_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/api/items/notifications", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry["type"], "match");
    assert_eq!(entry["lost_item"]["id"], lost_id.as_str());
    assert_eq!(entry["found_item"]["id"], found_id.as_str());
    assert_eq!(entry["lost_item"]["status"], "matched");
    assert_eq!(entry["found_item"]["status"], "matched");
    assert_eq!(entry["vector_score"], entry["score"]);
    assert!(entry["score"].as_f64().unwrap() >= 0.65);
    assert_eq!(entry["is_new"], true);
    assert_eq!(entry["match_method"], "text");

    let lost_item = &entry["lost_item"];
    assert_eq!(lost_item["date_lost"], "2024-05-01");
    assert_eq!(lost_item["time_lost"], "14:30:00");
    assert_eq!(lost_item["location"], "Main library");
    assert_eq!(lost_item["owner_name"], "Alex");
    assert_eq!(lost_item["email"], "alex@example.com");
    assert_eq!(lost_item["phone"], "555-0100");
    assert_eq!(lost_item["brand"], "Fossil");
    assert_eq!(lost_item["landmark"], "near the printers");

    let found_item = &entry["found_item"];
    assert_eq!(found_item["date_found"], "2024-05-02");
    assert_eq!(found_item["location_found"], "Main library entrance");
    assert_eq!(found_item["finder_name"], "Sam");
    assert_eq!(found_item["contact"], "sam@example.com");
    assert_eq!(found_item["custody"], "front_desk");
    assert_eq!(found_item["consent"], true);
    assert!(found_item.get("user_id").is_none());

    let (_, body) = send(&app, Method::GET, "/api/items/notifications", Some(&finder), None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn matched_lost_report_hears_about_a_second_finder() {
    let (app, _) = app();
    let owner = register(&app, "Alex", "alex@example.com").await;
    let finder = register(&app, "Sam", "sam@example.com").await;
    let other_finder = register(&app, "Kim", "kim@example.com").await;

    send(&app, Method::POST, "/api/items/lost", Some(&owner), Some(lost_wallet())).await;
    let (_, body) = send(&app, Method::POST, "/api/items/found", Some(&finder), Some(found_wallet())).await;
    assert_eq!(body["matches"], 1);
    let (_, body) = send(&app, Method::POST, "/api/items/found", Some(&other_finder), Some(found_wallet())).await;
    assert_eq!(body["matches"], 1);

    let (_, body) = send(&app, Method::GET, "/api/items/notifications", Some(&owner), None).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_ne!(entries[0]["found_item"]["id"], entries[1]["found_item"]["id"]);
}

#[tokio::test]
async fn notifications_are_delivered_on_first_read() {
    let (app, _) = app();
    let owner = register(&app, "Alex", "alex@example.com").await;
    let finder = register(&app, "Sam", "sam@example.com").await;
    send(&app, Method::POST, "/api/items/lost", Some(&owner), Some(lost_wallet())).await;
    send(&app, Method::POST, "/api/items/found", Some(&finder), Some(found_wallet())).await;

    let (_, body) = send(&app, Method::GET, "/api/items/notifications?unseen=true", Some(&owner), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app, Method::GET, "/api/items/notifications?unseen=true", Some(&owner), None).await;
    assert_eq!(body, json!([]));

    let (_, body) = send(&app, Method::GET, "/api/items/notifications", Some(&owner), None).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["is_new"], false);
}

#[tokio::test]
async fn unrelated_categories_do_not_match() {
    let (app, _) = app();
    let owner = register(&app, "Alex", "alex@example.com").await;
    let finder = register(&app, "Sam", "sam@example.com").await;

    let mut lost = lost_wallet();
    lost["category"] = json!("Jewelry");
    lost["color"] = json!("Gold");
    lost["name"] = json!("Ring");
    lost["description"] = json!("gold ring with engraving");
    send(&app, Method::POST, "/api/items/lost", Some(&owner), Some(lost)).await;

    let (status, body) = send(&app, Method::POST, "/api/items/found", Some(&finder), Some(found_wallet())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["matches"], 0);

    let (_, body) = send(&app, Method::GET, "/api/items/notifications", Some(&owner), None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn submission_validation_is_400() {
    let (app, _) = app();
    let token = register(&app, "Alex", "alex@example.com").await;

    let mut missing = lost_wallet();
    missing.as_object_mut().unwrap().remove("location");
    let (status, body) = send(&app, Method::POST, "/api/items/lost", Some(&token), Some(missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"].is_string());

    let mut bad_date = lost_wallet();
    bad_date["date"] = json!("05/01/2024");
    let (status, _) = send(&app, Method::POST, "/api/items/lost", Some(&token), Some(bad_date)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut too_many = lost_wallet();
    too_many["images"] = json!(["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg", "f.jpg"]);
    let (status, _) = send(&app, Method::POST, "/api/items/lost", Some(&token), Some(too_many)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut no_color = found_wallet();
    no_color["color"] = json!("  ");
    let (status, _) = send(&app, Method::POST, "/api/items/found", Some(&token), Some(no_color)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::GET, "/api/items/lost", None, None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn listings_are_newest_first() {
    let (app, _) = app();
    let token = register(&app, "Sam", "sam@example.com").await;

    let mut first = found_wallet();
    first["description"] = json!("blue umbrella");
    first["category"] = json!("Accessories");
    let (_, body) = send(&app, Method::POST, "/api/items/found", Some(&token), Some(first)).await;
    let first_id = body["id"].clone();

    let (_, body) = send(&app, Method::POST, "/api/items/found", Some(&token), Some(found_wallet())).await;
    let second_id = body["id"].clone();

    let (status, body) = send(&app, Method::GET, "/api/items/found", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], second_id);
    assert_eq!(items[1]["id"], first_id);
    assert_eq!(items[0]["kind"], "found");
    assert_eq!(items[0]["location_found"], "Main library entrance");
    assert_eq!(items[0]["date_found"], "2024-05-02");
    assert_eq!(items[0]["finder_name"], "Sam");
    assert!(items[0].get("image_embedding").is_none());
}

#[tokio::test]
async fn only_the_owner_can_close() {
    let (app, _) = app();
    let owner = register(&app, "Alex", "alex@example.com").await;
    let other = register(&app, "Sam", "sam@example.com").await;

    let (_, body) = send(&app, Method::POST, "/api/items/lost", Some(&owner), Some(lost_wallet())).await;
    let id = body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/items/{}/close", id);

    let (status, _) = send(&app, Method::PUT, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::PUT, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::PUT, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let missing = format!("/api/items/{}/close", Uuid::new_v4());
    let (status, _) = send(&app, Method::PUT, &missing, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A closed lost report is out of the pool.
    let (_, body) = send(&app, Method::POST, "/api/items/found", Some(&other), Some(found_wallet())).await;
    assert_eq!(body["matches"], 0);

    let (_, body) = send(&app, Method::GET, "/api/items/lost", None, None).await;
    assert_eq!(body[0]["status"], "closed");
}
