use actix_web::{test, web, App};
use dm_relay::{AppState, Settings};
use serde_json::json;

async fn state() -> AppState {
    let config = Settings::new_for_test().unwrap();
    AppState::new(config).await.unwrap()
}

#[actix_web::test]
async fn test_register_and_login() {
    let state = state().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(dm_relay::routes)
    ).await;

    let register_response = test::TestRequest::post()
        .uri("/register")
        .set_json(json!({
            "username": "alice",
            "password": "password123",
            "role": "member",
            "name": "Alice",
            "email": "alice@example.com"
        }))
        .send_request(&app)
        .await;

    assert_eq!(register_response.status(), 201);
    let register_body: serde_json::Value = test::read_body_json(register_response).await;
    assert_eq!(register_body["username"], "alice");
    assert!(register_body.get("id").is_some());
    assert!(register_body.get("password_hash").is_none());

    let login_response = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({
            "username": "alice",
            "password": "password123"
        }))
        .send_request(&app)
        .await;

    assert_eq!(login_response.status(), 200);
    let login_body: serde_json::Value = test::read_body_json(login_response).await;
    assert_eq!(login_body["id"], register_body["id"]);

    let users_response = test::TestRequest::get().uri("/users").send_request(&app).await;
    assert_eq!(users_response.status(), 200);
    let users: serde_json::Value = test::read_body_json(users_response).await;
    assert_eq!(users.as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn test_invalid_login() {
    let state = state().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(dm_relay::routes)
    ).await;

    let response = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({
            "username": "nobody",
            "password": "wrongpassword"
        }))
        .send_request(&app)
        .await;

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["error"]["status"], 401);
}

#[actix_web::test]
async fn test_invalid_registration() {
    let state = state().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(dm_relay::routes)
    ).await;

    let response = test::TestRequest::post()
        .uri("/register")
        .set_json(json!({
            "username": "alice",
            "password": ""
        }))
        .send_request(&app)
        .await;

    assert_eq!(response.status(), 400);
}

#[actix_web::test]
async fn test_duplicate_registration() {
    let state = state().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(dm_relay::routes)
    ).await;

    let body = json!({
        "username": "alice",
        "password": "password123",
        "role": "member",
        "name": "Alice",
        "email": "alice@example.com"
    });

    let first = test::TestRequest::post().uri("/register").set_json(&body).send_request(&app).await;
    assert_eq!(first.status(), 201);

    let second = test::TestRequest::post().uri("/register").set_json(&body).send_request(&app).await;
    assert_eq!(second.status(), 409);
}
