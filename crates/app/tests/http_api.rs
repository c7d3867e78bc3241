use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use app::extract::USER_ID_HEADER;
use app::{AppState, router};
use course_core::model::{Role, User, UserId, Video, VideoId};
use course_core::settings::EngineSettings;
use course_core::time::fixed_clock;
use services::{AppServices, EmailAllowList};
use storage::repository::{CatalogRepository, Storage, UserRepository};

const ADMIN: UserId = UserId::new(1);
const LEARNER: UserId = UserId::new(2);

async fn test_app() -> Router {
    let storage = Storage::in_memory();
    storage
        .users
        .upsert_user(&User::new(ADMIN, "admin@example.com", Role::Admin))
        .await
        .unwrap();
    storage
        .users
        .upsert_user(&User::new(LEARNER, "learner@example.com", Role::Learner))
        .await
        .unwrap();
    for i in 1..=2u32 {
        let video = Video::new(
            VideoId::new(u64::from(i)),
            i,
            format!("Part {i}"),
            None,
            600,
            true,
        )
        .unwrap();
        storage.catalog.upsert_video(&video).await.unwrap();
    }
    let services = AppServices::new(
        &storage,
        fixed_clock(),
        EngineSettings::default(),
        Arc::new(EmailAllowList::default()),
    );
    router(AppState::new(services))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<UserId>,
    body: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

fn survey_body(kind: &str, video_id: Option<u64>) -> String {
    json!({
        "title": "Check",
        "type": kind,
        "videoId": video_id,
        "questions": [
            { "text": "One?", "options": [
                { "text": "yes", "isCorrect": true },
                { "text": "no", "isCorrect": false }
            ]},
            { "text": "Two?", "options": [
                { "text": "yes", "isCorrect": true },
                { "text": "no", "isCorrect": false }
            ]},
            { "text": "Three?", "options": [
                { "text": "yes", "isCorrect": true },
                { "text": "no", "isCorrect": false }
            ]}
        ]
    })
    .to_string()
}

#[tokio::test]
async fn health_needs_no_user() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn missing_or_unknown_user_is_unauthorized() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/dashboard", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/dashboard", Some(UserId::new(99)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ticks_complete_a_video_and_unlock_the_next() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/dashboard", Some(LEARNER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unlocked"], json!([1]));
    assert_eq!(body["stage"], json!(1));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/videos/1/ticks",
        Some(LEARNER),
        Some(r#"{"deltaSeconds": 596, "lastPositionSec": 596, "isCompleted": true}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isCompleted"], json!(true));
    assert_eq!(body["watchedSeconds"], json!(600));

    let (_, body) = send(&app, Method::GET, "/api/videos/1/progress", Some(LEARNER), None).await;
    assert_eq!(body["isCompleted"], json!(true));

    let (_, body) = send(&app, Method::GET, "/api/dashboard", Some(LEARNER), None).await;
    assert_eq!(body["unlocked"], json!([1, 2]));
    assert_eq!(body["stage"], json!(2));
}

#[tokio::test]
async fn malformed_tick_is_a_bad_request() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/videos/1/ticks",
        Some(LEARNER),
        Some(r#"{"deltaSeconds": "lots"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/videos/1/ticks",
        Some(LEARNER),
        Some(r#"{"isCompleted": false}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_video_and_survey_are_not_found() {
    let app = test_app().await;
    for uri in ["/api/videos/42", "/api/videos/42/survey", "/api/videos/42/progress"] {
        let (status, body) = send(&app, Method::GET, uri, Some(LEARNER), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body["error"].is_string());
    }
    let (status, _) = send(&app, Method::GET, "/api/surveys/42", Some(LEARNER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn learners_cannot_reach_admin_routes() {
    let app = test_app().await;
    let (status, _) = send(&app, Method::GET, "/api/admin/report", Some(LEARNER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body = survey_body("VIDEO", Some(1));
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/surveys",
        Some(LEARNER),
        Some(&body),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn broken_answer_key_is_rejected() {
    let app = test_app().await;
    let body = json!({
        "title": "Check",
        "type": "VIDEO",
        "videoId": 1,
        "questions": [{ "text": "One?", "options": [
            { "text": "a", "isCorrect": true },
            { "text": "b", "isCorrect": true }
        ]}]
    })
    .to_string();
    let (status, body) =
        send(&app, Method::POST, "/api/admin/surveys", Some(ADMIN), Some(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("exactly 1 correct option"));
}

#[tokio::test]
async fn authored_survey_is_answered_scored_and_reported() {
    let app = test_app().await;
    let body = survey_body("VIDEO", Some(1));
    let (status, survey) =
        send(&app, Method::POST, "/api/admin/surveys", Some(ADMIN), Some(&body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let survey_id = survey["id"].as_u64().unwrap();

    let (status, _) =
        send(&app, Method::POST, "/api/admin/surveys", Some(ADMIN), Some(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, status_body) =
        send(&app, Method::GET, "/api/videos/1/survey", Some(LEARNER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_body["surveyId"], json!(survey_id));
    assert_eq!(status_body["alreadyFilled"], json!(false));

    let uri = format!("/api/surveys/{survey_id}");
    let (status, view) = send(&app, Method::GET, &uri, Some(LEARNER), None).await;
    assert_eq!(status, StatusCode::OK);
    let questions = view["survey"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions[0]["options"][0].get("isCorrect").is_none());

    // Two right, one wrong.
    let answers: Vec<Value> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let pick = usize::from(i == 2);
            json!({ "questionId": q["id"], "optionId": q["options"][pick]["id"] })
        })
        .collect();
    let submit = json!({ "answers": answers }).to_string();
    let (status, score) = send(
        &app,
        Method::POST,
        &format!("{uri}/responses"),
        Some(LEARNER),
        Some(&submit),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(score, json!({ "total": 3, "correct": 2, "wrong": 1, "scorePct": 67 }));

    let (_, dashboard) = send(&app, Method::GET, "/api/dashboard", Some(LEARNER), None).await;
    assert_eq!(dashboard["unlocked"], json!([1, 2]));

    let (status, report) = send(&app, Method::GET, "/api/admin/report", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = report["videos"][0]["users"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["survey"]["filled"], json!(true));

    let detail_uri = format!("/api/admin/report/surveys/{survey_id}/users/{LEARNER}");
    let (status, detail) = send(&app, Method::GET, &detail_uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail.is_object());
}

#[tokio::test]
async fn admin_can_rename_and_deactivate_a_survey() {
    let app = test_app().await;
    let body = survey_body("VIDEO", Some(2));
    let (_, survey) =
        send(&app, Method::POST, "/api/admin/surveys", Some(ADMIN), Some(&body)).await;
    let uri = format!("/api/admin/surveys/{}", survey["id"]);

    let (status, renamed) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(ADMIN),
        Some(r#"{"title": "  Renamed  "}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["title"], json!("Renamed"));

    let (status, gone) = send(&app, Method::DELETE, &uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gone["isActive"], json!(false));

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/surveys/{}", survey["id"]),
        Some(LEARNER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
