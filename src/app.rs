use crate::auth as auth_service;
use crate::config;
use crate::error::ApiError;
use crate::state;
use crate::store::Database;
use crate::uploads::MAX_UPLOAD_BYTES;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use std::sync::Arc;
use std::time::Duration;

mod admin;
mod auth;
mod community;
mod courses;
mod extract;
mod files;
mod leaderboard;
mod notifications;
mod quizzes;
mod showcase;
mod users;

/// Multipart framing on top of the largest accepted file.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

pub fn app(config: config::AppConfig, db: Arc<Database>) -> Router {
    let auth = auth_service::AuthState::from_config(&config)
        .unwrap_or_else(|err| panic!("invalid auth configuration: {err}"));
    let cors = cors_layer(&config.cors_origins);
    let state = state::AppState { config, auth, db };

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/users/builders", get(users::builder_list))
        .route("/api/users/profile", put(users::profile_update))
        .route(
            "/api/users/avatar",
            post(users::avatar_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/users/{id}", get(users::user_profile))
        .route(
            "/api/courses",
            get(courses::course_list).post(courses::course_create),
        )
        .route(
            "/api/courses/{id}",
            get(courses::course_detail)
                .put(courses::course_update)
                .delete(courses::course_delete),
        )
        .route(
            "/api/courses/{id}/file",
            post(courses::course_file_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/questions",
            get(quizzes::question_list).post(quizzes::question_create),
        )
        .route(
            "/api/questions/{id}",
            get(quizzes::question_detail)
                .put(quizzes::question_update)
                .delete(quizzes::question_delete),
        )
        .route(
            "/api/quizzes",
            get(quizzes::quiz_list).post(quizzes::quiz_create),
        )
        .route(
            "/api/quizzes/{id}",
            get(quizzes::quiz_detail)
                .put(quizzes::quiz_update)
                .delete(quizzes::quiz_delete),
        )
        .route("/api/quizzes/{id}/submit", post(quizzes::quiz_submit))
        .route("/api/submissions", get(quizzes::submission_list))
        .route("/api/submissions/me", get(quizzes::my_submissions))
        .route("/api/leaderboard", get(leaderboard::leaderboard))
        .route(
            "/api/posts",
            get(community::post_list).post(community::post_create),
        )
        .route(
            "/api/posts/{id}",
            get(community::post_detail).delete(community::post_delete),
        )
        .route("/api/posts/{id}/vote", post(community::post_vote))
        .route("/api/posts/{id}/answers", post(community::answer_create))
        .route(
            "/api/posts/{id}/answers/{answer_id}",
            delete(community::answer_delete),
        )
        .route(
            "/api/posts/{id}/answers/{answer_id}/vote",
            post(community::answer_vote),
        )
        .route(
            "/api/projects",
            get(showcase::project_list).post(showcase::project_create),
        )
        .route(
            "/api/projects/{id}",
            get(showcase::project_detail)
                .put(showcase::project_update)
                .delete(showcase::project_delete),
        )
        .route("/api/projects/{id}/like", post(showcase::project_like))
        .route(
            "/api/ideas",
            get(showcase::idea_list).post(showcase::idea_create),
        )
        .route(
            "/api/ideas/{id}",
            get(showcase::idea_detail)
                .put(showcase::idea_update)
                .delete(showcase::idea_delete),
        )
        .route("/api/ideas/{id}/like", post(showcase::idea_like))
        .route("/api/ideas/{id}/join", post(showcase::idea_join))
        .route(
            "/api/notifications",
            get(notifications::notification_list).post(notifications::notification_create),
        )
        .route(
            "/api/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/api/notifications/read-all",
            put(notifications::mark_all_read),
        )
        .route(
            "/api/notifications/{id}",
            delete(notifications::notification_delete),
        )
        .route("/api/notifications/{id}/read", put(notifications::mark_read))
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/users", get(admin::user_list))
        .route(
            "/api/admin/users/{id}",
            delete(admin::user_delete),
        )
        .route("/api/admin/users/{id}/role", put(admin::role_update))
        .route("/files/{*path}", get(files::stored_file))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state,
            auth::identity_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// No configured origins means any origin may call the API.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("ignoring invalid CORS origin {origin:?}: {err}");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    message: &'static str,
}

impl MessageResponse {
    pub(crate) fn new(message: &'static str) -> Self {
        Self { message }
    }
}

pub(crate) struct FileUpload {
    pub(crate) bytes: Bytes,
    pub(crate) content_type: Option<String>,
    pub(crate) file_name: Option<String>,
}

/// Reads the multipart field named `file`; other fields are skipped.
pub(crate) async fn read_file_field(multipart: &mut Multipart) -> Result<FileUpload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        return Ok(FileUpload {
            bytes,
            content_type,
            file_name,
        });
    }
    Err(ApiError::bad_request("a file field is required"))
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::accounts::{self, NewAccount};
    use crate::types::quiz::Submission;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value as JsonValue, json};
    use time::OffsetDateTime;
    use tower::ServiceExt;
    use uuid::Uuid;

    use std::path::PathBuf;

    #[tokio::test]
    async fn app__should_return_ok_on_health_endpoint() {
        // Given
        let (app, _db) = test_app();

        // When
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        assert_eq!(body.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn register__should_reject_duplicate_email() {
        // Given
        let (app, db) = test_app();
        register(&app, "ada").await;

        // When
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Ada Again",
                "username": "ada2",
                "email": "ADA@example.com",
                "password": "secret123",
            })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");
        assert_eq!(db.read(|c| c.users.len()).await, 1);
    }

    #[tokio::test]
    async fn login__should_reject_wrong_password() {
        // Given
        let (app, _db) = test_app();
        register(&app, "ada").await;

        // When
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "nope-nope" })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn me__should_return_caller_for_valid_token() {
        // Given
        let (app, _db) = test_app();
        let (token, id) = register(&app, "ada").await;

        // When
        let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.to_string());
        assert_eq!(body["email"], "ada@example.com");
        assert!(body.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn me__should_reject_garbage_token() {
        // Given
        let (app, _db) = test_app();

        // When
        let (status, body) =
            send(&app, Method::GET, "/api/auth/me", Some("not-a-jwt"), None).await;

        // Then
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Not authorized, token failed");
    }

    #[tokio::test]
    async fn quiz_create__should_require_admin() {
        // Given
        let (app, db) = test_app();
        let (token, _) = register(&app, "ada").await;
        let quiz = json!({ "title": "Ownership", "questions": [] });

        // When
        let (anonymous, _) = send(&app, Method::POST, "/api/quizzes", None, Some(quiz.clone())).await;
        let (student, body) =
            send(&app, Method::POST, "/api/quizzes", Some(&token), Some(quiz)).await;

        // Then
        assert_eq!(anonymous, StatusCode::UNAUTHORIZED);
        assert_eq!(student, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Admin access required");
        assert!(db.read(|c| c.quizzes.is_empty()).await);
    }

    #[tokio::test]
    async fn quiz_submit__should_score_against_quiz_size() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;
        let (quiz_id, first, second) = create_quiz(&app, &admin).await;
        let (student, student_id) = register(&app, "ada").await;

        // When
        let (status, submission) = send(
            &app,
            Method::POST,
            &format!("/api/quizzes/{quiz_id}/submit"),
            Some(&student),
            Some(json!({
                "answers": [
                    { "question": first, "selectedOption": "A" },
                    { "question": second, "selectedOption": "B" },
                ]
            })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(submission["score"], 1);
        assert_eq!(submission["total"], 2);
        assert_eq!(submission["percentage"], 50.0);
        let streak = db.read(|c| c.users.get(student_id).map(|user| user.current_streak)).await;
        assert_eq!(streak, Some(1));
    }

    #[tokio::test]
    async fn quiz_detail__should_hide_answers_from_students() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;
        let question = create_question(&app, &admin, "B").await;
        let (_, quiz) = send(
            &app,
            Method::POST,
            "/api/quizzes",
            Some(&admin),
            Some(json!({ "title": "Traits", "questions": [question] })),
        )
        .await;
        let uri = format!("/api/quizzes/{}", quiz["id"].as_str().expect("quiz id"));
        let (student, _) = register(&app, "ada").await;

        // When
        let (_, as_student) = send(&app, Method::GET, &uri, Some(&student), None).await;
        let (_, as_admin) = send(&app, Method::GET, &uri, Some(&admin), None).await;

        // Then
        assert!(as_student["questions"][0].get("answer").is_none());
        assert_eq!(as_admin["questions"][0]["answer"], "B");
    }

    #[tokio::test]
    async fn quiz_create__should_reject_unknown_question() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;

        // When
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/quizzes",
            Some(&admin),
            Some(json!({ "title": "Ghosts", "questions": [Uuid::new_v4()] })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(db.read(|c| c.quizzes.is_empty()).await);
    }

    #[tokio::test]
    async fn leaderboard__should_cap_and_sort_rows() {
        // Given
        let (app, db) = test_app();
        db.write(|c| -> Result<_, ApiError> {
            for i in 0..25 {
                c.submissions.insert(Submission {
                    id: Uuid::new_v4(),
                    student: Uuid::new_v4(),
                    quiz: Uuid::new_v4(),
                    answers: Vec::new(),
                    score: i,
                    total: 25,
                    percentage: f64::from(i) * 4.0,
                    created_at: OffsetDateTime::now_utc(),
                });
            }
            Ok(())
        })
        .await
        .expect("seed submissions");

        // When
        let (status, body) = send(&app, Method::GET, "/api/leaderboard", None, None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().expect("rows");
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[0]["averagePercentage"], 96.0);
        assert_eq!(rows[0]["rank"], 1);
        let averages: Vec<f64> = rows
            .iter()
            .map(|row| row["averagePercentage"].as_f64().expect("average"))
            .collect();
        assert!(averages.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[tokio::test]
    async fn course_delete__should_remove_course_from_list() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;
        let (status, course) = send(
            &app,
            Method::POST,
            "/api/courses",
            Some(&admin),
            Some(json!({
                "title": "Rust basics",
                "description": "Ownership and borrowing",
                "category": "programming",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/courses/{}", course["id"].as_str().expect("course id"));

        // When
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
        let (_, list) = send(&app, Method::GET, "/api/courses", None, None).await;
        let (detail, _) = send(&app, Method::GET, &uri, None, None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, json!([]));
        assert_eq!(detail, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_vote__should_count_every_vote() {
        // Given
        let (app, _db) = test_app();
        let (token, _) = register(&app, "ada").await;
        let (_, post) = send(
            &app,
            Method::POST,
            "/api/posts",
            Some(&token),
            Some(json!({ "title": "Lifetimes", "body": "Why 'a?", "tags": ["Rust"] })),
        )
        .await;
        let uri = format!("/api/posts/{}/vote", post["id"].as_str().expect("post id"));

        // When
        send(&app, Method::POST, &uri, None, Some(json!({ "direction": "up" }))).await;
        let (status, body) =
            send(&app, Method::POST, &uri, None, Some(json!({ "direction": "up" }))).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["votes"], 2);
    }

    #[tokio::test]
    async fn post_delete__should_forbid_other_students() {
        // Given
        let (app, db) = test_app();
        let (author, _) = register(&app, "ada").await;
        let (other, _) = register(&app, "grace").await;
        let (_, post) = send(
            &app,
            Method::POST,
            "/api/posts",
            Some(&author),
            Some(json!({ "title": "Traits", "body": "dyn or impl?" })),
        )
        .await;
        let uri = format!("/api/posts/{}", post["id"].as_str().expect("post id"));

        // When
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&other), None).await;

        // Then
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(db.read(|c| c.posts.len()).await, 1);
    }

    #[tokio::test]
    async fn notifications__should_track_read_state_per_user() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;
        let (reader, _) = register(&app, "ada").await;
        let (other, _) = register(&app, "grace").await;
        let (status, notification) = send(
            &app,
            Method::POST,
            "/api/notifications",
            Some(&admin),
            Some(json!({ "title": "Quiz night", "message": "Friday at six" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = notification["id"].as_str().expect("notification id");

        // When
        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/notifications/{id}/read"),
            Some(&reader),
            None,
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::OK);
        let (_, reader_count) = send(
            &app,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&reader),
            None,
        )
        .await;
        let (_, other_count) = send(
            &app,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&other),
            None,
        )
        .await;
        let (_, other_list) =
            send(&app, Method::GET, "/api/notifications", Some(&other), None).await;
        assert_eq!(reader_count["count"], 0);
        assert_eq!(other_count["count"], 1);
        assert_eq!(other_list[0]["read"], false);
    }

    #[tokio::test]
    async fn idea_like__should_toggle_for_caller() {
        // Given
        let (app, _db) = test_app();
        let (owner, _) = register(&app, "ada").await;
        let (_, idea) = send(
            &app,
            Method::POST,
            "/api/ideas",
            Some(&owner),
            Some(json!({ "title": "Study groups", "description": "Match by course" })),
        )
        .await;
        let uri = format!("/api/ideas/{}/like", idea["id"].as_str().expect("idea id"));

        // When
        let (_, liked) = send(&app, Method::POST, &uri, Some(&owner), None).await;
        let (_, unliked) = send(&app, Method::POST, &uri, Some(&owner), None).await;

        // Then
        assert_eq!(liked, json!({ "liked": true, "likes": 1 }));
        assert_eq!(unliked, json!({ "liked": false, "likes": 0 }));
    }

    #[tokio::test]
    async fn admin_user_delete__should_refuse_own_account() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;
        let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&admin), None).await;
        let uri = format!("/api/admin/users/{}", me["id"].as_str().expect("admin id"));

        // When
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;

        // Then
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(db.read(|c| c.users.len()).await, 1);
    }

    #[tokio::test]
    async fn stored_file__should_serve_uploads_with_content_type() {
        // Given
        let root = create_temp_root("stored-file");
        let dir = root.join("uploads").join("2025").join("01");
        std::fs::create_dir_all(&dir).expect("create upload dir");
        std::fs::write(dir.join("badge.png"), b"\x89PNG\r\n\x1a\nrest").expect("write png");
        let config = config::AppConfig {
            data_dir: Some(root.clone()),
            ..Default::default()
        };
        let app = app(config, Arc::new(Database::in_memory()));

        // When
        let found = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/files/2025/01/badge.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");
        let missing = app
            .oneshot(
                Request::builder()
                    .uri("/files/2025/01/other.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(found.status(), StatusCode::OK);
        assert_eq!(
            found.headers().get(CONTENT_TYPE).expect("content type"),
            "image/png"
        );
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn quiz_submit__should_grade_blank_and_lowercase_selections() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;
        let (quiz_id, first, second) = create_quiz(&app, &admin).await;
        let (student, _) = register(&app, "ada").await;

        // When
        let (status, submission) = send(
            &app,
            Method::POST,
            &format!("/api/quizzes/{quiz_id}/submit"),
            Some(&student),
            Some(json!({
                "answers": [
                    { "question": first, "selectedOption": "a" },
                    { "question": second, "selectedOption": "" },
                ]
            })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::CREATED, "{submission}");
        assert_eq!(submission["score"], 1);
        assert_eq!(submission["total"], 2);
        assert_eq!(submission["answers"][1]["selectedOption"], JsonValue::Null);
        assert_eq!(submission["answers"][1]["correct"], false);
    }

    #[tokio::test]
    async fn quiz_submit__should_grade_null_selection_as_wrong() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;
        let (quiz_id, first, second) = create_quiz(&app, &admin).await;
        let (student, _) = register(&app, "ada").await;

        // When
        let (status, submission) = send(
            &app,
            Method::POST,
            &format!("/api/quizzes/{quiz_id}/submit"),
            Some(&student),
            Some(json!({
                "answers": [
                    { "question": first, "selectedOption": null },
                    { "question": second, "selectedOption": "C" },
                ]
            })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::CREATED, "{submission}");
        assert_eq!(submission["score"], 1);
        assert_eq!(submission["percentage"], 50.0);
    }

    #[tokio::test]
    async fn quiz_submit__should_skip_malformed_question_ids() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;
        let (quiz_id, first, _) = create_quiz(&app, &admin).await;
        let (student, _) = register(&app, "ada").await;

        // When
        let (status, submission) = send(
            &app,
            Method::POST,
            &format!("/api/quizzes/{quiz_id}/submit"),
            Some(&student),
            Some(json!({
                "answers": [
                    { "question": "64f1c2a9e4b0a1b2c3d4e5f6", "selectedOption": "A" },
                    { "question": first, "selectedOption": "A" },
                ]
            })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::CREATED, "{submission}");
        assert_eq!(submission["score"], 1);
        assert_eq!(submission["total"], 2);
        assert_eq!(submission["answers"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn avatar_upload__should_be_unavailable_without_data_dir() {
        // Given
        let (app, _db) = test_app();
        let (token, _) = register(&app, "ada").await;

        // When
        let (status, body) =
            send_upload(&app, "/api/users/avatar", &token, "me.png", "image/png", PNG).await;

        // Then
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "file uploads are not configured");
    }

    #[tokio::test]
    async fn avatar_upload__should_store_image_and_serve_it() {
        // Given
        let root = create_temp_root("avatar-upload");
        let (app, _db) = test_app_with_data_dir(&root);
        let (token, _) = register(&app, "ada").await;

        // When
        let (status, body) =
            send_upload(&app, "/api/users/avatar", &token, "me.png", "image/png", PNG).await;

        // Then
        assert_eq!(status, StatusCode::OK, "{body}");
        let avatar = body["avatar"].as_str().expect("avatar url");
        assert!(avatar.starts_with("/files/"));
        assert!(avatar.ends_with(".png"));
        let served = app
            .clone()
            .oneshot(Request::builder().uri(avatar).body(Body::empty()).unwrap())
            .await
            .expect("request failed");
        assert_eq!(served.status(), StatusCode::OK);
        assert_eq!(
            served.headers().get(CONTENT_TYPE).expect("content type"),
            "image/png"
        );

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn avatar_upload__should_reject_documents() {
        // Given
        let root = create_temp_root("avatar-pdf");
        let (app, db) = test_app_with_data_dir(&root);
        let (token, id) = register(&app, "ada").await;

        // When
        let (status, _) = send_upload(
            &app,
            "/api/users/avatar",
            &token,
            "notes.pdf",
            "application/pdf",
            PDF,
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let avatar = db
            .read(|c| c.users.get(id).and_then(|user| user.avatar.clone()))
            .await;
        assert_eq!(avatar, None);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn course_file_upload__should_reject_oversized_file() {
        // Given
        let root = create_temp_root("course-oversized");
        let (app, db) = test_app_with_data_dir(&root);
        let admin = admin_token(&app, &db).await;
        let course_id = create_course(&app, &admin).await;
        let mut bytes = PDF.to_vec();
        bytes.resize(MAX_UPLOAD_BYTES + 1, b' ');

        // When
        let (status, _) = send_upload(
            &app,
            &format!("/api/courses/{course_id}/file"),
            &admin,
            "huge.pdf",
            "application/pdf",
            &bytes,
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let file = db
            .read(|c| {
                c.courses
                    .iter()
                    .find_map(|course| course.file.as_ref().map(|file| file.path.clone()))
            })
            .await;
        assert_eq!(file, None);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn course_delete__should_remove_stored_file() {
        // Given
        let root = create_temp_root("course-file-delete");
        let (app, db) = test_app_with_data_dir(&root);
        let admin = admin_token(&app, &db).await;
        let course_id = create_course(&app, &admin).await;
        let (status, course) = send_upload(
            &app,
            &format!("/api/courses/{course_id}/file"),
            &admin,
            "syllabus.pdf",
            "application/pdf",
            PDF,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{course}");
        let path = course["file"]["path"].as_str().expect("file path").to_string();
        let url = course["file"]["url"].as_str().expect("file url").to_string();
        let stored = root.join("uploads").join(&path);
        assert!(stored.exists());

        // When
        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/courses/{course_id}"),
            Some(&admin),
            None,
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert!(!stored.exists());
        let (served, _) = send(&app, Method::GET, &url, None, None).await;
        assert_eq!(served, StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn answer_vote__should_adjust_answer_counter() {
        // Given
        let (app, _db) = test_app();
        let (token, _) = register(&app, "ada").await;
        let (post_id, answer_id) = create_answered_post(&app, &token, &token).await;
        let uri = format!("/api/posts/{post_id}/answers/{answer_id}/vote");

        // When
        send(&app, Method::POST, &uri, None, Some(json!({ "direction": "up" }))).await;
        send(&app, Method::POST, &uri, None, Some(json!({ "direction": "up" }))).await;
        let (status, body) =
            send(&app, Method::POST, &uri, None, Some(json!({ "direction": "down" }))).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["votes"], 1);
        let (_, post) = send(&app, Method::GET, &format!("/api/posts/{post_id}"), None, None).await;
        assert_eq!(post["answers"][0]["votes"], 1);
        assert_eq!(post["votes"], 0);
    }

    #[tokio::test]
    async fn answer_delete__should_only_allow_answer_author() {
        // Given
        let (app, _db) = test_app();
        let (asker, _) = register(&app, "ada").await;
        let (answerer, _) = register(&app, "grace").await;
        let (post_id, answer_id) = create_answered_post(&app, &asker, &answerer).await;
        let uri = format!("/api/posts/{post_id}/answers/{answer_id}");

        // When
        let (as_asker, _) = send(&app, Method::DELETE, &uri, Some(&asker), None).await;
        let (as_answerer, _) = send(&app, Method::DELETE, &uri, Some(&answerer), None).await;

        // Then
        assert_eq!(as_asker, StatusCode::FORBIDDEN);
        assert_eq!(as_answerer, StatusCode::OK);
        let (_, post) = send(&app, Method::GET, &format!("/api/posts/{post_id}"), None, None).await;
        assert_eq!(post["answerCount"], 0);
    }

    #[tokio::test]
    async fn role_update__should_promote_student_and_refuse_self_demotion() {
        // Given
        let (app, db) = test_app();
        let admin = admin_token(&app, &db).await;
        let (student, student_id) = register(&app, "ada").await;
        let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&admin), None).await;
        let admin_id = me["id"].as_str().expect("admin id").to_string();

        // When
        let (promoted, body) = send(
            &app,
            Method::PUT,
            &format!("/api/admin/users/{student_id}/role"),
            Some(&admin),
            Some(json!({ "role": "admin" })),
        )
        .await;
        let (demoted, _) = send(
            &app,
            Method::PUT,
            &format!("/api/admin/users/{admin_id}/role"),
            Some(&admin),
            Some(json!({ "role": "student" })),
        )
        .await;

        // Then
        assert_eq!(promoted, StatusCode::OK);
        assert_eq!(body["role"], "admin");
        let (stats, _) = send(&app, Method::GET, "/api/admin/stats", Some(&student), None).await;
        assert_eq!(stats, StatusCode::OK);
        assert_eq!(demoted, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn profile_update__should_apply_fields_and_reject_taken_username() {
        // Given
        let (app, _db) = test_app();
        let (ada, _) = register(&app, "ada").await;
        let (grace, _) = register(&app, "grace").await;

        // When
        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/users/profile",
            Some(&ada),
            Some(json!({
                "name": "Ada Lovelace",
                "bio": "  Engines and notes  ",
                "skills": ["Rust", " ", "Math"],
                "builderProfile": { "skills": ["Rust"], "role": "backend", "lookingForTeam": true },
            })),
        )
        .await;
        let (taken, taken_body) = send(
            &app,
            Method::PUT,
            "/api/users/profile",
            Some(&grace),
            Some(json!({ "username": "ADA" })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["name"], "Ada Lovelace");
        assert_eq!(body["bio"], "Engines and notes");
        assert_eq!(body["skills"], json!(["Rust", "Math"]));
        assert_eq!(body["builderProfile"]["lookingForTeam"], true);
        assert_eq!(taken, StatusCode::BAD_REQUEST);
        assert_eq!(taken_body["message"], "Username is already taken");
    }

    #[tokio::test]
    async fn builder_list__should_apply_query_filters() {
        // Given
        let (app, _db) = test_app();
        let (ada, _) = register(&app, "ada").await;
        let (grace, _) = register(&app, "grace").await;
        register(&app, "linus").await;
        for (token, profile) in [
            (&ada, json!({ "skills": ["Rust"], "role": "backend", "lookingForTeam": true })),
            (&grace, json!({ "skills": ["Go"], "role": "frontend", "lookingForTeam": false })),
        ] {
            let (status, _) = send(
                &app,
                Method::PUT,
                "/api/users/profile",
                Some(token),
                Some(json!({ "builderProfile": profile })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        // When
        let names = |body: JsonValue| -> Vec<String> {
            let mut names: Vec<String> = body
                .as_array()
                .expect("builders")
                .iter()
                .map(|builder| builder["username"].as_str().expect("username").to_string())
                .collect();
            names.sort();
            names
        };
        let (_, all) = send(&app, Method::GET, "/api/users/builders", None, None).await;
        let (_, by_skill) =
            send(&app, Method::GET, "/api/users/builders?skill=rust", None, None).await;
        let (_, by_role) =
            send(&app, Method::GET, "/api/users/builders?role=Frontend", None, None).await;
        let (_, looking) = send(
            &app,
            Method::GET,
            "/api/users/builders?lookingForTeam=true",
            None,
            None,
        )
        .await;

        // Then
        assert_eq!(names(all), vec!["ada".to_string(), "grace".to_string()]);
        assert_eq!(names(by_skill), vec!["ada".to_string()]);
        assert_eq!(names(by_role), vec!["grace".to_string()]);
        assert_eq!(names(looking), vec!["ada".to_string()]);
    }

    #[tokio::test]
    async fn project_like__should_count_one_like_per_user() {
        // Given
        let (app, _db) = test_app();
        let (owner, _) = register(&app, "ada").await;
        let (fan, _) = register(&app, "grace").await;
        let (status, project) = send(
            &app,
            Method::POST,
            "/api/projects",
            Some(&owner),
            Some(json!({ "title": "Borrow visualiser", "description": "Draws lifetimes" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{project}");
        let uri = format!(
            "/api/projects/{}/like",
            project["id"].as_str().expect("project id")
        );

        // When
        let (_, first) = send(&app, Method::POST, &uri, Some(&owner), None).await;
        let (_, second) = send(&app, Method::POST, &uri, Some(&fan), None).await;
        let (_, undone) = send(&app, Method::POST, &uri, Some(&owner), None).await;
        let (anonymous, _) = send(&app, Method::POST, &uri, None, None).await;

        // Then
        assert_eq!(first, json!({ "liked": true, "likes": 1 }));
        assert_eq!(second, json!({ "liked": true, "likes": 2 }));
        assert_eq!(undone, json!({ "liked": false, "likes": 1 }));
        assert_eq!(anonymous, StatusCode::UNAUTHORIZED);
    }

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const PDF: &[u8] = b"%PDF-1.7\n%course notes\n";

    fn test_app_with_data_dir(root: &std::path::Path) -> (Router, Arc<Database>) {
        let db = Arc::new(Database::in_memory());
        let config = config::AppConfig {
            data_dir: Some(root.to_path_buf()),
            ..Default::default()
        };
        (app(config, Arc::clone(&db)), db)
    }

    async fn send_upload(
        app: &Router,
        uri: &str,
        token: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> (StatusCode, JsonValue) {
        let boundary = "cogito-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.expect("request failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
        (status, json)
    }

    /// Creates questions answered `A` and `C` and a quiz holding both.
    async fn create_quiz(app: &Router, admin: &str) -> (String, String, String) {
        let first = create_question(app, admin, "A").await;
        let second = create_question(app, admin, "C").await;
        let (status, quiz) = send(
            app,
            Method::POST,
            "/api/quizzes",
            Some(admin),
            Some(json!({ "title": "Ownership", "questions": [first, second] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let quiz_id = quiz["id"].as_str().expect("quiz id").to_string();
        (quiz_id, first, second)
    }

    async fn create_course(app: &Router, admin: &str) -> String {
        let (status, course) = send(
            app,
            Method::POST,
            "/api/courses",
            Some(admin),
            Some(json!({
                "title": "Rust basics",
                "description": "Ownership and borrowing",
                "category": "programming",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        course["id"].as_str().expect("course id").to_string()
    }

    async fn create_answered_post(app: &Router, asker: &str, answerer: &str) -> (String, String) {
        let (_, post) = send(
            app,
            Method::POST,
            "/api/posts",
            Some(asker),
            Some(json!({ "title": "Lifetimes", "body": "Why 'a?" })),
        )
        .await;
        let post_id = post["id"].as_str().expect("post id").to_string();
        let (status, post) = send(
            app,
            Method::POST,
            &format!("/api/posts/{post_id}/answers"),
            Some(answerer),
            Some(json!({ "body": "The borrow outlives the owner." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let answer_id = post["answers"][0]["id"]
            .as_str()
            .expect("answer id")
            .to_string();
        (post_id, answer_id)
    }

    fn test_app() -> (Router, Arc<Database>) {
        let db = Arc::new(Database::in_memory());
        (app(config::AppConfig::default(), Arc::clone(&db)), db)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.expect("request failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
        (status, json)
    }

    async fn register(app: &Router, username: &str) -> (String, Uuid) {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "name": username,
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "secret123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");
        let token = body["token"].as_str().expect("token").to_string();
        let id = body["user"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("user id");
        (token, id)
    }

    async fn admin_token(app: &Router, db: &Database) -> String {
        accounts::ensure_admin(
            db,
            NewAccount {
                name: "Root".to_string(),
                username: "root".to_string(),
                email: "root@example.com".to_string(),
                password: "admin-secret".to_string(),
            },
        )
        .await
        .expect("create admin");
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "root@example.com", "password": "admin-secret" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().expect("token").to_string()
    }

    async fn create_question(app: &Router, admin: &str, answer: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/questions",
            Some(admin),
            Some(json!({
                "text": "Which option is right?",
                "options": ["first", "second", "third", "fourth"],
                "answer": answer,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().expect("question id").to_string()
    }

    fn create_temp_root(test_name: &str) -> PathBuf {
        let mut root = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        root.push(format!("cogitosphere-{}-{}", test_name, nanos));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root
    }
}
