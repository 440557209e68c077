use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{unique_username, TestApp};

struct Classroom {
    faculty_token: String,
    student_id: String,
    student_token: String,
    course_id: String,
}

/// A faculty-authored course with one enrolled student
async fn classroom(app: &TestApp) -> Classroom {
    let (_, faculty_token) = app.signup_with_role("faculty", "FACULTY").await;
    let (student_id, student_token) = app
        .signup(&unique_username("student"), "password123")
        .await;

    let (status, course) = app
        .send(
            "POST",
            "/api/courses",
            Some(&faculty_token),
            Some(json!({ "name": "Web Dev", "number": "CS4550" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", course);
    let course_id = course["_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/users/{}/courses/{}/enroll", student_id, course_id),
            Some(&student_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    Classroom {
        faculty_token,
        student_id,
        student_token,
        course_id,
    }
}

/// Creates a quiz with a true/false and a multiple choice question; returns (quiz id, correct choice id)
async fn authored_quiz(app: &TestApp, class: &Classroom, settings: Value) -> (String, String, String) {
    let (status, quiz) = app
        .send(
            "POST",
            &format!("/api/courses/{}/quizzes", class.course_id),
            Some(&class.faculty_token),
            Some(settings),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", quiz);
    let quiz_id = quiz["_id"].as_str().unwrap().to_string();

    let (status, tf) = app
        .send(
            "POST",
            &format!("/api/quizzes/{}/questions", quiz_id),
            Some(&class.faculty_token),
            Some(json!({
                "type": "TRUE_FALSE",
                "title": "Sky",
                "question": "The sky is blue",
                "points": 4,
                "correctAnswer": true
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", tf);
    let tf_id = tf["_id"].as_str().unwrap().to_string();

    let (status, mc) = app
        .send(
            "POST",
            &format!("/api/quizzes/{}/questions", quiz_id),
            Some(&class.faculty_token),
            Some(json!({
                "type": "MULTIPLE_CHOICE",
                "title": "Math",
                "question": "2 + 2 = ?",
                "points": 6,
                "answers": [
                    { "text": "3", "isCorrect": false },
                    { "text": "4", "isCorrect": true }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", mc);
    let mc_correct = mc["answers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|choice| choice["isCorrect"] == true)
        .and_then(|choice| choice["_id"].as_str())
        .unwrap()
        .to_string();

    (quiz_id, tf_id, format!("{}|{}", mc["_id"].as_str().unwrap(), mc_correct))
}

async fn publish(app: &TestApp, class: &Classroom, quiz_id: &str) {
    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/quizzes/{}/publish", quiz_id),
            Some(&class.faculty_token),
            Some(json!({ "published": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
#[ignore = "requires MongoDB and Redis"]
async fn test_student_takes_quiz_end_to_end() {
    let app = common::create_test_app().await;
    let class = classroom(&app).await;
    let (quiz_id, tf_id, mc) = authored_quiz(&app, &class, json!({ "title": "Quiz 1" })).await;
    let (mc_id, mc_correct) = mc.split_once('|').unwrap();

    // Unpublished quizzes are invisible to students
    let (status, _) = app
        .send("GET", &format!("/api/quizzes/{}", quiz_id), Some(&class.student_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    publish(&app, &class, &quiz_id).await;

    let (status, quiz) = app
        .send("GET", &format!("/api/quizzes/{}", quiz_id), Some(&class.student_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["points"], 10.0);
    assert_eq!(quiz["numberOfQuestions"], 2);

    // Students never see the answer key
    let (status, questions) = app
        .send(
            "GET",
            &format!("/api/quizzes/{}/questions", quiz_id),
            Some(&class.student_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rendered = questions.to_string();
    assert!(!rendered.contains("isCorrect"));
    assert!(!rendered.contains("correctAnswer"));

    let (status, session) = app
        .send(
            "POST",
            "/api/quiz-attempts",
            Some(&class.student_token),
            Some(json!({ "quiz": quiz_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", session);
    let attempt_id = session["attempt"]["_id"].as_str().unwrap().to_string();
    assert_eq!(session["attempt"]["attemptNumber"], 1);
    assert!(session["attempt"]["deadline"].is_string());

    // Starting again resumes the same attempt
    let (_, resumed) = app
        .send(
            "POST",
            "/api/quiz-attempts",
            Some(&class.student_token),
            Some(json!({ "quiz": quiz_id })),
        )
        .await;
    assert_eq!(resumed["attempt"]["_id"], attempt_id.as_str());

    let (status, saved) = app
        .send(
            "PUT",
            &format!("/api/quiz-attempts/{}/answers", attempt_id),
            Some(&class.student_token),
            Some(json!({ "answers": { tf_id.clone(): true } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", saved);
    assert_eq!(saved["answers"][&tf_id], true);

    // Results are not available before submission
    let (status, _) = app
        .send(
            "GET",
            &format!("/api/quiz-attempts/{}/results", attempt_id),
            Some(&class.student_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, results) = app
        .send(
            "POST",
            &format!("/api/quiz-attempts/{}/submit", attempt_id),
            Some(&class.student_token),
            Some(json!({ "answers": { mc_id: mc_correct } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", results);
    assert_eq!(results["score"], 10.0);
    assert_eq!(results["maxScore"], 10.0);
    assert_eq!(results["attempt"]["status"], "SUBMITTED");

    // Second submit is rejected
    let (status, _) = app
        .send(
            "POST",
            &format!("/api/quiz-attempts/{}/submit", attempt_id),
            Some(&class.student_token),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Single-attempt quiz: no more attempts
    let (status, _) = app
        .send(
            "POST",
            "/api/quiz-attempts",
            Some(&class.student_token),
            Some(json!({ "quiz": quiz_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, history) = app
        .send(
            "GET",
            &format!("/api/users/{}/quizzes/{}/attempts", class.student_id, quiz_id),
            Some(&class.student_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires MongoDB and Redis"]
async fn test_access_code_is_enforced() {
    let app = common::create_test_app().await;
    let class = classroom(&app).await;
    let (quiz_id, _, _) = authored_quiz(
        &app,
        &class,
        json!({ "title": "Locked", "accessCode": "open-sesame" }),
    )
    .await;
    publish(&app, &class, &quiz_id).await;

    let (status, quiz) = app
        .send("GET", &format!("/api/quizzes/{}", quiz_id), Some(&class.student_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["requiresAccessCode"], true);
    assert_eq!(quiz["accessCode"], "");

    let (status, _) = app
        .send(
            "POST",
            "/api/quiz-attempts",
            Some(&class.student_token),
            Some(json!({ "quiz": quiz_id, "accessCode": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            "POST",
            "/api/quiz-attempts",
            Some(&class.student_token),
            Some(json!({ "quiz": quiz_id, "accessCode": "open-sesame" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
#[ignore = "requires MongoDB and Redis"]
async fn test_faculty_preview_leaves_no_history() {
    let app = common::create_test_app().await;
    let class = classroom(&app).await;
    let (quiz_id, tf_id, _) = authored_quiz(&app, &class, json!({ "title": "Preview me" })).await;

    let (status, session) = app
        .send(
            "POST",
            "/api/quiz-attempts",
            Some(&class.faculty_token),
            Some(json!({ "quiz": quiz_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", session);
    assert_eq!(session["attempt"]["preview"], true);
    let attempt_id = session["attempt"]["_id"].as_str().unwrap().to_string();

    let (status, results) = app
        .send(
            "POST",
            &format!("/api/quiz-attempts/{}/submit", attempt_id),
            Some(&class.faculty_token),
            Some(json!({ "answers": { tf_id: false } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", results);
    assert_eq!(results["score"], 0.0);

    let count = app
        .db
        .collection::<mongodb::bson::Document>("quiz_attempts")
        .count_documents(mongodb::bson::doc! { "quiz": quiz_id.as_str() })
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore = "requires MongoDB and Redis"]
async fn test_students_cannot_author() {
    let app = common::create_test_app().await;
    let class = classroom(&app).await;
    let (quiz_id, tf_id, _) = authored_quiz(&app, &class, json!({ "title": "Guarded" })).await;

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/courses/{}/quizzes", class.course_id),
            Some(&class.student_token),
            Some(json!({ "title": "Nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            "DELETE",
            &format!("/api/quizzes/{}/questions/{}", quiz_id, tf_id),
            Some(&class.student_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/quizzes/{}/publish", quiz_id),
            Some(&class.student_token),
            Some(json!({ "published": true })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires MongoDB and Redis"]
async fn test_reorder_and_delete_questions_update_totals() {
    let app = common::create_test_app().await;
    let class = classroom(&app).await;
    let (quiz_id, tf_id, mc) = authored_quiz(&app, &class, json!({ "title": "Order" })).await;
    let (mc_id, _) = mc.split_once('|').unwrap();

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/quizzes/{}/questions/order", quiz_id),
            Some(&class.faculty_token),
            Some(json!({ "order": [mc_id, tf_id.clone()] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, questions) = app
        .send(
            "GET",
            &format!("/api/quizzes/{}/questions", quiz_id),
            Some(&class.faculty_token),
            None,
        )
        .await;
    assert_eq!(questions[0]["_id"], mc_id);

    // Not a permutation of the quiz's questions
    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/quizzes/{}/questions/order", quiz_id),
            Some(&class.faculty_token),
            Some(json!({ "order": [mc_id] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "DELETE",
            &format!("/api/quizzes/{}/questions/{}", quiz_id, tf_id),
            Some(&class.faculty_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, quiz) = app
        .send("GET", &format!("/api/quizzes/{}", quiz_id), Some(&class.faculty_token), None)
        .await;
    assert_eq!(quiz["points"], 6.0);
    assert_eq!(quiz["numberOfQuestions"], 1);
}

#[tokio::test]
#[ignore = "requires MongoDB and Redis"]
async fn test_quiz_settings_update_clears_dates_and_keeps_totals() {
    let app = common::create_test_app().await;
    let class = classroom(&app).await;
    let (quiz_id, _, _) = authored_quiz(
        &app,
        &class,
        json!({ "title": "Dated", "availableDate": "2099-01-01T09:00", "untilDate": "2099-02-01" }),
    )
    .await;

    let (status, quiz) = app
        .send(
            "PUT",
            &format!("/api/quizzes/{}", quiz_id),
            Some(&class.faculty_token),
            Some(json!({ "title": "Always open", "availableDate": "", "untilDate": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", quiz);
    assert_eq!(quiz["title"], "Always open");
    assert!(quiz["availableDate"].is_null());
    assert!(quiz["untilDate"].is_null());
    // totals come from the question edits, not the settings form
    assert_eq!(quiz["points"], 10.0);
    assert_eq!(quiz["numberOfQuestions"], 2);

    let (_, quiz) = app
        .send("GET", &format!("/api/quizzes/{}", quiz_id), Some(&class.faculty_token), None)
        .await;
    assert_eq!(quiz["availability"]["status"], "AVAILABLE");
}

async fn active_attempts_gauge(app: &TestApp) -> f64 {
    use axum::body::{to_bytes, Body};
    use base64::{engine::general_purpose, Engine as _};
    use tower::ServiceExt;

    let credentials =
        std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    let response = app
        .router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/metrics")
                .header(
                    "authorization",
                    format!("Basic {}", general_purpose::STANDARD.encode(credentials)),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .find_map(|line| line.strip_prefix("quiz_attempts_active "))
        .and_then(|value| value.trim().parse().ok())
        .expect("quiz_attempts_active exported")
}

#[tokio::test]
#[ignore = "requires MongoDB and Redis"]
async fn test_active_attempts_gauge_follows_storage() {
    use mongodb::bson::{doc, Document};

    let app = common::create_test_app().await;
    let attempts = app.db.collection::<Document>("quiz_attempts");
    let quiz = format!("gauge-{}", uuid::Uuid::new_v4());

    // Written behind the API's back, as a sweeper in another process would see them
    let docs: Vec<Document> = (1..=3)
        .map(|n| {
            doc! {
                "_id": uuid::Uuid::new_v4().to_string(),
                "user": "gauge-user",
                "quiz": quiz.as_str(),
                "attemptNumber": n,
                "status": "IN_PROGRESS",
            }
        })
        .collect();
    attempts.insert_many(docs).await.unwrap();

    assert!(active_attempts_gauge(&app).await >= 3.0);

    attempts
        .delete_many(doc! { "quiz": quiz.as_str() })
        .await
        .unwrap();
}
