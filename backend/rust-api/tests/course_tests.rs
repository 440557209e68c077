use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::unique_username;

#[tokio::test]
#[ignore = "requires MongoDB and Redis"]
async fn test_course_lifecycle_with_modules_and_assignments() {
    let app = common::create_test_app().await;
    let (faculty_id, faculty) = app.signup_with_role("prof", "FACULTY").await;
    let (student_id, student) = app.signup(&unique_username("pupil"), "password123").await;

    let (status, course) = app
        .send("POST", "/api/courses", Some(&faculty), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(course["name"], "New Course");
    let course_id = course["_id"].as_str().unwrap().to_string();

    // The author is enrolled automatically
    let (_, enrolled) = app
        .send(
            "GET",
            &format!("/api/users/{}/courses/{}/enrollment", faculty_id, course_id),
            Some(&faculty),
            None,
        )
        .await;
    assert_eq!(enrolled["enrolled"], true);

    // Not a member yet
    let (status, _) = app
        .send("GET", &format!("/api/courses/{}", course_id), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Enrolling twice is idempotent
    for _ in 0..2 {
        let (status, _) = app
            .send(
                "POST",
                &format!("/api/users/{}/courses/{}/enroll", student_id, course_id),
                Some(&student),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, people) = app
        .send("GET", &format!("/api/courses/{}/users", course_id), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(people.as_array().unwrap().len(), 2);

    let (status, module) = app
        .send(
            "POST",
            &format!("/api/courses/{}/modules", course_id),
            Some(&faculty),
            Some(json!({ "name": "Week 1", "lessons": [{ "name": "Intro" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", module);
    let module_id = module["_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/courses/{}/modules/{}", course_id, module_id),
            Some(&student),
            Some(json!({ "name": "Hacked" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, module) = app
        .send(
            "PUT",
            &format!("/api/courses/{}/modules/{}", course_id, module_id),
            Some(&faculty),
            Some(json!({ "name": "Week One" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(module["name"], "Week One");

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/courses/{}/assignments", course_id),
            Some(&faculty),
            Some(json!({ "title": "Draft", "points": 10, "published": false })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .send(
            "POST",
            &format!("/api/courses/{}/assignments", course_id),
            Some(&faculty),
            Some(json!({ "title": "A1", "points": 100, "published": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Students only see published assignments
    let (_, visible) = app
        .send(
            "GET",
            &format!("/api/courses/{}/assignments", course_id),
            Some(&student),
            None,
        )
        .await;
    assert_eq!(visible.as_array().unwrap().len(), 1);
    let (_, all) = app
        .send(
            "GET",
            &format!("/api/courses/{}/assignments", course_id),
            Some(&faculty),
            None,
        )
        .await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, _) = app
        .send(
            "DELETE",
            &format!("/api/users/{}/courses/{}/unenroll", student_id, course_id),
            Some(&student),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send("DELETE", &format!("/api/courses/{}", course_id), Some(&faculty), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send("GET", &format!("/api/courses/{}", course_id), Some(&faculty), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires MongoDB and Redis"]
async fn test_people_management_is_restricted() {
    let app = common::create_test_app().await;
    let (_, admin) = app.signup_with_role("admin", "ADMIN").await;
    let (other_id, other) = app.signup(&unique_username("other"), "password123").await;
    let (_, student) = app.signup(&unique_username("nosy"), "password123").await;

    let (status, _) = app.send("GET", "/api/users", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send("GET", &format!("/api/users/{}", other_id), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send("GET", &format!("/api/users/{}", other_id), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", "/api/enrollments", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let username = unique_username("ta");
    let (status, created) = app
        .send(
            "POST",
            "/api/users",
            Some(&admin),
            Some(json!({ "username": username, "password": "password123", "role": "TA" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["role"], "TA");

    let (status, users) = app
        .send("GET", "/api/users?role=TA", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(users
        .as_array()
        .unwrap()
        .iter()
        .all(|user| user["role"] == "TA"));

    let (status, _) = app
        .send("DELETE", &format!("/api/users/{}", other_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
