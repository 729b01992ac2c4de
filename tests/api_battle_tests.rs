//! Battle flow through the HTTP surface: start protocol, the submission
//! pipeline with winner ordering, time-limit enforcement, and rankings.


use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use codeduel_server::bus::battle_topic;
use codeduel_server::protocol::ServerEvent;

use test_helpers::*;

async fn create_room(app: &TestApp, owner: &str, capacity: u32, time_limit: u32) -> String {
    let response = request(
        &app.router,
        Method::POST,
        "/rooms/create",
        Some(owner),
        Some(json!({
            "topic": "ARRAY",
            "difficulty": "easy",
            "time_limit": time_limit,
            "capacity": capacity,
            "visibility": "public",
        })),
    )
    .await;
    let created = expect_json(response, StatusCode::CREATED).await;
    created["room_id"].as_str().unwrap().to_string()
}

async fn join(app: &TestApp, room_id: &str, user: &str) {
    let response = request(
        &app.router,
        Method::POST,
        &format!("/rooms/{room_id}/join"),
        Some(user),
        Some(json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "{user} failed to join");
}

async fn verify(
    app: &TestApp,
    user: &str,
    question_id: &str,
    room_id: &str,
) -> axum::http::Response<axum::body::Body> {
    request(
        &app.router,
        Method::POST,
        &format!("/battle/{question_id}/verify"),
        Some(user),
        Some(json!({
            "code": "def two_sum(nums, target):\n    return [0, 1]",
            "language": "python",
            "room_id": room_id,
        })),
    )
    .await
}

#[tokio::test]
async fn start_requires_question_and_host() {
    let app = build_app(&["alice", "bob"], true).await;
    let room_id = create_room(&app, "alice", 2, 10).await;
    join(&app, &room_id, "bob").await;

    // no eligible question seeded yet
    let response = request(
        &app.router,
        Method::POST,
        &format!("/rooms/{room_id}/start"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    seed_question(&app.server).await;

    // non-host cannot start
    let response = request(
        &app.router,
        Method::POST,
        &format!("/rooms/{room_id}/start"),
        Some("bob"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = request(
        &app.router,
        Method::POST,
        &format!("/rooms/{room_id}/start"),
        Some("alice"),
        None,
    )
    .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert!(body["question_id"].is_string());
}

#[tokio::test]
async fn solo_one_v_one_finish_through_http() {
    let app = build_app(&["alice", "bob"], true).await;
    let question_id = seed_question(&app.server).await.to_string();
    let room_id = create_room(&app, "alice", 2, 10).await;
    join(&app, &room_id, "bob").await;

    let response = request(
        &app.router,
        Method::POST,
        &format!("/rooms/{room_id}/start"),
        Some("alice"),
        None,
    )
    .await;
    let started = expect_json(response, StatusCode::OK).await;
    assert_eq!(started["question_id"].as_str().unwrap(), question_id);

    let room_uuid: Uuid = room_id.parse().unwrap();
    let mut battle_rx = app.server.bus().subscribe(&battle_topic(&room_uuid));

    let response = verify(&app, "bob", &question_id, &room_id).await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["all_passed"], true);
    assert_eq!(body["position"], 1);

    // battle_completed carries the winners and the room capacity
    let mut completed = None;
    while let Ok(event) = battle_rx.try_recv() {
        if let ServerEvent::BattleCompleted {
            winners,
            room_capacity,
            ..
        } = event.as_ref()
        {
            completed = Some((winners.clone(), *room_capacity));
        }
    }
    let (winners, capacity) = completed.expect("battle_completed published");
    assert_eq!(capacity, 2);
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].username, "bob");
    assert_eq!(winners[0].position, 1);

    let stats = app.server.store().user_stats("bob").await.unwrap();
    assert_eq!(stats.battles_won, 1);

    let room = app.server.store().get_room(&room_uuid).await.unwrap().unwrap();
    assert_eq!(room.status.to_string(), "completed");
}

#[tokio::test]
async fn winner_positions_are_ordered_and_capped() {
    let app = build_app(&["alice", "p1", "p2", "p3"], true).await;
    let question_id = seed_question(&app.server).await.to_string();
    let room_id = create_room(&app, "alice", 5, 10).await;
    for user in ["p1", "p2", "p3"] {
        join(&app, &room_id, user).await;
    }

    let response = request(
        &app.router,
        Method::POST,
        &format!("/rooms/{room_id}/start"),
        Some("alice"),
        None,
    )
    .await;
    expect_json(response, StatusCode::OK).await;

    let first = expect_json(
        verify(&app, "p1", &question_id, &room_id).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(first["position"], 1);

    // p1 resubmits: same position, no duplicate entry
    let again = expect_json(
        verify(&app, "p1", &question_id, &room_id).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(again["position"], 1);

    let second = expect_json(
        verify(&app, "p2", &question_id, &room_id).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(second["position"], 2);

    // max_winners for capacity 5 is 2: p3 is too late
    let response = verify(&app, "p3", &question_id, &room_id).await;
    let body = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert!(body["error"].as_str().unwrap().contains("ended"));

    let room_uuid: Uuid = room_id.parse().unwrap();
    let result = app
        .server
        .store()
        .battle_result(&room_uuid)
        .await
        .unwrap()
        .unwrap();
    let order: Vec<(String, u32)> = result
        .results
        .iter()
        .map(|e| (e.username.clone(), e.position))
        .collect();
    assert_eq!(order, vec![("p1".to_string(), 1), ("p2".to_string(), 2)]);
}

#[tokio::test]
async fn failing_submission_returns_report_without_position() {
    let app = build_app(&["alice", "bob"], false).await;
    let question_id = seed_question(&app.server).await.to_string();
    let room_id = create_room(&app, "alice", 2, 10).await;
    join(&app, &room_id, "bob").await;

    request(
        &app.router,
        Method::POST,
        &format!("/rooms/{room_id}/start"),
        Some("alice"),
        None,
    )
    .await;

    let body = expect_json(
        verify(&app, "bob", &question_id, &room_id).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["all_passed"], false);
    assert!(body.get("position").is_none());
    assert_eq!(body["results"].as_array().unwrap().len(), 3);

    let room_uuid: Uuid = room_id.parse().unwrap();
    assert!(app
        .server
        .store()
        .battle_result(&room_uuid)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn submission_to_unstarted_battle_is_rejected() {
    let app = build_app(&["alice", "bob"], true).await;
    let question_id = seed_question(&app.server).await.to_string();
    let room_id = create_room(&app, "alice", 2, 10).await;
    join(&app, &room_id, "bob").await;

    let body = expect_json(
        verify(&app, "bob", &question_id, &room_id).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert!(body["error"].as_str().unwrap().contains("not started"));
}

#[tokio::test]
async fn unsupported_language_is_rejected() {
    let app = build_app(&["alice", "bob"], true).await;
    let question_id = seed_question(&app.server).await.to_string();
    let room_id = create_room(&app, "alice", 2, 10).await;
    join(&app, &room_id, "bob").await;

    let response = request(
        &app.router,
        Method::POST,
        &format!("/battle/{question_id}/verify"),
        Some("bob"),
        Some(json!({
            "code": "print 1",
            "language": "cobol",
            "room_id": room_id,
        })),
    )
    .await;
    let body = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert!(body["error"].as_str().unwrap().contains("Unsupported"));
}

#[tokio::test]
async fn timeout_completes_with_empty_winners() {
    let app = build_app(&["alice", "p1", "p2"], true).await;
    let question_id = seed_question(&app.server).await.to_string();
    let room_id = create_room(&app, "alice", 5, 1).await;
    join(&app, &room_id, "p1").await;
    join(&app, &room_id, "p2").await;

    request(
        &app.router,
        Method::POST,
        &format!("/rooms/{room_id}/start"),
        Some("alice"),
        None,
    )
    .await;

    let room_uuid: Uuid = room_id.parse().unwrap();
    let mut battle_rx = app.server.bus().subscribe(&battle_topic(&room_uuid));

    // Simulate the deadline passing; the lazy enforcement path completes the
    // battle exactly as the clock task would.
    let expired = app
        .server
        .enforce_time_limit(&room_uuid, Utc::now() + Duration::minutes(2))
        .await
        .unwrap();
    assert!(expired);

    let mut completed = None;
    while let Ok(event) = battle_rx.try_recv() {
        if let ServerEvent::BattleCompleted {
            winners,
            room_capacity,
            ..
        } = event.as_ref()
        {
            completed = Some((winners.clone(), *room_capacity));
        }
    }
    let (winners, capacity) = completed.expect("battle_completed published");
    assert!(winners.is_empty());
    assert_eq!(capacity, 5);

    // A submission after the deadline sees a finished battle.
    let body = expect_json(
        verify(&app, "p1", &question_id, &room_id).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert!(body["error"].as_str().unwrap().contains("ended"));
}

#[tokio::test]
async fn battle_question_endpoint_serves_catalog_entry() {
    let app = build_app(&["alice"], true).await;
    let question_id = seed_question(&app.server).await.to_string();

    let response = request(
        &app.router,
        Method::GET,
        &format!("/battle/{question_id}"),
        Some("alice"),
        None,
    )
    .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["question"]["title"], "Two Sum");
    assert_eq!(body["testcases"].as_array().unwrap().len(), 3);
    assert_eq!(body["function_details"]["function_name"], "two_sum");

    let ghost = Uuid::new_v4();
    let response = request(
        &app.router,
        Method::GET,
        &format!("/battle/{ghost}"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn global_rankings_lists_rated_players() {
    let app = build_app(&["alice", "bob"], true).await;
    let question_id = seed_question(&app.server).await.to_string();

    // Ranked 1v1: bob must ready up before the start.
    let response = request(
        &app.router,
        Method::POST,
        "/rooms/create",
        Some("alice"),
        Some(json!({
            "topic": "ARRAY",
            "difficulty": "easy",
            "time_limit": 10,
            "capacity": 2,
            "visibility": "public",
            "is_ranked": true,
        })),
    )
    .await;
    let created = expect_json(response, StatusCode::CREATED).await;
    let room_id = created["room_id"].as_str().unwrap().to_string();
    join(&app, &room_id, "bob").await;

    let room_uuid: Uuid = room_id.parse().unwrap();
    let bob = app.identity("bob");
    app.server.set_ready(&bob, &room_uuid, true).await.unwrap();

    let response = request(
        &app.router,
        Method::POST,
        &format!("/rooms/{room_id}/start"),
        Some("alice"),
        None,
    )
    .await;
    expect_json(response, StatusCode::OK).await;

    expect_json(
        verify(&app, "bob", &question_id, &room_id).await,
        StatusCode::OK,
    )
    .await;

    let response = request(
        &app.router,
        Method::GET,
        "/battle/global-rankings",
        Some("alice"),
        None,
    )
    .await;
    let rankings = expect_json(response, StatusCode::OK).await;
    let rows = rankings.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["username"], "bob");
    assert_eq!(rows[0]["rank"], 1);
    assert!(rows[0]["rating"].as_f64().unwrap() > rows[1]["rating"].as_f64().unwrap());
}
