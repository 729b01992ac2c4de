use super::test_support::*;
use super::ServiceError;
use crate::bus::{room_topic, ROOMS_TOPIC};
use crate::protocol::{RoomStatus, ServerEvent};

#[tokio::test]
async fn create_room_publishes_room_list_update() {
    let server = passing_server().await;
    let mut rooms_rx = server.bus().subscribe(ROOMS_TOPIC);

    let alice = identity("alice");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();

    assert_eq!(room.owner, "alice");
    assert_eq!(room.participant_count, 1);
    let event = expect_event(&mut rooms_rx, |e| matches!(e, ServerEvent::RoomUpdate { .. }));
    let ServerEvent::RoomUpdate { rooms } = event.as_ref() else {
        unreachable!();
    };
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].room_id, room.room_id);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let server = passing_server().await;
    let alice = identity("alice");

    let mut cfg = room_config(2, 0, false); // unranked needs a time limit
    let err = server.create_room(&alice, &cfg).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidConfig(_)));

    cfg.time_limit = 10;
    cfg.capacity = 1;
    let err = server.create_room(&alice, &cfg).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidConfig(_)));
}

#[tokio::test]
async fn join_announces_participant_and_system_chat() {
    let server = passing_server().await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();

    let mut room_rx = server.bus().subscribe(&room_topic(&room.room_id));
    let detail = server.join_room(&bob, &room.room_id, None).await.unwrap();
    assert_eq!(detail.room.participant_count, 2);

    expect_event(&mut room_rx, |e| {
        matches!(
            e,
            ServerEvent::ChatMessage {
                is_system: true,
                message,
                ..
            } if message == "bob joined the lobby"
        )
    });
    expect_event(&mut room_rx, |e| {
        matches!(e, ServerEvent::ParticipantUpdate { participants } if participants.len() == 2)
    });
}

#[tokio::test]
async fn join_full_room_returns_full() {
    let server = passing_server().await;
    let alice = identity("alice");
    let bob = identity("bob");
    let carol = identity("carol");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();

    server.join_room(&bob, &room.room_id, None).await.unwrap();
    let err = server
        .join_room(&carol, &room.room_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Full));
}

#[tokio::test]
async fn kick_is_host_only_and_blocks_rejoin() {
    let server = passing_server().await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(5, 10, false))
        .await
        .unwrap();
    server.join_room(&bob, &room.room_id, None).await.unwrap();

    let err = server
        .kick_participant(&bob, &room.room_id, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let mut room_rx = server.bus().subscribe(&room_topic(&room.room_id));
    server
        .kick_participant(&alice, &room.room_id, "bob")
        .await
        .unwrap();
    expect_event(&mut room_rx, |e| {
        matches!(e, ServerEvent::Kicked { username } if username == "bob")
    });

    let err = server.join_room(&bob, &room.room_id, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn ready_toggle_publishes_status() {
    let server = passing_server().await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(2, 10, true))
        .await
        .unwrap();
    server.join_room(&bob, &room.room_id, None).await.unwrap();

    let mut room_rx = server.bus().subscribe(&room_topic(&room.room_id));
    server.set_ready(&bob, &room.room_id, true).await.unwrap();
    expect_event(&mut room_rx, |e| {
        matches!(e, ServerEvent::ReadyStatus { username, ready: true } if username == "bob")
    });
}

#[tokio::test]
async fn host_leaving_active_room_closes_it() {
    let server = passing_server().await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();
    server.join_room(&bob, &room.room_id, None).await.unwrap();

    let mut room_rx = server.bus().subscribe(&room_topic(&room.room_id));
    server.leave_room(&alice, &room.room_id).await.unwrap();

    expect_event(&mut room_rx, |e| matches!(e, ServerEvent::RoomClosed));
    let current = server.store().get_room(&room.room_id).await.unwrap().unwrap();
    assert_eq!(current.status, RoomStatus::Closed);
    assert!(!current.is_active);
    // chat was cleared on close
    assert!(server.chat_history(&room.room_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn non_host_leaving_does_not_close() {
    let server = passing_server().await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();
    server.join_room(&bob, &room.room_id, None).await.unwrap();

    server.leave_room(&bob, &room.room_id).await.unwrap();
    let current = server.store().get_room(&room.room_id).await.unwrap().unwrap();
    assert_eq!(current.status, RoomStatus::Active);
    assert_eq!(current.participant_count, 1);
}

#[tokio::test]
async fn start_picks_question_and_spawns_clock() {
    let server = passing_server().await;
    let question_id = seed_question(&server).await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();
    server.join_room(&bob, &room.room_id, None).await.unwrap();

    let picked = server.start_battle(&alice, &room.room_id).await.unwrap();
    assert_eq!(picked, question_id);

    let current = server.store().get_room(&room.room_id).await.unwrap().unwrap();
    assert_eq!(current.status, RoomStatus::Playing);
    assert_eq!(current.active_question, Some(question_id));
    assert!(current.start_time.is_some());
    assert!(server.has_battle_clock(&room.room_id));
}

#[tokio::test]
async fn start_without_eligible_question_fails() {
    let server = passing_server().await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();
    server.join_room(&bob, &room.room_id, None).await.unwrap();

    let err = server.start_battle(&alice, &room.room_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn ranked_start_requires_all_non_host_ready() {
    let server = passing_server().await;
    seed_question(&server).await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(2, 10, true))
        .await
        .unwrap();
    server.join_room(&bob, &room.room_id, None).await.unwrap();

    let err = server.start_battle(&alice, &room.room_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // host readiness is irrelevant; bob alone gates the start
    server.set_ready(&bob, &room.room_id, true).await.unwrap();
    server.start_battle(&alice, &room.room_id).await.unwrap();
}

#[tokio::test]
async fn update_status_honors_state_machine() {
    let server = passing_server().await;
    seed_question(&server).await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();
    server.join_room(&bob, &room.room_id, None).await.unwrap();

    // active -> completed is not a legal transition
    let err = server
        .update_status(&alice, &room.room_id, RoomStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // non-host cannot touch status
    let err = server
        .update_status(&bob, &room.room_id, RoomStatus::Closed)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    server.start_battle(&alice, &room.room_id).await.unwrap();
    let updated = server
        .update_status(&alice, &room.room_id, RoomStatus::Completed)
        .await
        .unwrap();
    assert_eq!(updated.status, RoomStatus::Completed);
}

#[tokio::test]
async fn close_room_is_host_only() {
    let server = passing_server().await;
    let alice = identity("alice");
    let bob = identity("bob");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();
    server.join_room(&bob, &room.room_id, None).await.unwrap();

    let err = server.close_room(&bob, &room.room_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    server.close_room(&alice, &room.room_id).await.unwrap();
    let current = server.store().get_room(&room.room_id).await.unwrap().unwrap();
    assert_eq!(current.status, RoomStatus::Closed);

    // closing twice is an invalid state
    let err = server.close_room(&alice, &room.room_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn chat_roundtrip_and_validation() {
    let server = passing_server().await;
    let alice = identity("alice");
    let room = server
        .create_room(&alice, &room_config(2, 10, false))
        .await
        .unwrap();

    let err = server.post_chat(&alice, &room.room_id, "   ").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidConfig(_)));

    let mut room_rx = server.bus().subscribe(&room_topic(&room.room_id));
    server.post_chat(&alice, &room.room_id, "gl hf").await.unwrap();
    expect_event(&mut room_rx, |e| {
        matches!(
            e,
            ServerEvent::ChatMessage {
                message,
                sender,
                is_system: false,
                ..
            } if message == "gl hf" && sender == "alice"
        )
    });

    let history = server.chat_history(&room.room_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "gl hf");
}
