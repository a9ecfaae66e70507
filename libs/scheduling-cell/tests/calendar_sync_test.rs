mod common;

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::memory::{InMemorySettingsService, InMemorySlotStore, InMemoryUserDirectory};
use scheduling_cell::{
    BookSlotRequest, CalendarSync, RestCalendarSync, SchedulingEngine, Slot, SlotStatus,
};
use shared_models::auth::CallerContext;

use common::at;

fn booked_slot() -> Slot {
    let mut slot = Slot::new(
        Uuid::new_v4(),
        at((2024, 6, 10), (10, 0)),
        SlotStatus::Available,
        30,
        common::base_now(),
    );
    slot.status = SlotStatus::Booked;
    slot.client_id = Some(Uuid::new_v4());
    slot
}

#[tokio::test]
async fn push_upserts_an_event_keyed_by_slot_id() {
    let server = MockServer::start().await;
    let slot = booked_slot();

    Mock::given(method("PUT"))
        .and(path(format!("/events/{}", slot.id)))
        .and(body_partial_json(json!({
            "client_id": slot.client_id,
            "practitioner_id": slot.practitioner_id,
            "duration_minutes": 30
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sync = RestCalendarSync::new(server.uri());
    sync.push(&slot).await.unwrap();
}

#[tokio::test]
async fn push_without_a_client_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut slot = booked_slot();
    slot.client_id = None;
    slot.status = SlotStatus::Available;

    let sync = RestCalendarSync::new(server.uri());
    sync.push(&slot).await.unwrap();
}

#[tokio::test]
async fn push_surfaces_api_errors_to_the_engine() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("mirror down"))
        .mount(&server)
        .await;

    let sync = RestCalendarSync::new(server.uri());
    let result = sync.push(&booked_slot()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn remove_treats_missing_events_as_removed() {
    let server = MockServer::start().await;
    let slot = booked_slot();

    Mock::given(method("DELETE"))
        .and(path(format!("/events/{}", slot.id)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let sync = RestCalendarSync::new(server.uri());
    sync.remove(&slot).await.unwrap();
}

#[tokio::test]
async fn remove_surfaces_api_errors_to_the_engine() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sync = RestCalendarSync::new(server.uri());
    let result = sync.remove(&booked_slot()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn booking_succeeds_while_the_mirror_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let directory = Arc::new(InMemoryUserDirectory::new());
    let practitioner = common::profile(shared_models::auth::Role::Practitioner);
    let client = common::profile(shared_models::auth::Role::Client);
    directory.insert(practitioner.clone()).await;
    directory.insert(client.clone()).await;

    let engine = SchedulingEngine::new(
        Arc::new(InMemorySlotStore::new()),
        directory,
        Arc::new(InMemorySettingsService::default()),
        Arc::new(RestCalendarSync::new(server.uri())),
    );

    let booked = engine
        .book_slot(
            BookSlotRequest {
                practitioner_id: practitioner.id,
                client_id: client.id,
                time: at((2030, 6, 10), (10, 0)),
                duration_minutes: 30,
                comment: None,
            },
            &CallerContext::client(client.id),
        )
        .await
        .unwrap();

    assert_eq!(booked.status, SlotStatus::Booked);
}
