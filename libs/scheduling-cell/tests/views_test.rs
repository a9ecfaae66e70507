mod common;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use scheduling_cell::{Slot, SlotStatus, SlotStore, StatsPeriod};

use common::{at, Harness};

fn week_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

async fn seed_booked(h: &Harness, practitioner: Uuid, client: Uuid, time: NaiveDateTime) -> Slot {
    seed_booked_with_duration(h, practitioner, client, time, 30).await
}

async fn seed_booked_with_duration(
    h: &Harness,
    practitioner: Uuid,
    client: Uuid,
    time: NaiveDateTime,
    duration_minutes: i32,
) -> Slot {
    let mut slot = Slot::new(
        practitioner,
        time,
        SlotStatus::Available,
        duration_minutes,
        common::base_now(),
    );
    slot.status = SlotStatus::Booked;
    slot.client_id = Some(client);
    slot.comment = Some("checkup".to_string());
    h.store.upsert_by_owner_time(&slot).await.unwrap()
}

async fn seed_with_status(
    h: &Harness,
    practitioner: Uuid,
    time: NaiveDateTime,
    status: SlotStatus,
) -> Slot {
    let mut slot = Slot::new(
        practitioner,
        time,
        SlotStatus::Available,
        30,
        common::base_now(),
    );
    slot.status = status;
    h.store.upsert_by_owner_time(&slot).await.unwrap()
}

// ==============================================================================
// WEEKLY CALENDAR
// ==============================================================================

#[tokio::test]
async fn weekly_calendar_excludes_available_slots() {
    let h = Harness::new();
    let practitioner = h.practitioner().await;
    let client = h.client().await;

    seed_booked(&h, practitioner.id, client.id, at((2024, 6, 10), (10, 0))).await;
    seed_with_status(&h, practitioner.id, at((2024, 6, 11), (11, 0)), SlotStatus::Blocked).await;
    seed_with_status(
        &h,
        practitioner.id,
        at((2024, 6, 12), (12, 0)),
        SlotStatus::Available,
    )
    .await;

    let rows = h
        .engine
        .weekly_calendar(practitioner.id, week_start())
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].status, SlotStatus::Booked);
    assert_eq!(rows[0].client_name.as_deref(), Some(client.email.as_str()));
    assert_eq!(rows[0].first_name.as_deref(), Some("Alex"));
    assert_eq!(rows[0].comment.as_deref(), Some("checkup"));
    assert_eq!(rows[1].status, SlotStatus::Blocked);
    assert_eq!(rows[1].client_id, None);
}

#[tokio::test]
async fn weekly_calendar_is_bounded_to_the_visible_week() {
    let h = Harness::new();
    let practitioner = h.practitioner().await;
    let client = h.client().await;

    // Before Monday 06:00, and after the following Sunday 22:00.
    seed_booked(&h, practitioner.id, client.id, at((2024, 6, 10), (5, 0))).await;
    seed_booked(&h, practitioner.id, client.id, at((2024, 6, 16), (23, 0))).await;
    seed_booked(&h, practitioner.id, client.id, at((2024, 6, 13), (9, 0))).await;

    let rows = h
        .engine
        .weekly_calendar(practitioner.id, week_start())
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].slot_time, at((2024, 6, 13), (9, 0)));
}

#[tokio::test]
async fn public_calendar_redacts_other_clients_bookings() {
    let h = Harness::new();
    let practitioner = h.practitioner().await;
    let owner = h.client().await;
    let viewer = h.client().await;

    let stored = seed_booked(&h, practitioner.id, owner.id, at((2024, 6, 10), (10, 0))).await;

    let rows = h
        .engine
        .public_weekly_calendar(practitioner.id, week_start(), viewer.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, SlotStatus::Blocked);
    assert_eq!(rows[0].client_id, None);
    assert_eq!(rows[0].client_name, None);
    assert_eq!(rows[0].first_name, None);
    assert_eq!(rows[0].last_name, None);
    assert_eq!(rows[0].comment, None);

    // The viewer's own booking is rendered in full.
    let rows = h
        .engine
        .public_weekly_calendar(practitioner.id, week_start(), owner.id)
        .await
        .unwrap();
    assert_eq!(rows[0].status, SlotStatus::Booked);
    assert_eq!(rows[0].client_id, Some(owner.id));

    // Redaction never touches the stored record.
    let persisted = h.store.find_by_id(stored.id).await.unwrap().unwrap();
    assert_eq!(persisted.status, SlotStatus::Booked);
    assert_eq!(persisted.client_id, Some(owner.id));
    assert_eq!(persisted.comment.as_deref(), Some("checkup"));
}

// ==============================================================================
// TIME-CATEGORY LISTING
// ==============================================================================

#[tokio::test]
async fn time_categories_partition_all_appointments() {
    let h = Harness::new();
    let practitioner = h.practitioner().await;
    let client = h.client().await;

    // Clock is Monday 2024-06-10 08:00; the week ends Sunday 2024-06-16.
    let past = seed_booked(&h, practitioner.id, client.id, at((2024, 6, 9), (10, 0))).await;
    let midnight = seed_booked(&h, practitioner.id, client.id, at((2024, 6, 10), (0, 0))).await;
    let today = seed_booked(&h, practitioner.id, client.id, at((2024, 6, 10), (15, 0))).await;
    let this_week = seed_booked(&h, practitioner.id, client.id, at((2024, 6, 11), (9, 0))).await;
    let sunday_late = seed_booked(&h, practitioner.id, client.id, at((2024, 6, 16), (23, 59))).await;
    let future = seed_booked(&h, practitioner.id, client.id, at((2024, 6, 17), (0, 0))).await;

    let categories = h
        .engine
        .appointments_by_time_categories(client.id)
        .await
        .unwrap();

    let ids = |slots: &[Slot]| slots.iter().map(|s| s.id).collect::<Vec<_>>();
    assert_eq!(ids(&categories.past), vec![past.id]);
    // Exactly midnight belongs to today, not to the past.
    assert_eq!(ids(&categories.today), vec![midnight.id, today.id]);
    assert_eq!(ids(&categories.this_week), vec![this_week.id, sunday_late.id]);
    assert_eq!(ids(&categories.future), vec![future.id]);

    let total = categories.past.len()
        + categories.today.len()
        + categories.this_week.len()
        + categories.future.len();
    assert_eq!(total, 6);
}

// ==============================================================================
// PATIENT HISTORY
// ==============================================================================

#[tokio::test]
async fn patient_history_pages_past_appointments_newest_first() {
    let h = Harness::new();
    let practitioner = h.practitioner().await;
    let client = h.client().await;

    for day in 1..=5 {
        seed_booked(&h, practitioner.id, client.id, at((2024, 6, day), (10, 0))).await;
    }
    // Future appointments never appear in history.
    seed_booked(&h, practitioner.id, client.id, at((2024, 6, 12), (10, 0))).await;

    let first_page = h.engine.patient_history(client.id, 0, 2).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].time, at((2024, 6, 5), (10, 0)));
    assert_eq!(first_page[1].time, at((2024, 6, 4), (10, 0)));

    let last_page = h.engine.patient_history(client.id, 2, 2).await.unwrap();
    assert_eq!(last_page.len(), 1);
    assert_eq!(last_page[0].time, at((2024, 6, 1), (10, 0)));

    // Out-of-range pages are empty, not an error.
    let beyond = h.engine.patient_history(client.id, 9, 2).await.unwrap();
    assert!(beyond.is_empty());

    assert_eq!(h.engine.patient_history_count(client.id).await.unwrap(), 5);
}

// ==============================================================================
// STATISTICS
// ==============================================================================

#[tokio::test]
async fn weekly_statistics_series_are_dense() {
    let h = Harness::new();
    let practitioner = h.practitioner().await;
    let client = h.client().await;

    seed_booked_with_duration(&h, practitioner.id, client.id, at((2024, 6, 10), (10, 0)), 30).await;
    seed_booked_with_duration(&h, practitioner.id, client.id, at((2024, 6, 10), (14, 0)), 60).await;
    seed_booked_with_duration(&h, practitioner.id, client.id, at((2024, 6, 12), (10, 0)), 30).await;
    // Non-booked slots are excluded from the counts.
    seed_with_status(&h, practitioner.id, at((2024, 6, 11), (10, 0)), SlotStatus::Available).await;

    // Any anchor inside the week resolves to the same Monday-based frame.
    let stats = h
        .engine
        .practitioner_statistics(
            practitioner.id,
            StatsPeriod::Week,
            Some(NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()),
        )
        .await
        .unwrap();

    assert_eq!(stats.daily_counts.len(), 7);
    assert_eq!(stats.daily_counts[0].date, week_start());
    assert_eq!(stats.daily_counts[0].count, 2);
    assert_eq!(stats.daily_counts[2].count, 1);
    assert_eq!(stats.daily_counts[6].count, 0);

    assert_eq!(stats.hourly_counts.len(), 24);
    assert_eq!(stats.hourly_counts[10].count, 2);
    assert_eq!(stats.hourly_counts[14].count, 1);
    assert_eq!(stats.hourly_counts[0].count, 0);

    assert_eq!(stats.total_booked_appointments, 3);
    assert!((stats.average_duration_minutes - 40.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn statistics_with_no_appointments_stay_dense_and_zeroed() {
    let h = Harness::new();
    let practitioner = h.practitioner().await;

    let stats = h
        .engine
        .practitioner_statistics(practitioner.id, StatsPeriod::Week, None)
        .await
        .unwrap();

    assert_eq!(stats.daily_counts.len(), 7);
    assert!(stats.daily_counts.iter().all(|d| d.count == 0));
    assert_eq!(stats.hourly_counts.len(), 24);
    assert_eq!(stats.total_booked_appointments, 0);
    assert_eq!(stats.average_duration_minutes, 0.0);
}

#[tokio::test]
async fn monthly_statistics_cover_the_whole_month() {
    let h = Harness::new();
    let practitioner = h.practitioner().await;
    let client = h.client().await;

    seed_booked(&h, practitioner.id, client.id, at((2024, 2, 29), (10, 0))).await;

    let stats = h
        .engine
        .practitioner_statistics(
            practitioner.id,
            StatsPeriod::Month,
            Some(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()),
        )
        .await
        .unwrap();

    // Leap February.
    assert_eq!(stats.daily_counts.len(), 29);
    assert_eq!(stats.daily_counts[28].count, 1);
    assert_eq!(stats.total_booked_appointments, 1);
}

// ==============================================================================
// NEXT-FREE-SLOT SEARCH
// ==============================================================================

#[tokio::test]
async fn next_free_slot_scans_working_hours_past_occupied_times() {
    let h = Harness::new();
    let free_practitioner = h.practitioner().await;
    let busy_practitioner = h.practitioner().await;
    let client = h.client().await;

    // 09:00 booked, 10:00 held by a placeholder: first free hour is 11:00.
    seed_booked(&h, busy_practitioner.id, client.id, at((2024, 6, 10), (9, 0))).await;
    seed_with_status(
        &h,
        busy_practitioner.id,
        at((2024, 6, 10), (10, 0)),
        SlotStatus::Blocked,
    )
    .await;

    let results = h.engine.next_free_slots(30).await.unwrap();
    assert_eq!(results.len(), 2);

    let for_practitioner = |id: Uuid| {
        results
            .iter()
            .find(|r| r.practitioner_id == id)
            .expect("practitioner missing from results")
    };
    assert_eq!(
        for_practitioner(free_practitioner.id).slot_time,
        at((2024, 6, 10), (9, 0))
    );
    assert_eq!(
        for_practitioner(busy_practitioner.id).slot_time,
        at((2024, 6, 10), (11, 0))
    );
    assert_eq!(for_practitioner(free_practitioner.id).duration_minutes, 30);
}

#[tokio::test]
async fn next_free_slot_skips_hours_already_in_the_past() {
    let h = Harness::new();
    let practitioner = h.practitioner().await;
    h.clock.set(at((2024, 6, 10), (12, 30)));

    let results = h.engine.next_free_slots(30).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].slot_time, at((2024, 6, 10), (13, 0)));
}

#[tokio::test]
async fn fully_booked_practitioner_is_omitted() {
    let h = Harness::with_work_hours(9, 9);
    let practitioner = h.practitioner().await;
    let client = h.client().await;

    // One working hour per day; occupy it for all eight scanned days.
    for offset in 0..=7 {
        seed_booked(
            &h,
            practitioner.id,
            client.id,
            at((2024, 6, 10 + offset), (9, 0)),
        )
        .await;
    }

    let results = h.engine.next_free_slots(30).await.unwrap();
    assert!(results.is_empty());
}
