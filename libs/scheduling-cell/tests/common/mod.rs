use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use scheduling_cell::memory::{
    FixedClock, InMemorySettingsService, InMemorySlotStore, InMemoryUserDirectory,
    RecordingCalendarSync,
};
use scheduling_cell::{
    CalendarSync, ClinicPolicy, Clock, SchedulingEngine, SettingsProvider, SlotStore, UserDirectory,
};
use shared_models::auth::{Role, UserProfile};

/// A Monday morning, before working hours start.
pub fn base_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 10)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

pub fn at(date: (i32, u32, u32), time: (u32, u32)) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .unwrap()
        .and_hms_opt(time.0, time.1, 0)
        .unwrap()
}

pub struct Harness {
    pub store: Arc<InMemorySlotStore>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub settings: Arc<InMemorySettingsService>,
    pub calendar: Arc<RecordingCalendarSync>,
    pub clock: Arc<FixedClock>,
    pub engine: Arc<SchedulingEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_work_hours(9, 20)
    }

    pub fn with_work_hours(start_hour: u32, end_hour: u32) -> Self {
        let store = Arc::new(InMemorySlotStore::new());
        let directory = Arc::new(InMemoryUserDirectory::new());
        let settings = Arc::new(InMemorySettingsService::default());
        let calendar = Arc::new(RecordingCalendarSync::new());
        let clock = Arc::new(FixedClock::at(base_now()));

        let engine = Arc::new(
            SchedulingEngine::new(
                Arc::clone(&store) as Arc<dyn SlotStore>,
                Arc::clone(&directory) as Arc<dyn UserDirectory>,
                Arc::clone(&settings) as Arc<dyn SettingsProvider>,
                Arc::clone(&calendar) as Arc<dyn CalendarSync>,
            )
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .with_work_hours(start_hour, end_hour),
        );

        Self {
            store,
            directory,
            settings,
            calendar,
            clock,
            engine,
        }
    }

    pub async fn practitioner(&self) -> UserProfile {
        let profile = profile(Role::Practitioner);
        self.directory.insert(profile.clone()).await;
        profile
    }

    pub async fn client(&self) -> UserProfile {
        let profile = profile(Role::Client);
        self.directory.insert(profile.clone()).await;
        profile
    }

    pub async fn set_policy(&self, policy: ClinicPolicy) {
        self.settings.update(policy).await;
    }
}

pub fn profile(role: Role) -> UserProfile {
    let id = Uuid::new_v4();
    UserProfile {
        id,
        email: format!("{}@clinic.example", id.simple()),
        first_name: "Alex".to_string(),
        last_name: "Morgan".to_string(),
        role,
        priority_practitioner_id: None,
    }
}

/// A policy with every limit wide open; tests tighten the one they exercise.
pub fn relaxed_policy() -> ClinicPolicy {
    ClinicPolicy {
        modification_window_hours: 2,
        daily_change_limit: 100,
        daily_booking_limit: 100,
        booking_24h_limit: 100,
        hourly_overlap_limit: 100,
    }
}
