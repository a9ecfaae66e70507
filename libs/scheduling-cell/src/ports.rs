// libs/scheduling-cell/src/ports.rs
//
// External collaborators of the scheduling engine. The engine owns every
// state transition; these traits own nothing but the mechanics of storage,
// settings, directory lookup, external calendar mirroring and time.
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use shared_models::auth::{Role, UserProfile};

use crate::models::{ClinicPolicy, Slot, SlotStatus};

/// Durable store of appointment slots. Implementations must keep
/// `(practitioner_id, time)` unique; `upsert_by_owner_time` is the only
/// write path that may create a row for a natural key.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Slot>>;

    async fn find_by_owner_and_time(
        &self,
        owner: Uuid,
        time: NaiveDateTime,
    ) -> Result<Option<Slot>>;

    /// Slots for one practitioner with `from <= time <= to`, ordered by time.
    async fn find_by_owner_and_time_range(
        &self,
        owner: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Slot>>;

    /// All slots where the given user is the client, ordered by time.
    async fn find_by_client(&self, client: Uuid) -> Result<Vec<Slot>>;

    async fn count_by_client_status_time_range(
        &self,
        client: Uuid,
        status: SlotStatus,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<u64>;

    async fn count_by_client_created_range(
        &self,
        client: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<u64>;

    /// Update an existing slot by id.
    async fn save(&self, slot: &Slot) -> Result<Slot>;

    /// Insert the slot, or replace the row already holding its
    /// `(practitioner_id, time)` key. The stored id and created_at of an
    /// existing row are preserved.
    async fn upsert_by_owner_time(&self, slot: &Slot) -> Result<Slot>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Read-only user directory resolved per request; profiles are never
/// embedded in slots.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<UserProfile>>;

    async fn find_by_role(&self, role: Role) -> Result<Vec<UserProfile>>;
}

/// Supplies the current clinic policy. Callers must not cache the result
/// across operations.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn current(&self) -> Result<ClinicPolicy>;
}

/// Best-effort mirror of booked slots into an external calendar. Failures
/// are absorbed and logged by the engine, never surfaced to the caller.
#[async_trait]
pub trait CalendarSync: Send + Sync {
    async fn push(&self, slot: &Slot) -> Result<()>;

    async fn remove(&self, slot: &Slot) -> Result<()>;
}

/// Clinic-local wall clock. All window, throttle and bucketing decisions go
/// through this so they stay deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Production clock reading local time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
