// libs/scheduling-cell/src/memory.rs
//
// In-memory port implementations. They back the default binary wiring and
// every test in this workspace; swap them for real adapters at deployment.
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_models::auth::{Role, UserProfile};

use crate::models::{ClinicPolicy, Slot, SlotStatus};
use crate::ports::{CalendarSync, Clock, SettingsProvider, SlotStore, UserDirectory};

// ==============================================================================
// SLOT STORE
// ==============================================================================

#[derive(Default)]
pub struct InMemorySlotStore {
    slots: RwLock<HashMap<Uuid, Slot>>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows; used by tests asserting idempotent upserts.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Slot>> {
        Ok(self.slots.read().await.get(&id).cloned())
    }

    async fn find_by_owner_and_time(
        &self,
        owner: Uuid,
        time: NaiveDateTime,
    ) -> Result<Option<Slot>> {
        Ok(self
            .slots
            .read()
            .await
            .values()
            .find(|s| s.practitioner_id == owner && s.time == time)
            .cloned())
    }

    async fn find_by_owner_and_time_range(
        &self,
        owner: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Slot>> {
        let mut slots: Vec<Slot> = self
            .slots
            .read()
            .await
            .values()
            .filter(|s| s.practitioner_id == owner && s.time >= from && s.time <= to)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.time);
        Ok(slots)
    }

    async fn find_by_client(&self, client: Uuid) -> Result<Vec<Slot>> {
        let mut slots: Vec<Slot> = self
            .slots
            .read()
            .await
            .values()
            .filter(|s| s.client_id == Some(client))
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.time);
        Ok(slots)
    }

    async fn count_by_client_status_time_range(
        &self,
        client: Uuid,
        status: SlotStatus,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<u64> {
        Ok(self
            .slots
            .read()
            .await
            .values()
            .filter(|s| {
                s.client_id == Some(client)
                    && s.status == status
                    && s.time >= from
                    && s.time <= to
            })
            .count() as u64)
    }

    async fn count_by_client_created_range(
        &self,
        client: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<u64> {
        Ok(self
            .slots
            .read()
            .await
            .values()
            .filter(|s| s.client_id == Some(client) && s.created_at >= from && s.created_at <= to)
            .count() as u64)
    }

    async fn save(&self, slot: &Slot) -> Result<Slot> {
        let mut slots = self.slots.write().await;
        if !slots.contains_key(&slot.id) {
            return Err(anyhow!("Slot {} does not exist", slot.id));
        }
        slots.insert(slot.id, slot.clone());
        Ok(slot.clone())
    }

    async fn upsert_by_owner_time(&self, slot: &Slot) -> Result<Slot> {
        let mut slots = self.slots.write().await;
        let existing = slots
            .values()
            .find(|s| s.practitioner_id == slot.practitioner_id && s.time == slot.time)
            .map(|s| (s.id, s.created_at));

        let stored = match existing {
            Some((id, created_at)) => Slot {
                id,
                created_at,
                ..slot.clone()
            },
            None => slot.clone(),
        };
        slots.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.slots.write().await.remove(&id);
        Ok(())
    }
}

// ==============================================================================
// USER DIRECTORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: UserProfile) {
        self.users.write().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find(&self, id: Uuid) -> Result<Option<UserProfile>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<UserProfile>> {
        let mut users: Vec<UserProfile> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}

// ==============================================================================
// SETTINGS
// ==============================================================================

pub struct InMemorySettingsService {
    policy: RwLock<ClinicPolicy>,
}

impl InMemorySettingsService {
    pub fn new(policy: ClinicPolicy) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }

    pub async fn update(&self, policy: ClinicPolicy) {
        *self.policy.write().await = policy;
    }
}

impl Default for InMemorySettingsService {
    fn default() -> Self {
        Self::new(ClinicPolicy::default())
    }
}

#[async_trait]
impl SettingsProvider for InMemorySettingsService {
    async fn current(&self) -> Result<ClinicPolicy> {
        Ok(self.policy.read().await.clone())
    }
}

// ==============================================================================
// CALENDAR SYNC TEST DOUBLE
// ==============================================================================

/// Records every push/remove; optionally fails all calls to exercise the
/// engine's absorb-and-log contract.
#[derive(Default)]
pub struct RecordingCalendarSync {
    pushed: StdMutex<Vec<Uuid>>,
    removed: StdMutex<Vec<Uuid>>,
    failing: StdMutex<bool>,
}

impl RecordingCalendarSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn pushed(&self) -> Vec<Uuid> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<Uuid> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarSync for RecordingCalendarSync {
    async fn push(&self, slot: &Slot) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(anyhow!("calendar sync unavailable"));
        }
        self.pushed.lock().unwrap().push(slot.id);
        Ok(())
    }

    async fn remove(&self, slot: &Slot) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(anyhow!("calendar sync unavailable"));
        }
        self.removed.lock().unwrap().push(slot.id);
        Ok(())
    }
}

// ==============================================================================
// CLOCK TEST DOUBLE
// ==============================================================================

/// Clock pinned to a settable instant.
pub struct FixedClock {
    now: StdMutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: StdMutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}
