// libs/scheduling-cell/src/services/engine.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{Duration, NaiveDateTime, Timelike};
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{CallerContext, Role, UserProfile};

use crate::models::{
    BookSlotRequest, ClinicPolicy, CreateSlotRequest, SchedulingError, Slot, SlotStatus,
};
use crate::ports::{CalendarSync, Clock, SettingsProvider, SlotStore, SystemClock, UserDirectory};

const DEFAULT_WORK_START_HOUR: u32 = 9;
const DEFAULT_WORK_END_HOUR: u32 = 20;

/// Serializes the read-check-write section of every scheduling mutation.
/// Keys are acquired in sorted order so overlapping key sets cannot
/// deadlock.
pub(crate) struct LockRegistry {
    locks: StdMutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl LockRegistry {
    fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn acquire(&self, mut keys: Vec<String>) -> Vec<OwnedMutexGuard<()>> {
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = {
                let mut map = self.locks.lock().unwrap();
                Arc::clone(
                    map.entry(key)
                        .or_insert_with(|| Arc::new(TokioMutex::new(()))),
                )
            };
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

/// Owns every slot-state transition, constraint evaluation and conflict
/// resolution, plus the derived read views in `services::views`.
pub struct SchedulingEngine {
    pub(crate) store: Arc<dyn SlotStore>,
    pub(crate) directory: Arc<dyn UserDirectory>,
    pub(crate) settings: Arc<dyn SettingsProvider>,
    pub(crate) calendar: Arc<dyn CalendarSync>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: LockRegistry,
    pub(crate) work_start_hour: u32,
    pub(crate) work_end_hour: u32,
}

impl SchedulingEngine {
    pub fn new(
        store: Arc<dyn SlotStore>,
        directory: Arc<dyn UserDirectory>,
        settings: Arc<dyn SettingsProvider>,
        calendar: Arc<dyn CalendarSync>,
    ) -> Self {
        Self {
            store,
            directory,
            settings,
            calendar,
            clock: Arc::new(SystemClock),
            locks: LockRegistry::new(),
            work_start_hour: DEFAULT_WORK_START_HOUR,
            work_end_hour: DEFAULT_WORK_END_HOUR,
        }
    }

    pub fn with_work_hours(mut self, start_hour: u32, end_hour: u32) -> Self {
        self.work_start_hour = start_hour;
        self.work_end_hour = end_hour;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ==========================================================================
    // SLOT CREATION (privileged path)
    // ==========================================================================

    /// Create or overwrite the slot at `(practitioner, time)`. Policy limits
    /// do not apply here; the transport layer restricts this to privileged
    /// callers.
    pub async fn create_slot(
        &self,
        practitioner_id: Uuid,
        request: CreateSlotRequest,
    ) -> Result<Slot, SchedulingError> {
        info!(
            "Creating slot for practitioner {} at {}",
            practitioner_id, request.time
        );

        if request.duration_minutes <= 0 {
            return Err(SchedulingError::InvalidDuration);
        }
        let status = request.status.unwrap_or(SlotStatus::Available);
        if status == SlotStatus::Booked {
            return Err(SchedulingError::InvariantViolation(
                "a booked slot requires a client".to_string(),
            ));
        }

        let practitioner = self.require_practitioner(practitioner_id).await?;

        let guards = self
            .locks
            .acquire(vec![slot_key(practitioner.id, request.time)])
            .await;

        let slot = match self
            .store
            .find_by_owner_and_time(practitioner.id, request.time)
            .await
            .map_err(store_err)?
        {
            Some(existing) => Slot {
                status,
                duration_minutes: request.duration_minutes,
                ..existing
            },
            None => Slot::new(
                practitioner.id,
                request.time,
                status,
                request.duration_minutes,
                self.clock.now(),
            ),
        };

        let saved = self
            .store
            .upsert_by_owner_time(&slot)
            .await
            .map_err(store_err)?;
        drop(guards);

        Ok(saved)
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    /// Book the slot at `(practitioner, time)` for a client, creating the
    /// slot if the key has never been seen. The three counting constraints
    /// are evaluated in order against a fresh policy snapshot and fail fast.
    pub async fn book_slot(
        &self,
        request: BookSlotRequest,
        caller: &CallerContext,
    ) -> Result<Slot, SchedulingError> {
        info!(
            "Booking slot for client {} with practitioner {} at {}",
            request.client_id, request.practitioner_id, request.time
        );

        if !caller.privileged && caller.identity != request.client_id {
            return Err(SchedulingError::Forbidden);
        }
        if request.duration_minutes <= 0 {
            return Err(SchedulingError::InvalidDuration);
        }

        let practitioner = self.require_practitioner(request.practitioner_id).await?;
        let client = self
            .directory
            .find(request.client_id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::ClientNotFound)?;

        let guards = self
            .locks
            .acquire(vec![
                slot_key(practitioner.id, request.time),
                client_key(client.id),
            ])
            .await;

        let policy = self.settings.current().await.map_err(store_err)?;
        self.check_booking_limits(&client, request.time, &policy)
            .await?;

        let slot = match self
            .store
            .find_by_owner_and_time(practitioner.id, request.time)
            .await
            .map_err(store_err)?
        {
            Some(existing) => {
                if existing.status != SlotStatus::Available {
                    warn!(
                        "Slot {} at {} is {}, rejecting booking",
                        existing.id, existing.time, existing.status
                    );
                    return Err(SchedulingError::SlotUnavailable);
                }
                if !existing.coupling_intact() {
                    return Err(SchedulingError::InvariantViolation(format!(
                        "slot {} is available but has a client attached",
                        existing.id
                    )));
                }
                existing
            }
            None => Slot::new(
                practitioner.id,
                request.time,
                SlotStatus::Available,
                request.duration_minutes,
                self.clock.now(),
            ),
        };

        let booked = Slot {
            client_id: Some(client.id),
            status: SlotStatus::Booked,
            duration_minutes: request.duration_minutes,
            comment: request.comment.clone(),
            ..slot
        };
        let saved = self
            .store
            .upsert_by_owner_time(&booked)
            .await
            .map_err(store_err)?;
        drop(guards);

        self.push_to_calendar(&saved).await;

        info!("Slot {} booked for client {}", saved.id, client.id);
        Ok(saved)
    }

    /// The three booking constraints, each comparing one count against one
    /// configured limit.
    async fn check_booking_limits(
        &self,
        client: &UserProfile,
        time: NaiveDateTime,
        policy: &ClinicPolicy,
    ) -> Result<(), SchedulingError> {
        // Booked appointments on the requested calendar day.
        let date = time.date();
        let day_start = date.and_hms_opt(0, 0, 0).unwrap();
        let day_end = date.and_hms_opt(23, 59, 59).unwrap();
        let daily = self
            .store
            .count_by_client_status_time_range(client.id, SlotStatus::Booked, day_start, day_end)
            .await
            .map_err(store_err)?;
        if daily >= policy.daily_booking_limit as u64 {
            debug!(
                "Client {} at daily booking limit ({})",
                client.id, policy.daily_booking_limit
            );
            return Err(SchedulingError::DailyBookingLimitReached(
                policy.daily_booking_limit,
            ));
        }

        // Bookings created since local midnight. Deliberately a calendar-day
        // window, not a sliding 24h one.
        let today_start = self.clock.today().and_hms_opt(0, 0, 0).unwrap();
        let today_end = today_start + Duration::days(1) - Duration::nanoseconds(1);
        let created_today = self
            .store
            .count_by_client_created_range(client.id, today_start, today_end)
            .await
            .map_err(store_err)?;
        if created_today >= policy.booking_24h_limit as u64 {
            debug!(
                "Client {} at creation-rate limit ({})",
                client.id, policy.booking_24h_limit
            );
            return Err(SchedulingError::BookingRateLimitReached(
                policy.booking_24h_limit,
            ));
        }

        // Booked appointments in the same clock-hour bucket.
        let hour_start = date.and_hms_opt(time.hour(), 0, 0).unwrap();
        let hour_end = hour_start + Duration::hours(1) - Duration::nanoseconds(1);
        let overlap = self
            .store
            .count_by_client_status_time_range(client.id, SlotStatus::Booked, hour_start, hour_end)
            .await
            .map_err(store_err)?;
        if overlap >= policy.hourly_overlap_limit as u64 {
            debug!(
                "Client {} at hourly overlap limit ({})",
                client.id, policy.hourly_overlap_limit
            );
            return Err(SchedulingError::HourlyOverlapLimitReached(
                policy.hourly_overlap_limit,
            ));
        }

        Ok(())
    }

    // ==========================================================================
    // CANCELLATION
    // ==========================================================================

    /// Revert a booked slot to available. Unprivileged callers must own the
    /// booking, be inside the modification window and within the per-slot
    /// change throttle.
    pub async fn cancel_appointment(
        &self,
        slot_id: Uuid,
        caller: &CallerContext,
    ) -> Result<Slot, SchedulingError> {
        let slot = self
            .store
            .find_by_id(slot_id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::SlotNotFound)?;
        self.require_practitioner(slot.practitioner_id).await?;

        let guards = self
            .locks
            .acquire(vec![slot_key(slot.practitioner_id, slot.time)])
            .await;

        // Re-read under the lock; the row may have moved since the lookup.
        let mut slot = self
            .store
            .find_by_id(slot_id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::SlotNotFound)?;

        if slot.status == SlotStatus::Available {
            return Err(SchedulingError::NotBooked);
        }

        if !caller.privileged {
            if slot.client_id != Some(caller.identity) {
                return Err(SchedulingError::Forbidden);
            }
            let policy = self.settings.current().await.map_err(store_err)?;
            self.check_modification_window(&slot, &policy)?;
            self.track_change(&mut slot, &policy)?;
        }

        let snapshot = slot.clone();
        slot.client_id = None;
        slot.status = SlotStatus::Available;
        slot.reminder_sent = false;
        slot.comment = None;

        let saved = self.store.save(&slot).await.map_err(store_err)?;
        drop(guards);

        // The mirror needs the pre-cancel client to find the event.
        self.remove_from_calendar(&snapshot).await;

        info!("Appointment {} cancelled", saved.id);
        Ok(saved)
    }

    // ==========================================================================
    // RESCHEDULING
    // ==========================================================================

    /// Move a slot to a new time. A stale blocked placeholder at the
    /// destination is deleted to make room; anything else there fails the
    /// move.
    pub async fn reschedule_appointment(
        &self,
        slot_id: Uuid,
        new_time: NaiveDateTime,
        caller: &CallerContext,
    ) -> Result<Slot, SchedulingError> {
        let slot = self
            .store
            .find_by_id(slot_id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::SlotNotFound)?;
        self.require_practitioner(slot.practitioner_id).await?;

        let guards = self
            .locks
            .acquire(vec![
                slot_key(slot.practitioner_id, slot.time),
                slot_key(slot.practitioner_id, new_time),
            ])
            .await;

        let mut slot = self
            .store
            .find_by_id(slot_id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::SlotNotFound)?;

        if !caller.privileged {
            if slot.client_id != Some(caller.identity) {
                return Err(SchedulingError::Forbidden);
            }
            let policy = self.settings.current().await.map_err(store_err)?;
            self.check_modification_window(&slot, &policy)?;
            self.track_change(&mut slot, &policy)?;
        }

        if let Some(conflict) = self
            .store
            .find_by_owner_and_time(slot.practitioner_id, new_time)
            .await
            .map_err(store_err)?
        {
            if conflict.id != slot.id {
                if conflict.status == SlotStatus::Blocked {
                    debug!(
                        "Deleting stale blocked placeholder {} at {}",
                        conflict.id, new_time
                    );
                    self.store.delete(conflict.id).await.map_err(store_err)?;
                } else {
                    return Err(SchedulingError::SlotAlreadyBooked);
                }
            }
        }

        slot.time = new_time;
        let saved = self.store.save(&slot).await.map_err(store_err)?;
        drop(guards);

        if saved.status == SlotStatus::Booked && saved.client_id.is_some() {
            self.push_to_calendar(&saved).await;
        }

        info!("Appointment {} moved to {}", saved.id, new_time);
        Ok(saved)
    }

    // ==========================================================================
    // COMMENT UPDATE
    // ==========================================================================

    /// Set or clear the free-text comment on an appointment.
    pub async fn update_comment(
        &self,
        slot_id: Uuid,
        comment: Option<String>,
        caller: &CallerContext,
    ) -> Result<Slot, SchedulingError> {
        let mut slot = self
            .store
            .find_by_id(slot_id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::SlotNotFound)?;

        if !caller.privileged && slot.client_id != Some(caller.identity) {
            return Err(SchedulingError::Forbidden);
        }

        slot.comment = comment;
        self.store.save(&slot).await.map_err(store_err)
    }

    // ==========================================================================
    // SHARED HELPERS
    // ==========================================================================

    fn check_modification_window(
        &self,
        slot: &Slot,
        policy: &ClinicPolicy,
    ) -> Result<(), SchedulingError> {
        let cutoff = slot.time - Duration::hours(policy.modification_window_hours as i64);
        if self.clock.now() > cutoff {
            return Err(SchedulingError::WindowClosed(
                policy.modification_window_hours,
            ));
        }
        Ok(())
    }

    /// Per-slot daily change throttle. The counter resets on the first
    /// change of a new calendar day, then every change increments it.
    fn track_change(&self, slot: &mut Slot, policy: &ClinicPolicy) -> Result<(), SchedulingError> {
        let today = self.clock.today();
        if slot.last_change_date != Some(today) {
            slot.daily_change_count = 0;
        }
        if slot.daily_change_count >= policy.daily_change_limit as i32 {
            return Err(SchedulingError::ChangeLimitExceeded(
                policy.daily_change_limit,
            ));
        }
        slot.daily_change_count += 1;
        slot.last_change_date = Some(today);
        Ok(())
    }

    pub(crate) async fn require_practitioner(
        &self,
        id: Uuid,
    ) -> Result<UserProfile, SchedulingError> {
        let profile = self
            .directory
            .find(id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::PractitionerNotFound)?;
        if profile.role != Role::Practitioner {
            return Err(SchedulingError::NotAPractitioner);
        }
        Ok(profile)
    }

    async fn push_to_calendar(&self, slot: &Slot) {
        if let Err(e) = self.calendar.push(slot).await {
            warn!("Calendar push for slot {} failed: {}", slot.id, e);
        }
    }

    async fn remove_from_calendar(&self, slot: &Slot) {
        if let Err(e) = self.calendar.remove(slot).await {
            warn!("Calendar removal for slot {} failed: {}", slot.id, e);
        }
    }
}

pub(crate) fn store_err(e: anyhow::Error) -> SchedulingError {
    SchedulingError::Store(e.to_string())
}

fn slot_key(owner: Uuid, time: NaiveDateTime) -> String {
    format!("slot:{}:{}", owner, time)
}

fn client_key(client: Uuid) -> String {
    format!("client:{}", client)
}
