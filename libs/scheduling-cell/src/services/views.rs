// libs/scheduling-cell/src/services/views.rs
//
// Derived read views over the slot state. Nothing here mutates a slot;
// redaction in particular is strictly a view-model transformation.
use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, Months, NaiveDate, Timelike, Weekday};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::Role;

use crate::models::{
    CategorizedAppointments, DailyCount, HourlyCount, NextFreeSlot, PractitionerStatistics,
    SchedulingError, Slot, SlotStatus, StatsPeriod, TimeSlotView,
};
use crate::services::engine::{store_err, SchedulingEngine};

/// Weekly calendars render the 06:00–22:00 band of each day.
const CALENDAR_DAY_START_HOUR: u32 = 6;
const CALENDAR_DAY_END_HOUR: u32 = 22;

impl SchedulingEngine {
    // ==========================================================================
    // WEEKLY CALENDAR
    // ==========================================================================

    /// Staff calendar: every non-available slot of the practitioner's week,
    /// with client display fields resolved through the directory.
    pub async fn weekly_calendar(
        &self,
        practitioner_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<Vec<TimeSlotView>, SchedulingError> {
        let practitioner = self.require_practitioner(practitioner_id).await?;

        let period_start = week_start
            .and_hms_opt(CALENDAR_DAY_START_HOUR, 0, 0)
            .unwrap();
        let period_end = (week_start + Duration::days(6))
            .and_hms_opt(CALENDAR_DAY_END_HOUR, 0, 0)
            .unwrap();
        debug!(
            "Fetching calendar for practitioner {} from {} to {}",
            practitioner.email, period_start, period_end
        );

        let slots = self
            .store
            .find_by_owner_and_time_range(practitioner.id, period_start, period_end)
            .await
            .map_err(store_err)?;

        let mut views = Vec::new();
        for slot in slots
            .into_iter()
            .filter(|s| s.status != SlotStatus::Available)
        {
            views.push(self.slot_view(slot).await?);
        }
        Ok(views)
    }

    /// Client-facing calendar: bookings that belong to other clients are
    /// rendered as blocked time with all client-identifying fields nulled.
    /// The stored slots are untouched.
    pub async fn public_weekly_calendar(
        &self,
        practitioner_id: Uuid,
        week_start: NaiveDate,
        viewer: Uuid,
    ) -> Result<Vec<TimeSlotView>, SchedulingError> {
        let views = self.weekly_calendar(practitioner_id, week_start).await?;
        Ok(views
            .into_iter()
            .map(|view| {
                if view.status == SlotStatus::Booked && view.client_id != Some(viewer) {
                    view.redacted()
                } else {
                    view
                }
            })
            .collect())
    }

    async fn slot_view(&self, slot: Slot) -> Result<TimeSlotView, SchedulingError> {
        let mut view = TimeSlotView {
            appointment_id: slot.id,
            slot_time: slot.time,
            status: slot.status,
            duration_minutes: slot.duration_minutes,
            client_id: None,
            client_name: None,
            first_name: None,
            last_name: None,
            comment: None,
        };

        if let Some(client_id) = slot.client_id {
            view.client_id = Some(client_id);
            view.comment = slot.comment.clone();
            if let Some(client) = self.directory.find(client_id).await.map_err(store_err)? {
                view.client_name = Some(client.email.clone());
                view.first_name = Some(client.first_name);
                view.last_name = Some(client.last_name);
            }
        }
        Ok(view)
    }

    // ==========================================================================
    // TIME-CATEGORY LISTING
    // ==========================================================================

    /// Partition a client's appointments into past / today / this week /
    /// future. The buckets are disjoint and cover everything: an
    /// appointment exactly at today's midnight belongs to `today`, the
    /// week bucket ends with Sunday 23:59:59.
    pub async fn appointments_by_time_categories(
        &self,
        client_id: Uuid,
    ) -> Result<CategorizedAppointments, SchedulingError> {
        self.directory
            .find(client_id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::ClientNotFound)?;

        let all = self
            .store
            .find_by_client(client_id)
            .await
            .map_err(store_err)?;

        let today = self.clock.today();
        let today_start = today.and_hms_opt(0, 0, 0).unwrap();
        let tomorrow_start = today_start + Duration::days(1);
        let week_boundary = today
            .week(Weekday::Mon)
            .last_day()
            .and_hms_opt(23, 59, 59)
            .unwrap();

        let mut categories = CategorizedAppointments {
            past: Vec::new(),
            today: Vec::new(),
            this_week: Vec::new(),
            future: Vec::new(),
        };
        for slot in all {
            if slot.time < today_start {
                categories.past.push(slot);
            } else if slot.time < tomorrow_start {
                categories.today.push(slot);
            } else if slot.time <= week_boundary {
                categories.this_week.push(slot);
            } else {
                categories.future.push(slot);
            }
        }
        Ok(categories)
    }

    // ==========================================================================
    // PATIENT HISTORY
    // ==========================================================================

    /// Past appointments of a patient, newest first. An out-of-range page
    /// yields an empty page.
    pub async fn patient_history(
        &self,
        patient_id: Uuid,
        page: usize,
        size: usize,
    ) -> Result<Vec<Slot>, SchedulingError> {
        self.directory
            .find(patient_id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::ClientNotFound)?;

        let now = self.clock.now();
        let mut past: Vec<Slot> = self
            .store
            .find_by_client(patient_id)
            .await
            .map_err(store_err)?
            .into_iter()
            .filter(|s| s.time < now)
            .collect();
        past.sort_by(|a, b| b.time.cmp(&a.time));

        let start = page.saturating_mul(size);
        if start >= past.len() {
            return Ok(Vec::new());
        }
        let end = (start + size).min(past.len());
        Ok(past[start..end].to_vec())
    }

    pub async fn patient_history_count(&self, patient_id: Uuid) -> Result<u64, SchedulingError> {
        self.directory
            .find(patient_id)
            .await
            .map_err(store_err)?
            .ok_or(SchedulingError::ClientNotFound)?;

        let now = self.clock.now();
        Ok(self
            .store
            .find_by_client(patient_id)
            .await
            .map_err(store_err)?
            .iter()
            .filter(|s| s.time < now)
            .count() as u64)
    }

    // ==========================================================================
    // STATISTICS
    // ==========================================================================

    /// Booked-appointment statistics over a week, month or year frame.
    /// The daily series has one zero-filled entry per calendar day of the
    /// frame; the hourly series always has 24 entries.
    pub async fn practitioner_statistics(
        &self,
        practitioner_id: Uuid,
        period: StatsPeriod,
        frame_start: Option<NaiveDate>,
    ) -> Result<PractitionerStatistics, SchedulingError> {
        self.require_practitioner(practitioner_id).await?;

        let base = frame_start.unwrap_or_else(|| self.clock.today());
        let start = match period {
            StatsPeriod::Week => base.week(Weekday::Mon).first_day(),
            StatsPeriod::Month => base.with_day(1).unwrap(),
            StatsPeriod::Year => base.with_ordinal(1).unwrap(),
        };
        let end = match period {
            StatsPeriod::Week => start + Duration::days(6),
            StatsPeriod::Month => {
                start.checked_add_months(Months::new(1)).unwrap() - Duration::days(1)
            }
            StatsPeriod::Year => NaiveDate::from_ymd_opt(start.year(), 12, 31).unwrap(),
        };

        let from = start.and_hms_opt(0, 0, 0).unwrap();
        let to = end.and_hms_opt(23, 59, 59).unwrap();

        let booked: Vec<Slot> = self
            .store
            .find_by_owner_and_time_range(practitioner_id, from, to)
            .await
            .map_err(store_err)?
            .into_iter()
            .filter(|s| s.status == SlotStatus::Booked)
            .collect();

        let mut per_day: HashMap<NaiveDate, u64> = HashMap::new();
        for slot in &booked {
            *per_day.entry(slot.time.date()).or_default() += 1;
        }
        let days = (end - start).num_days() + 1;
        let daily_counts = (0..days)
            .map(|offset| {
                let date = start + Duration::days(offset);
                DailyCount {
                    date,
                    count: per_day.get(&date).copied().unwrap_or(0),
                }
            })
            .collect();

        let mut per_hour: HashMap<u32, u64> = HashMap::new();
        for slot in &booked {
            *per_hour.entry(slot.time.hour()).or_default() += 1;
        }
        let hourly_counts = (0..24)
            .map(|hour| HourlyCount {
                hour,
                count: per_hour.get(&hour).copied().unwrap_or(0),
            })
            .collect();

        let total = booked.len();
        let average_duration_minutes = if booked.is_empty() {
            0.0
        } else {
            booked.iter().map(|s| s.duration_minutes as f64).sum::<f64>() / total as f64
        };

        Ok(PractitionerStatistics {
            daily_counts,
            hourly_counts,
            total_booked_appointments: total,
            average_duration_minutes,
        })
    }

    // ==========================================================================
    // NEXT-FREE-SLOT SEARCH
    // ==========================================================================

    /// First free whole hour inside working hours over the next seven days,
    /// one result per practitioner. Practitioners with no free hour in the
    /// window are omitted.
    pub async fn next_free_slots(
        &self,
        required_minutes: i32,
    ) -> Result<Vec<NextFreeSlot>, SchedulingError> {
        if required_minutes <= 0 {
            return Err(SchedulingError::InvalidDuration);
        }

        let now = self.clock.now();
        let today = self.clock.today();
        let end_day = today + Duration::days(7);

        let practitioners = self
            .directory
            .find_by_role(Role::Practitioner)
            .await
            .map_err(store_err)?;

        let mut out = Vec::new();
        for practitioner in practitioners {
            let window_start = today.and_hms_opt(0, 0, 0).unwrap();
            let window_end = end_day.and_hms_opt(23, 59, 59).unwrap();

            let occupied: HashSet<_> = self
                .store
                .find_by_owner_and_time_range(practitioner.id, window_start, window_end)
                .await
                .map_err(store_err)?
                .into_iter()
                .filter(|s| s.status != SlotStatus::Available)
                .map(|s| s.time)
                .collect();

            'scan: for day_offset in 0..=7 {
                let date = today + Duration::days(day_offset);
                for hour in self.work_start_hour..=self.work_end_hour {
                    let slot_time = date.and_hms_opt(hour, 0, 0).unwrap();
                    if slot_time < now {
                        continue;
                    }
                    if !occupied.contains(&slot_time) {
                        out.push(NextFreeSlot {
                            practitioner_id: practitioner.id,
                            practitioner_name: practitioner.full_name(),
                            slot_time,
                            duration_minutes: required_minutes,
                        });
                        break 'scan;
                    }
                }
            }
        }
        Ok(out)
    }
}
