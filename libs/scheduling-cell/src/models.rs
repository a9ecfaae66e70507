// libs/scheduling-cell/src/models.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ==============================================================================
// CORE SLOT MODELS
// ==============================================================================

/// One schedulable unit of practitioner time, keyed by
/// `(practitioner_id, time)`. All timestamps are clinic-local wall time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub client_id: Option<Uuid>,
    pub time: NaiveDateTime,
    pub duration_minutes: i32,
    pub status: SlotStatus,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_change_date: Option<NaiveDate>,
    pub daily_change_count: i32,
    pub reminder_sent: bool,
}

impl Slot {
    pub fn new(
        practitioner_id: Uuid,
        time: NaiveDateTime,
        status: SlotStatus,
        duration_minutes: i32,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            practitioner_id,
            client_id: None,
            time,
            duration_minutes,
            status,
            comment: None,
            created_at,
            last_change_date: None,
            daily_change_count: 0,
            reminder_sent: false,
        }
    }

    pub fn is_booked(&self) -> bool {
        self.status == SlotStatus::Booked
    }

    /// `client_id` set without `Booked` status (or the reverse) means the
    /// stored record broke the status/client coupling invariant.
    pub fn coupling_intact(&self) -> bool {
        match self.status {
            SlotStatus::Booked => self.client_id.is_some(),
            SlotStatus::Available => self.client_id.is_none(),
            SlotStatus::Blocked => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Blocked,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
            SlotStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// Clinic-wide scheduling limits, read fresh from the settings provider on
/// every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicPolicy {
    pub modification_window_hours: u32,
    pub daily_change_limit: u32,
    pub daily_booking_limit: u32,
    pub booking_24h_limit: u32,
    pub hourly_overlap_limit: u32,
}

impl Default for ClinicPolicy {
    fn default() -> Self {
        Self {
            modification_window_hours: 2,
            daily_change_limit: 3,
            daily_booking_limit: 1,
            booking_24h_limit: 3,
            hourly_overlap_limit: 1,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub time: NaiveDateTime,
    pub status: Option<SlotStatus>,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub practitioner_id: Uuid,
    pub client_id: Uuid,
    pub time: NaiveDateTime,
    pub duration_minutes: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub new_time: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommentRequest {
    pub comment: Option<String>,
}

// ==============================================================================
// VIEW MODELS
// ==============================================================================

/// One weekly-calendar row. Client display fields are populated only for
/// booked slots the viewer is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlotView {
    pub appointment_id: Uuid,
    pub slot_time: NaiveDateTime,
    pub status: SlotStatus,
    pub duration_minutes: i32,
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub comment: Option<String>,
}

impl TimeSlotView {
    /// Render this row for a viewer who is not the booking client: the
    /// booking is shown as blocked time with no client-identifying fields.
    pub fn redacted(mut self) -> Self {
        self.status = SlotStatus::Blocked;
        self.client_id = None;
        self.client_name = None;
        self.first_name = None;
        self.last_name = None;
        self.comment = None;
        self
    }
}

/// A client's appointments partitioned by time bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizedAppointments {
    pub past: Vec<Slot>,
    pub today: Vec<Slot>,
    pub this_week: Vec<Slot>,
    pub future: Vec<Slot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyCount {
    pub hour: u32,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PractitionerStatistics {
    pub daily_counts: Vec<DailyCount>,
    pub hourly_counts: Vec<HourlyCount>,
    pub total_booked_appointments: usize,
    pub average_duration_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextFreeSlot {
    pub practitioner_id: Uuid,
    pub practitioner_name: String,
    pub slot_time: NaiveDateTime,
    pub duration_minutes: i32,
}

/// Reporting frame for practitioner statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Week,
    Month,
    Year,
}

impl FromStr for StatsPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "week" => Ok(StatsPeriod::Week),
            "month" => Ok(StatsPeriod::Month),
            "year" => Ok(StatsPeriod::Year),
            other => Err(format!("Unknown statistics period: {}", other)),
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Practitioner not found")]
    PractitionerNotFound,

    #[error("Client not found")]
    ClientNotFound,

    #[error("Appointment not found")]
    SlotNotFound,

    #[error("User is not a practitioner")]
    NotAPractitioner,

    #[error("Caller may not act on this appointment")]
    Forbidden,

    #[error("Slot is not available for booking")]
    SlotUnavailable,

    #[error("Slot already booked by another client")]
    SlotAlreadyBooked,

    #[error("Appointment is not booked")]
    NotBooked,

    #[error("Changes are allowed no later than {0} hours before the appointment")]
    WindowClosed(u32),

    #[error("Limit of {0} changes to this slot per day reached")]
    ChangeLimitExceeded(u32),

    #[error("No more than {0} booked appointments per day allowed")]
    DailyBookingLimitReached(u32),

    #[error("No more than {0} bookings may be created per day")]
    BookingRateLimitReached(u32),

    #[error("No more than {0} booked appointments in the same hour allowed")]
    HourlyOverlapLimitReached(u32),

    #[error("Duration must be a positive number of minutes")]
    InvalidDuration,

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Store error: {0}")]
    Store(String),
}
