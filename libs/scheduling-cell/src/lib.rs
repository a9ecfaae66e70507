pub mod handlers;
pub mod memory;
pub mod models;
pub mod ports;
pub mod router;
pub mod services;

pub use models::*;
pub use ports::{CalendarSync, Clock, SettingsProvider, SlotStore, SystemClock, UserDirectory};
pub use services::calendar::{NullCalendarSync, RestCalendarSync};
pub use services::engine::SchedulingEngine;
