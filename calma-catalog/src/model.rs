use calma_core::time::TimeWindow;
use chrono::{Datelike, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shared physical asset types a service can require
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Room,
    Chair,
    WashStation,
    Hammam,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// One weekly working-hours window. `is_available: false` marks a blocked
/// window (e.g. a recurring day off carved out of an otherwise open day).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub day: DayOfWeek,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub is_available: bool,
}

/// A practitioner. Never hard-deleted: historical bookings keep referencing
/// the id, so retirement flips `is_active` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub display_name: String,
    pub specializations: Vec<String>,
    pub windows: Vec<AvailabilityWindow>,
    pub service_ids: Vec<Uuid>,
    pub is_active: bool,
}

impl Staff {
    pub fn new(display_name: String, specializations: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name,
            specializations,
            windows: Vec::new(),
            service_ids: Vec::new(),
            is_active: true,
        }
    }

    pub fn can_perform(&self, service_id: Uuid) -> bool {
        self.service_ids.contains(&service_id)
    }

    /// True when the window falls entirely inside an available weekly window
    /// on its weekday. A window spanning calendar days never fits.
    pub fn works_during(&self, window: &TimeWindow) -> bool {
        if window.start().date_naive() != window.end().date_naive() {
            return false;
        }
        let day = DayOfWeek::from(window.start().weekday());
        let start = window.start().time();
        let end = window.end().time();

        let blocked = self
            .windows
            .iter()
            .any(|w| !w.is_available && w.day == day && start < w.end && w.start < end);
        if blocked {
            return false;
        }

        self.windows
            .iter()
            .any(|w| w.is_available && w.day == day && w.start <= start && end <= w.end)
    }
}

/// A shared physical asset: a room, a chair, a wash station, or the hammam
/// itself (capacity = how many persons it admits at once).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub resource_type: ResourceType,
    pub capacity: i32,
    pub is_active: bool,
}

impl Resource {
    pub fn new(name: String, resource_type: ResourceType, capacity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            resource_type,
            capacity,
            is_active: true,
        }
    }
}

/// Units of a resource type needed per person booked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRequirement {
    pub resource_type: ResourceType,
    pub units_per_person: i32,
}

/// A bookable service. Duration, buffer and requirements are immutable once
/// bookings reference the service; price and description stay editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub buffer_minutes: i32,
    pub price_cents: i32,
    pub requirements: Vec<ResourceRequirement>,
    pub is_active: bool,
}

impl Service {
    pub fn new(
        name: String,
        duration_minutes: i32,
        buffer_minutes: i32,
        price_cents: i32,
        requirements: Vec<ResourceRequirement>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description: None,
            duration_minutes,
            buffer_minutes,
            price_cents,
            requirements,
            is_active: true,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.duration_minutes as i64)
    }

    pub fn buffer(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.buffer_minutes as i64)
    }

    /// The window the client occupies: `[start, start + duration)`.
    pub fn service_window(
        &self,
        start: chrono::DateTime<chrono::Utc>,
    ) -> calma_core::EngineResult<TimeWindow> {
        TimeWindow::new(start, start + self.duration())
    }

    /// The window staff and resources are blocked for:
    /// `[start, start + duration + buffer)`.
    pub fn occupancy_window(
        &self,
        start: chrono::DateTime<chrono::Utc>,
    ) -> calma_core::EngineResult<TimeWindow> {
        TimeWindow::new(start, start + self.duration() + self.buffer())
    }
}
