use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub type RoomId = i64;
pub type UserId = i64;
pub type ReservationId = i64;

/// Sentinel id returned alongside any non-success booking result.
pub const NO_RESERVATION: ReservationId = -1;

/// Calendar date range. `[start, end)` for overlap purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }

    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Half-open intersection test.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Extend `end` so the range covers at least `min_days`.
    /// `None` when the extended end falls past the last representable date.
    pub fn with_min_length(self, min_days: i64) -> Option<Self> {
        let floor = self.start.checked_add_signed(Duration::days(min_days))?;
        if self.end < floor {
            Some(Self { start: self.start, end: floor })
        } else {
            Some(self)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Reservation {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

/// SHA-256 digest of a password's UTF-8 bytes.
pub type PasswordHash = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: PasswordHash,
}

/// Outcome of a booking attempt. Closed set; only `TechnicalError` is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationResult {
    Success,
    TechnicalError,
    RoomNotAvailable,
    RoomDoesNotExist,
    InvalidReservationDates,
    ReservationTooEarly,
    ReservationTooLong,
}

impl ReservationResult {
    pub fn is_success(self) -> bool {
        self == ReservationResult::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationResult::Success => "success",
            ReservationResult::TechnicalError => "technical_error",
            ReservationResult::RoomNotAvailable => "room_not_available",
            ReservationResult::RoomDoesNotExist => "room_does_not_exist",
            ReservationResult::InvalidReservationDates => "invalid_reservation_dates",
            ReservationResult::ReservationTooEarly => "reservation_too_early",
            ReservationResult::ReservationTooLong => "reservation_too_long",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationResponse {
    pub reservation_id: ReservationId,
    pub status: ReservationResult,
}

impl ReservationResponse {
    pub fn committed(reservation_id: ReservationId) -> Self {
        Self { reservation_id, status: ReservationResult::Success }
    }

    pub fn rejected(status: ReservationResult) -> Self {
        Self { reservation_id: NO_RESERVATION, status }
    }
}

/// Token plus the user it was minted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub session_token: String,
    pub user_id: UserId,
}

/// Log record format: every durable mutation is one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated { room: Room },
    RoomDeleted { id: RoomId },
    UserCreated { user: User },
    ReservationCreated { reservation: Reservation },
    ReservationUpdated { reservation: Reservation },
    ReservationDeleted { id: ReservationId },
    /// Id high-water marks, written by compaction so ids are never reused.
    Counters {
        next_room_id: RoomId,
        next_user_id: UserId,
        next_reservation_id: ReservationId,
    },
}
