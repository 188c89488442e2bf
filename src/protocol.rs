//! JSON-lines message types. One object per line in each direction.
//!
//! ```text
//! > {"op":"sign_in","username":"ana","password":"pw"}
//! < {"kind":"login","session_token":"k3J...","user_id":1}
//! > {"op":"reserve_room","token":"k3J...","room_id":7,"start":"2030-02-01","end":"2030-02-02"}
//! < {"kind":"booking","reservation_id":1,"status":"success"}
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Ping,
    SignUp {
        username: String,
        password: String,
    },
    SignIn {
        username: String,
        password: String,
    },
    Rooms,
    IsRoomAvailable {
        room_id: RoomId,
        start: NaiveDate,
        end: NaiveDate,
    },
    FreeWindows {
        room_id: RoomId,
        start: NaiveDate,
        end: NaiveDate,
    },
    Reservation {
        id: ReservationId,
    },
    MyReservations {
        token: String,
    },
    ReserveRoom {
        token: String,
        room_id: RoomId,
        start: NaiveDate,
        end: NaiveDate,
    },
    UpdateReservation {
        token: String,
        reservation: Reservation,
    },
    DeleteReservation {
        token: String,
        reservation_id: ReservationId,
    },
    CreateRoom {
        admin_password: String,
        name: String,
    },
    DeleteRoom {
        admin_password: String,
        room_id: RoomId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Unauthenticated,
    InvalidCredentials,
    UsernameTaken,
    Forbidden,
    Conflict,
    LimitExceeded,
    Timeout,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Login(LoginResponse),
    Rooms { rooms: Vec<Room> },
    Availability { available: bool },
    FreeWindows { windows: Vec<DateRange> },
    Reservation { reservation: Option<Reservation> },
    Reservations { reservations: Vec<Reservation> },
    Booking(ReservationResponse),
    Updated { ok: bool },
    Deleted { ok: bool },
    Room { room: Room },
    Error { code: ErrorCode, message: String },
}

impl Response {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error { code, message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}
