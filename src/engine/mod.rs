//! Reservation booking engine.
//!
//! Every check-then-write on a room runs under that room's lock, so two
//! overlapping bookings can never both pass the availability check.

mod availability;
mod error;
mod locks;
mod mutations;
mod queries;
mod validation;

pub use availability::{free_windows, is_available};
pub use error::EngineError;
pub use locks::RoomLocks;

use std::sync::Arc;
use std::time::Duration;

use crate::policy::Clock;
use crate::store::Repository;

/// Default bound on lock acquisition plus validation for one booking.
pub const DEFAULT_BOOKING_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BookingEngine {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    locks: RoomLocks,
    booking_timeout: Duration,
}

impl BookingEngine {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            locks: RoomLocks::new(),
            booking_timeout: DEFAULT_BOOKING_TIMEOUT,
        }
    }

    pub fn with_booking_timeout(mut self, timeout: Duration) -> Self {
        self.booking_timeout = timeout;
        self
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }
}
