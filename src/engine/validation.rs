use crate::model::*;
use crate::policy;
use crate::store::StoreError;

use super::availability::is_available;
use super::BookingEngine;

impl BookingEngine {
    /// Booking rules in order: dates, lead time, length, availability, room existence.
    /// The first failing rule decides the result.
    ///
    /// Availability is tested on the normalized range, since that is what would be stored.
    /// Callers that act on the result must hold the room lock.
    pub(super) async fn validate(
        &self,
        room_id: RoomId,
        range: DateRange,
        exclude: Option<ReservationId>,
    ) -> Result<ReservationResult, StoreError> {
        if let Err(rejected) = policy::check_rules(&range, self.clock.today()) {
            return Ok(rejected);
        }
        let Some(stored) = policy::normalize(range) else {
            return Ok(ReservationResult::InvalidReservationDates);
        };

        let schedule = self.repo.list_reservations_for_room(room_id).await?;
        if !is_available(&schedule, &stored, exclude) {
            return Ok(ReservationResult::RoomNotAvailable);
        }

        let rooms = self.repo.list_rooms().await?;
        if !rooms.iter().any(|room| room.id == room_id) {
            return Ok(ReservationResult::RoomDoesNotExist);
        }

        Ok(ReservationResult::Success)
    }
}
