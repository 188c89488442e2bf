use crate::limits::MAX_QUERY_WINDOW_DAYS;
use crate::model::*;
use crate::policy;

use super::availability;
use super::{BookingEngine, EngineError};

impl BookingEngine {
    pub async fn get_rooms(&self) -> Result<Vec<Room>, EngineError> {
        Ok(self.repo.list_rooms().await?)
    }

    pub async fn get_user_reservations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Reservation>, EngineError> {
        Ok(self.repo.list_reservations_for_user(user_id).await?)
    }

    pub async fn get_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, EngineError> {
        Ok(self.repo.get_reservation(id).await?)
    }

    /// Point-in-time answer; only a booking made under the room lock can act on it.
    /// The range is normalized first, so `start == end` asks about one night.
    pub async fn is_room_available(
        &self,
        room_id: RoomId,
        range: DateRange,
    ) -> Result<bool, EngineError> {
        if !range.is_well_formed() {
            return Err(EngineError::InvalidRange);
        }
        let candidate = policy::normalize(range).ok_or(EngineError::InvalidRange)?;
        let schedule = self.repo.list_reservations_for_room(room_id).await?;
        Ok(availability::is_available(&schedule, &candidate, None))
    }

    /// Unbooked stretches of a room inside `window`.
    pub async fn free_windows(
        &self,
        room_id: RoomId,
        window: DateRange,
    ) -> Result<Vec<DateRange>, EngineError> {
        if !window.is_well_formed() {
            return Err(EngineError::InvalidRange);
        }
        if window.length_days() > MAX_QUERY_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("query window too long"));
        }
        let schedule = self.repo.list_reservations_for_room(room_id).await?;
        Ok(availability::free_windows(&schedule, &window))
    }
}
