use std::time::Instant;

use tokio::sync::MutexGuard;
use tracing::{debug, error, info, warn};

use crate::model::*;
use crate::observability;
use crate::policy;
use crate::store::StoreError;

use super::{BookingEngine, EngineError};

impl BookingEngine {
    /// Validate and store a booking as one step. Never fails: storage problems and
    /// timeouts are reported as [`ReservationResult::TechnicalError`].
    pub async fn reserve_room(
        &self,
        user_id: UserId,
        room_id: RoomId,
        range: DateRange,
    ) -> ReservationResponse {
        let started = Instant::now();
        let response = self.book(user_id, room_id, range).await;

        metrics::counter!(observability::BOOKINGS_TOTAL, "result" => response.status.as_str())
            .increment(1);
        metrics::histogram!(observability::BOOKING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        response
    }

    async fn book(&self, user_id: UserId, room_id: RoomId, range: DateRange) -> ReservationResponse {
        let validated = tokio::time::timeout(self.booking_timeout, async {
            let guard = self.locks.lock(room_id).await;
            let status = self.validate(room_id, range, None).await?;
            Ok::<_, StoreError>((guard, status))
        })
        .await;

        let (_guard, status) = match validated {
            Ok(Ok(validated)) => validated,
            Ok(Err(e)) => {
                error!(room_id, user_id, "booking validation failed: {e}");
                return ReservationResponse::rejected(ReservationResult::TechnicalError);
            }
            Err(_) => {
                warn!(room_id, user_id, "booking timed out before validation completed");
                return ReservationResponse::rejected(ReservationResult::TechnicalError);
            }
        };

        if !status.is_success() {
            debug!(room_id, user_id, status = status.as_str(), "booking rejected");
            return ReservationResponse::rejected(status);
        }

        let Some(stored) = policy::normalize(range) else {
            return ReservationResponse::rejected(ReservationResult::InvalidReservationDates);
        };
        match self.repo.insert_reservation(room_id, user_id, stored).await {
            Ok(id) => {
                info!(
                    reservation_id = id,
                    room_id,
                    user_id,
                    start = %stored.start,
                    end = %stored.end,
                    "reservation committed"
                );
                ReservationResponse::committed(id)
            }
            Err(e) => {
                error!(room_id, user_id, "reservation insert failed: {e}");
                ReservationResponse::rejected(ReservationResult::TechnicalError)
            }
        }
    }

    /// Move or re-date a reservation owned by `user_id`.
    ///
    /// The new room and range go through the same rules as a fresh booking, with the
    /// reservation itself ignored for availability. `false` covers "missing", "not yours"
    /// and "rejected by the rules".
    pub async fn update_reservation(
        &self,
        user_id: UserId,
        reservation: &Reservation,
    ) -> Result<bool, EngineError> {
        let id = reservation.id;
        let target_room = reservation.room_id;
        let range = reservation.range();

        let validated = tokio::time::timeout(
            self.booking_timeout,
            self.lock_for_update(user_id, id, target_room, range),
        )
        .await
        .map_err(|_| EngineError::Timeout(target_room))??;

        let Some((_guards, status)) = validated else {
            debug!(reservation_id = id, user_id, "update refused: not found or not owner");
            return Ok(false);
        };
        if !status.is_success() {
            debug!(reservation_id = id, user_id, status = status.as_str(), "update rejected");
            return Ok(false);
        }

        let Some(stored) = policy::normalize(range) else {
            return Ok(false);
        };
        let rows = self.repo.update_reservation(id, user_id, target_room, stored).await?;
        if rows > 0 {
            info!(reservation_id = id, room_id = target_room, user_id, "reservation updated");
        }
        Ok(rows > 0)
    }

    /// Lock the reservation's current room and the target room, then validate.
    /// `None` when the reservation is missing or owned by someone else.
    async fn lock_for_update(
        &self,
        user_id: UserId,
        id: ReservationId,
        target_room: RoomId,
        range: DateRange,
    ) -> Result<Option<(Vec<MutexGuard<'_, ()>>, ReservationResult)>, StoreError> {
        loop {
            let Some(current) = self.repo.get_reservation(id).await? else {
                return Ok(None);
            };
            if current.user_id != user_id {
                return Ok(None);
            }
            let guards = self.locks.lock_many(&[current.room_id, target_room]).await;
            // The reservation may have moved while we waited for the locks.
            match self.repo.get_reservation(id).await? {
                Some(now) if now.room_id == current.room_id => {
                    let status = self.validate(target_room, range, Some(id)).await?;
                    return Ok(Some((guards, status)));
                }
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    pub async fn delete_reservation(
        &self,
        user_id: UserId,
        reservation_id: ReservationId,
    ) -> Result<bool, EngineError> {
        let rows = self.repo.delete_reservation(reservation_id, user_id).await?;
        if rows > 0 {
            info!(reservation_id, user_id, "reservation deleted");
        } else {
            debug!(reservation_id, user_id, "delete refused: not found or not owner");
        }
        Ok(rows > 0)
    }

    pub async fn create_room(&self, name: &str) -> Result<Room, EngineError> {
        let room = self.repo.insert_room(name).await?;
        info!(room_id = room.id, name = %room.name, "room created");
        Ok(room)
    }

    /// Delete an unbooked room. Holds the room lock so a booking cannot slip in.
    pub async fn delete_room(&self, room_id: RoomId) -> Result<bool, EngineError> {
        let _guard = tokio::time::timeout(self.booking_timeout, self.locks.lock(room_id))
            .await
            .map_err(|_| EngineError::Timeout(room_id))?;
        let rows = self.repo.delete_room(room_id).await?;
        if rows > 0 {
            info!(room_id, "room deleted");
        }
        Ok(rows > 0)
    }
}
