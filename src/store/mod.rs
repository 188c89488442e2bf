mod wal_store;
mod writer;

pub use wal_store::WalStore;

use async_trait::async_trait;

use crate::model::*;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("room {0} still has reservations")]
    HasReservations(RoomId),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

/// Persistence seen by the booking engine and the session manager.
///
/// Mutations that filter by owner report rows affected; `0` means the row was
/// missing or belonged to someone else.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError>;

    async fn list_reservations_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Reservation>, StoreError>;

    /// Reservations of one room, ordered by start date.
    async fn list_reservations_for_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError>;

    async fn insert_reservation(
        &self,
        room_id: RoomId,
        user_id: UserId,
        range: DateRange,
    ) -> Result<ReservationId, StoreError>;

    async fn update_reservation(
        &self,
        id: ReservationId,
        user_id: UserId,
        room_id: RoomId,
        range: DateRange,
    ) -> Result<u64, StoreError>;

    async fn delete_reservation(&self, id: ReservationId, user_id: UserId) -> Result<u64, StoreError>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the username is taken.
    async fn insert_user(
        &self,
        username: &str,
        password_hash: PasswordHash,
    ) -> Result<UserId, StoreError>;

    async fn insert_room(&self, name: &str) -> Result<Room, StoreError>;

    /// Refused with [`StoreError::HasReservations`] while the room is booked.
    async fn delete_room(&self, id: RoomId) -> Result<u64, StoreError>;
}
