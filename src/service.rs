//! The operations clients can invoke, with the session boundary in front.

use std::sync::Arc;

use tracing::warn;

use crate::auth::AdminAuth;
use crate::engine::{BookingEngine, EngineError};
use crate::model::*;
use crate::session::{AuthError, SessionManager};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("unknown or expired session token")]
    Unauthenticated,
    #[error("admin password rejected")]
    Forbidden,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub struct Service {
    engine: BookingEngine,
    sessions: Arc<SessionManager>,
    admin: AdminAuth,
}

impl Service {
    pub fn new(engine: BookingEngine, sessions: Arc<SessionManager>, admin: AdminAuth) -> Self {
        Self { engine, sessions, admin }
    }

    pub async fn sign_up(&self, username: &str, password: &str) -> Result<LoginResponse, ServiceError> {
        Ok(self.sessions.sign_up(username, password).await?)
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<LoginResponse, ServiceError> {
        Ok(self.sessions.sign_in(username, password).await?)
    }

    pub fn resolve_session(&self, token: &str) -> Result<UserId, ServiceError> {
        self.sessions.try_resolve(token).ok_or(ServiceError::Unauthenticated)
    }

    pub async fn get_rooms(&self) -> Result<Vec<Room>, ServiceError> {
        Ok(self.engine.get_rooms().await?)
    }

    pub async fn is_room_available(&self, room_id: RoomId, range: DateRange) -> Result<bool, ServiceError> {
        Ok(self.engine.is_room_available(room_id, range).await?)
    }

    pub async fn free_windows(
        &self,
        room_id: RoomId,
        window: DateRange,
    ) -> Result<Vec<DateRange>, ServiceError> {
        Ok(self.engine.free_windows(room_id, window).await?)
    }

    pub async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, ServiceError> {
        Ok(self.engine.get_reservation(id).await?)
    }

    pub async fn get_user_reservations(&self, token: &str) -> Result<Vec<Reservation>, ServiceError> {
        let user_id = self.resolve_session(token)?;
        Ok(self.engine.get_user_reservations(user_id).await?)
    }

    pub async fn reserve_room(
        &self,
        token: &str,
        room_id: RoomId,
        range: DateRange,
    ) -> Result<ReservationResponse, ServiceError> {
        let user_id = self.resolve_session(token)?;
        Ok(self.engine.reserve_room(user_id, room_id, range).await)
    }

    pub async fn update_reservation(
        &self,
        token: &str,
        reservation: &Reservation,
    ) -> Result<bool, ServiceError> {
        let user_id = self.resolve_session(token)?;
        Ok(self.engine.update_reservation(user_id, reservation).await?)
    }

    pub async fn delete_reservation(
        &self,
        token: &str,
        reservation_id: ReservationId,
    ) -> Result<bool, ServiceError> {
        let user_id = self.resolve_session(token)?;
        Ok(self.engine.delete_reservation(user_id, reservation_id).await?)
    }

    pub async fn create_room(&self, admin_password: &str, name: &str) -> Result<Room, ServiceError> {
        self.check_admin(admin_password)?;
        Ok(self.engine.create_room(name).await?)
    }

    pub async fn delete_room(&self, admin_password: &str, room_id: RoomId) -> Result<bool, ServiceError> {
        self.check_admin(admin_password)?;
        Ok(self.engine.delete_room(room_id).await?)
    }

    fn check_admin(&self, supplied: &str) -> Result<(), ServiceError> {
        if self.admin.verify(supplied) {
            Ok(())
        } else {
            warn!("admin request with wrong password");
            Err(ServiceError::Forbidden)
        }
    }
}
