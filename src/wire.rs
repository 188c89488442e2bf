use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error};

use crate::engine::EngineError;
use crate::limits::MAX_REQUEST_LINE_LEN;
use crate::model::DateRange;
use crate::observability;
use crate::protocol::{ErrorCode, Request, Response};
use crate::service::{Service, ServiceError};
use crate::session::AuthError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("framing error: {0}")]
    Codec(#[from] LinesCodecError),
    #[error("encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serve one client until it disconnects. Each line is a request; each request gets
/// exactly one response line, errors included.
pub async fn process_connection<S>(socket: S, service: Arc<Service>) -> Result<(), WireError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_REQUEST_LINE_LEN));

    while let Some(line) = framed.next().await {
        let response = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<Request>(&line) {
                Ok(request) => handle_request(&service, request).await,
                Err(e) => {
                    debug!("malformed request: {e}");
                    Response::error(ErrorCode::BadRequest, format!("malformed request: {e}"))
                }
            },
            // The framed stream ends after a decode error: answer, then hang up.
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                let response = Response::error(
                    ErrorCode::LimitExceeded,
                    format!("request line exceeds {MAX_REQUEST_LINE_LEN} bytes"),
                );
                framed.send(serde_json::to_string(&response)?).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        framed.send(serde_json::to_string(&response)?).await?;
    }
    Ok(())
}

async fn handle_request(service: &Service, request: Request) -> Response {
    let op = observability::op_label(&request);
    let started = Instant::now();

    let response = execute_request(service, request).await.unwrap_or_else(|e| error_response(&e));

    let status = if response.is_error() { "error" } else { "ok" };
    metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
    response
}

async fn execute_request(service: &Service, request: Request) -> Result<Response, ServiceError> {
    match request {
        Request::Ping => Ok(Response::Pong),
        Request::SignUp { username, password } => {
            let login = service.sign_up(&username, &password).await?;
            Ok(Response::Login(login))
        }
        Request::SignIn { username, password } => {
            let login = service.sign_in(&username, &password).await?;
            Ok(Response::Login(login))
        }
        Request::Rooms => {
            let rooms = service.get_rooms().await?;
            Ok(Response::Rooms { rooms })
        }
        Request::IsRoomAvailable { room_id, start, end } => {
            let available = service
                .is_room_available(room_id, DateRange::new(start, end))
                .await?;
            Ok(Response::Availability { available })
        }
        Request::FreeWindows { room_id, start, end } => {
            let windows = service.free_windows(room_id, DateRange::new(start, end)).await?;
            Ok(Response::FreeWindows { windows })
        }
        Request::Reservation { id } => {
            let reservation = service.get_reservation(id).await?;
            Ok(Response::Reservation { reservation })
        }
        Request::MyReservations { token } => {
            let reservations = service.get_user_reservations(&token).await?;
            Ok(Response::Reservations { reservations })
        }
        Request::ReserveRoom { token, room_id, start, end } => {
            let booking = service
                .reserve_room(&token, room_id, DateRange::new(start, end))
                .await?;
            Ok(Response::Booking(booking))
        }
        Request::UpdateReservation { token, reservation } => {
            let ok = service.update_reservation(&token, &reservation).await?;
            Ok(Response::Updated { ok })
        }
        Request::DeleteReservation { token, reservation_id } => {
            let ok = service.delete_reservation(&token, reservation_id).await?;
            Ok(Response::Deleted { ok })
        }
        Request::CreateRoom { admin_password, name } => {
            let room = service.create_room(&admin_password, &name).await?;
            Ok(Response::Room { room })
        }
        Request::DeleteRoom { admin_password, room_id } => {
            let ok = service.delete_room(&admin_password, room_id).await?;
            Ok(Response::Deleted { ok })
        }
    }
}

fn error_response(e: &ServiceError) -> Response {
    let code = match e {
        ServiceError::Unauthenticated => ErrorCode::Unauthenticated,
        ServiceError::Forbidden => ErrorCode::Forbidden,
        ServiceError::Auth(AuthError::InvalidCredentials) => ErrorCode::InvalidCredentials,
        ServiceError::Auth(AuthError::UsernameTaken) => ErrorCode::UsernameTaken,
        ServiceError::Auth(AuthError::LimitExceeded(_)) => ErrorCode::LimitExceeded,
        ServiceError::Auth(AuthError::Store(store)) => store_code(store),
        ServiceError::Engine(EngineError::InvalidRange) => ErrorCode::BadRequest,
        ServiceError::Engine(EngineError::LimitExceeded(_)) => ErrorCode::LimitExceeded,
        ServiceError::Engine(EngineError::Timeout(_)) => ErrorCode::Timeout,
        ServiceError::Engine(EngineError::Store(store)) => store_code(store),
    };
    if code == ErrorCode::Internal {
        error!("request failed: {e}");
        return Response::error(code, "internal error");
    }
    Response::error(code, e.to_string())
}

fn store_code(e: &StoreError) -> ErrorCode {
    match e {
        StoreError::AlreadyExists(_) | StoreError::HasReservations(_) => ErrorCode::Conflict,
        StoreError::LimitExceeded(_) => ErrorCode::LimitExceeded,
        StoreError::Wal(_) => ErrorCode::Internal,
    }
}
