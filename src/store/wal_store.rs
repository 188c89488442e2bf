use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};

use crate::limits::*;
use crate::model::*;
use crate::wal::Wal;

use super::writer::{self, WalCommand};
use super::{Repository, StoreError};

/// In-memory tables rebuilt from, and persisted to, the event log.
///
/// Every mutation is appended to the log before it becomes visible.
pub struct WalStore {
    rooms: DashMap<RoomId, Room>,
    users: DashMap<String, User>,
    reservations: DashMap<ReservationId, Reservation>,
    /// Per-room reservations, sorted by start date.
    schedules: DashMap<RoomId, Vec<Reservation>>,
    next_room_id: AtomicI64,
    next_user_id: AtomicI64,
    next_reservation_id: AtomicI64,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Held shared by every mutation, exclusively by compaction.
    gate: RwLock<()>,
    /// Serializes mutations that read-then-write an existing row.
    rewrite: Mutex<()>,
}

fn insert_sorted(schedule: &mut Vec<Reservation>, reservation: Reservation) {
    let pos = schedule.partition_point(|r| r.start_date <= reservation.start_date);
    schedule.insert(pos, reservation);
}

fn bump(counter: &AtomicI64, seen: i64) {
    counter.fetch_max(seen + 1, Ordering::SeqCst);
}

impl WalStore {
    /// Replay the log at `path` and start its writer task. Must run inside a tokio runtime.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(writer::run(wal, wal_rx));

        let store = Self {
            rooms: DashMap::new(),
            users: DashMap::new(),
            reservations: DashMap::new(),
            schedules: DashMap::new(),
            next_room_id: AtomicI64::new(1),
            next_user_id: AtomicI64::new(1),
            next_reservation_id: AtomicI64::new(1),
            wal_tx,
            gate: RwLock::new(()),
            rewrite: Mutex::new(()),
        };
        for event in &events {
            store.apply(event);
        }
        tracing::info!(
            path = %path.display(),
            events = events.len(),
            rooms = store.rooms.len(),
            users = store.users.len(),
            reservations = store.reservations.len(),
            "store replayed"
        );
        Ok(store)
    }

    fn apply(&self, event: &Event) {
        match event {
            Event::RoomCreated { room } => {
                bump(&self.next_room_id, room.id);
                self.schedules.entry(room.id).or_default();
                self.rooms.insert(room.id, room.clone());
            }
            Event::RoomDeleted { id } => {
                self.rooms.remove(id);
                self.schedules.remove(id);
            }
            Event::UserCreated { user } => {
                bump(&self.next_user_id, user.id);
                self.users.insert(user.username.clone(), user.clone());
            }
            Event::ReservationCreated { reservation } => {
                bump(&self.next_reservation_id, reservation.id);
                self.reservations.insert(reservation.id, reservation.clone());
                insert_sorted(
                    &mut self.schedules.entry(reservation.room_id).or_default(),
                    reservation.clone(),
                );
            }
            Event::ReservationUpdated { reservation } => {
                self.unschedule(reservation.id);
                self.reservations.insert(reservation.id, reservation.clone());
                insert_sorted(
                    &mut self.schedules.entry(reservation.room_id).or_default(),
                    reservation.clone(),
                );
            }
            Event::ReservationDeleted { id } => {
                self.unschedule(*id);
                self.reservations.remove(id);
            }
            Event::Counters { next_room_id, next_user_id, next_reservation_id } => {
                self.next_room_id.fetch_max(*next_room_id, Ordering::SeqCst);
                self.next_user_id.fetch_max(*next_user_id, Ordering::SeqCst);
                self.next_reservation_id
                    .fetch_max(*next_reservation_id, Ordering::SeqCst);
            }
        }
    }

    fn unschedule(&self, id: ReservationId) {
        let Some(old) = self.reservations.get(&id).map(|r| r.room_id) else {
            return;
        };
        if let Some(mut schedule) = self.schedules.get_mut(&old) {
            schedule.retain(|r| r.id != id);
        }
    }

    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { event: event.clone(), response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    async fn persist_and_apply(&self, event: Event) -> Result<(), StoreError> {
        self.wal_append(&event).await?;
        self.apply(&event);
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Minimal event list that recreates the current tables.
    fn snapshot(&self) -> Vec<Event> {
        let mut events = vec![Event::Counters {
            next_room_id: self.next_room_id.load(Ordering::SeqCst),
            next_user_id: self.next_user_id.load(Ordering::SeqCst),
            next_reservation_id: self.next_reservation_id.load(Ordering::SeqCst),
        }];
        let mut rooms: Vec<Room> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by_key(|r| r.id);
        events.extend(rooms.into_iter().map(|room| Event::RoomCreated { room }));

        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        events.extend(users.into_iter().map(|user| Event::UserCreated { user }));

        let mut reservations: Vec<Reservation> =
            self.reservations.iter().map(|e| e.value().clone()).collect();
        reservations.sort_by_key(|r| r.id);
        events.extend(
            reservations
                .into_iter()
                .map(|reservation| Event::ReservationCreated { reservation }),
        );
        events
    }

    /// Rewrite the log as a snapshot of the current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _gate = self.gate.write().await;
        let events = self.snapshot();
        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))?;
        tracing::info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl Repository for WalStore {
    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by_key(|r| r.id);
        Ok(rooms)
    }

    async fn list_reservations_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Reservation>, StoreError> {
        let mut mine: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        mine.sort_by_key(|r| (r.start_date, r.id));
        Ok(mine)
    }

    async fn list_reservations_for_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<Reservation>, StoreError> {
        Ok(self
            .schedules
            .get(&room_id)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        Ok(self.reservations.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_reservation(
        &self,
        room_id: RoomId,
        user_id: UserId,
        range: DateRange,
    ) -> Result<ReservationId, StoreError> {
        let _gate = self.gate.read().await;
        let id = self.next_reservation_id.fetch_add(1, Ordering::SeqCst);
        let reservation = Reservation {
            id,
            room_id,
            user_id,
            start_date: range.start,
            end_date: range.end,
        };
        self.persist_and_apply(Event::ReservationCreated { reservation }).await?;
        Ok(id)
    }

    async fn update_reservation(
        &self,
        id: ReservationId,
        user_id: UserId,
        room_id: RoomId,
        range: DateRange,
    ) -> Result<u64, StoreError> {
        let _gate = self.gate.read().await;
        let _rewrite = self.rewrite.lock().await;
        let owned = self
            .reservations
            .get(&id)
            .is_some_and(|r| r.user_id == user_id);
        if !owned {
            return Ok(0);
        }
        let reservation = Reservation {
            id,
            room_id,
            user_id,
            start_date: range.start,
            end_date: range.end,
        };
        self.persist_and_apply(Event::ReservationUpdated { reservation }).await?;
        Ok(1)
    }

    async fn delete_reservation(&self, id: ReservationId, user_id: UserId) -> Result<u64, StoreError> {
        let _gate = self.gate.read().await;
        let _rewrite = self.rewrite.lock().await;
        let owned = self
            .reservations
            .get(&id)
            .is_some_and(|r| r.user_id == user_id);
        if !owned {
            return Ok(0);
        }
        self.persist_and_apply(Event::ReservationDeleted { id }).await?;
        Ok(1)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(username).map(|e| e.value().clone()))
    }

    async fn insert_user(
        &self,
        username: &str,
        password_hash: PasswordHash,
    ) -> Result<UserId, StoreError> {
        if username.len() > MAX_USERNAME_LEN {
            return Err(StoreError::LimitExceeded("username too long"));
        }
        let _gate = self.gate.read().await;
        let _rewrite = self.rewrite.lock().await;
        if self.users.contains_key(username) {
            return Err(StoreError::AlreadyExists(username.to_string()));
        }
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let user = User { id, username: username.to_string(), password_hash };
        self.persist_and_apply(Event::UserCreated { user }).await?;
        Ok(id)
    }

    async fn insert_room(&self, name: &str) -> Result<Room, StoreError> {
        if name.len() > MAX_ROOM_NAME_LEN {
            return Err(StoreError::LimitExceeded("room name too long"));
        }
        let _gate = self.gate.read().await;
        let _rewrite = self.rewrite.lock().await;
        if self.rooms.len() >= MAX_ROOMS {
            return Err(StoreError::LimitExceeded("too many rooms"));
        }
        let id = self.next_room_id.fetch_add(1, Ordering::SeqCst);
        let room = Room { id, name: name.to_string() };
        self.persist_and_apply(Event::RoomCreated { room: room.clone() }).await?;
        Ok(room)
    }

    async fn delete_room(&self, id: RoomId) -> Result<u64, StoreError> {
        let _gate = self.gate.read().await;
        let _rewrite = self.rewrite.lock().await;
        if !self.rooms.contains_key(&id) {
            return Ok(0);
        }
        if self.schedules.get(&id).is_some_and(|s| !s.is_empty()) {
            return Err(StoreError::HasReservations(id));
        }
        self.persist_and_apply(Event::RoomDeleted { id }).await?;
        Ok(1)
    }
}
