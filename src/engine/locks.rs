use tokio::sync::{Mutex, MutexGuard};

use crate::model::RoomId;

const STRIPES: usize = 64;

/// Exclusive per-room critical sections.
///
/// Room ids hash onto a fixed set of mutexes, so memory stays bounded no matter
/// which ids callers send. Two rooms sharing a stripe only serialize more.
pub struct RoomLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for RoomLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomLocks {
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe(&self, room_id: RoomId) -> usize {
        room_id.rem_euclid(self.stripes.len() as i64) as usize
    }

    pub async fn lock(&self, room_id: RoomId) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe(room_id)].lock().await
    }

    /// Lock several rooms. Stripes are taken in ascending order to prevent deadlocks.
    pub async fn lock_many(&self, room_ids: &[RoomId]) -> Vec<MutexGuard<'_, ()>> {
        let mut stripes: Vec<usize> = room_ids.iter().map(|&id| self.stripe(id)).collect();
        stripes.sort_unstable();
        stripes.dedup();

        let mut guards = Vec::with_capacity(stripes.len());
        for idx in stripes {
            guards.push(self.stripes[idx].lock().await);
        }
        guards
    }
}
