use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per practitioner. Held across conflict check and write so two
/// bookings for the same practitioner cannot both pass the check.
#[derive(Default)]
pub(crate) struct PractitionerLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl PractitionerLocks {
    pub(crate) async fn acquire(&self, practitioner_id: Uuid) -> OwnedMutexGuard<()> {
        // Clone the handle out so the shard lock is released before awaiting.
        let lock = self
            .locks
            .entry(practitioner_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
