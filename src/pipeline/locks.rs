use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per date, so at most one run writes a given date at a time.
#[derive(Clone, Default)]
pub struct DateLocks {
    slots: Arc<Mutex<HashMap<NaiveDate, Arc<AsyncMutex<()>>>>>,
}

impl DateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, date: NaiveDate) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Slots nobody holds or waits on are only referenced by the map.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(date).or_default().clone()
        };
        slot.lock_owned().await
    }
}
