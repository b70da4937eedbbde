//! Per-slot serialization of booking writes
//!
//! The conflict check and the insert are two store round-trips. Holding the
//! slot mutex across both makes them one critical section per
//! (station, mode, slot). Station-wide changes (deactivation, capacity
//! changes) take the station lock exclusively; slot writers hold it shared.
//!
//! Lock order: station locks (ascending id), then slot locks (ascending key).
//!
//! The registry only serializes writers inside one process. Several service
//! instances over one database need a store-side guarantee instead.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use crate::domain::booking::ChargingMode;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub station_id: Uuid,
    pub mode: ChargingMode,
    pub slot_id: String,
}

impl SlotKey {
    pub fn new(station_id: Uuid, mode: ChargingMode, slot_id: impl Into<String>) -> Self {
        Self {
            station_id,
            mode,
            slot_id: slot_id.into(),
        }
    }
}

/// Held while checking and writing bookings on one or more slots.
pub struct SlotGuard {
    // Field order is drop order: slots are released before stations.
    _slots: Vec<OwnedMutexGuard<()>>,
    _stations: Vec<OwnedRwLockReadGuard<()>>,
}

/// Held while changing a station in a way that affects its bookings.
pub struct StationGuard {
    _station: OwnedRwLockWriteGuard<()>,
}

#[derive(Default)]
pub struct SlotLockRegistry {
    stations: DashMap<Uuid, Arc<RwLock<()>>>,
    slots: DashMap<SlotKey, Arc<Mutex<()>>>,
}

impl SlotLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn station_lock(&self, station_id: Uuid) -> Arc<RwLock<()>> {
        self.stations.entry(station_id).or_default().clone()
    }

    fn slot_lock(&self, key: &SlotKey) -> Arc<Mutex<()>> {
        self.slots.entry(key.clone()).or_default().clone()
    }

    /// Lock every slot in `keys`. Duplicates are ignored.
    pub async fn lock_slots(&self, mut keys: Vec<SlotKey>) -> SlotGuard {
        keys.sort();
        keys.dedup();

        let mut station_ids: Vec<Uuid> = keys.iter().map(|k| k.station_id).collect();
        station_ids.dedup();

        let mut stations = Vec::with_capacity(station_ids.len());
        for id in station_ids {
            stations.push(self.station_lock(id).read_owned().await);
        }

        let mut slots = Vec::with_capacity(keys.len());
        for key in &keys {
            slots.push(self.slot_lock(key).lock_owned().await);
        }

        SlotGuard {
            _slots: slots,
            _stations: stations,
        }
    }

    pub async fn lock_slot(&self, key: SlotKey) -> SlotGuard {
        self.lock_slots(vec![key]).await
    }

    /// Exclusive lock on a station; waits for in-flight slot writers.
    pub async fn lock_station(&self, station_id: Uuid) -> StationGuard {
        StationGuard {
            _station: self.station_lock(station_id).write_owned().await,
        }
    }

    /// Drop lock entries nobody holds or waits on.
    pub fn prune_idle(&self) {
        self.slots.retain(|_, lock| Arc::strong_count(lock) > 1);
        self.stations.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn key(station: Uuid, slot: &str) -> SlotKey {
        SlotKey::new(station, ChargingMode::Ac, slot)
    }

    #[tokio::test]
    async fn same_slot_is_exclusive() {
        let registry = Arc::new(SlotLockRegistry::new());
        let station = Uuid::new_v4();

        let held = registry.lock_slot(key(station, "A1")).await;
        let blocked = timeout(
            Duration::from_millis(50),
            registry.lock_slot(key(station, "A1")),
        )
        .await;
        assert!(blocked.is_err());

        drop(held);
        let acquired = timeout(
            Duration::from_millis(50),
            registry.lock_slot(key(station, "A1")),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn different_slots_do_not_block() {
        let registry = SlotLockRegistry::new();
        let station = Uuid::new_v4();

        let _a1 = registry.lock_slot(key(station, "A1")).await;
        let a2 = timeout(
            Duration::from_millis(50),
            registry.lock_slot(key(station, "A2")),
        )
        .await;
        assert!(a2.is_ok());
    }

    #[tokio::test]
    async fn station_lock_waits_for_slot_writers() {
        let registry = SlotLockRegistry::new();
        let station = Uuid::new_v4();

        let slot = registry.lock_slot(key(station, "A1")).await;
        let station_lock = timeout(Duration::from_millis(50), registry.lock_station(station)).await;
        assert!(station_lock.is_err());

        drop(slot);
        let _exclusive = registry.lock_station(station).await;
        let writer = timeout(
            Duration::from_millis(50),
            registry.lock_slot(key(station, "A2")),
        )
        .await;
        assert!(writer.is_err());
    }

    #[tokio::test]
    async fn duplicate_keys_do_not_deadlock() {
        let registry = SlotLockRegistry::new();
        let station = Uuid::new_v4();
        let guard = timeout(
            Duration::from_millis(50),
            registry.lock_slots(vec![key(station, "A1"), key(station, "A1")]),
        )
        .await;
        assert!(guard.is_ok());
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let registry = SlotLockRegistry::new();
        let station = Uuid::new_v4();

        let held = registry.lock_slot(key(station, "A1")).await;
        drop(registry.lock_slot(key(station, "A2")).await);
        registry.prune_idle();
        assert_eq!(registry.len(), 1);

        drop(held);
        registry.prune_idle();
        assert!(registry.is_empty());
    }
}
