//! Store seams the engine talks to. Bookings and slots are independent
//! top-level records; customer names and the service catalog are owned
//! elsewhere and only consulted.

mod directory;
mod memory;

pub use directory::{QuoteCatalog, StaticDirectory};
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(Ulid),
    #[error("WAL error: {0}")]
    Wal(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError>;

    async fn get(&self, id: Ulid) -> Result<Option<Booking>, StoreError>;

    /// Persist a new booking. The store assigns the id.
    async fn insert(&self, booking: Booking) -> Result<Booking, StoreError>;

    async fn update(&self, id: Ulid, patch: BookingPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: Ulid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn find(&self, filter: &SlotFilter) -> Result<Vec<AvailabilitySlot>, StoreError>;

    async fn get(&self, id: Ulid) -> Result<Option<AvailabilitySlot>, StoreError>;

    /// Persist a new slot. The store assigns the id.
    async fn insert(&self, slot: AvailabilitySlot) -> Result<AvailabilitySlot, StoreError>;

    async fn update(&self, id: Ulid, patch: SlotPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: Ulid) -> Result<(), StoreError>;

    /// Set `is_available = new` only if it currently equals `expected`.
    /// Returns whether the swap happened.
    async fn compare_and_set_available(
        &self,
        id: Ulid,
        expected: bool,
        new: bool,
    ) -> Result<bool, StoreError>;
}

/// Customer display names, used only to enrich conflict reports.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn display_name(&self, customer_id: Ulid) -> Result<Option<String>, StoreError>;
}

pub trait ServiceCatalog: Send + Sync {
    /// Quote-exempt services never need a matching slot.
    fn is_quote_exempt(&self, service_name: &str) -> bool;
}
