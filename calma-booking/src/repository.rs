use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus};

/// Repository trait for durable bookings. Bookings are append-mostly: rows
/// are inserted at commit and only their status flips afterwards.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn save_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_booking(
        &self,
        id: Uuid,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_bookings(
        &self,
        client_id: &str,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>>;
}

/// In-memory booking store. Doubles as the synchronous read side the
/// availability feed recomputes from on every query.
pub struct InMemoryBookingStore {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self {
            bookings: RwLock::new(HashMap::new()),
        }
    }

    pub fn confirmed_snapshot(&self) -> Vec<Booking> {
        self.bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingStore {
    async fn save_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.bookings
            .write()
            .unwrap()
            .insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(
        &self,
        id: Uuid,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.bookings.read().unwrap().get(&id).cloned())
    }

    async fn list_bookings(
        &self,
        client_id: &str,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| b.client_id == client_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }
}
