//! Database entities.

pub mod capacity;
pub mod group_registration;
pub mod reservation_hold;

pub use capacity::Entity as Capacity;
pub use group_registration::Entity as GroupRegistration;
pub use reservation_hold::Entity as ReservationHold;
