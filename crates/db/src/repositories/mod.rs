//! Database repositories.

mod capacity;
mod group_registration;
mod reservation_hold;

pub use capacity::{CapacityRepository, CapacitySettings};
pub use group_registration::GroupRegistrationRepository;
pub use reservation_hold::ReservationHoldRepository;
