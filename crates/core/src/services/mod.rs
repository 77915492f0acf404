//! Business logic services.

#![allow(missing_docs)]

pub mod capacity;
pub mod group_registration;
pub mod notifier;
pub mod reconciliation;

pub use capacity::{CapacityService, CapacitySnapshot, ConfigureCapacityInput, ReservedHold};
pub use group_registration::{CreateGroupRegistrationInput, GroupRegistrationService};
pub use notifier::{CapacityEvent, CapacityNotifier, CapacityNotifierService, NoOpNotifier};
pub use reconciliation::{ReconciliationService, SweepOutcome, SweepReport};
