//! Job definitions.

#![allow(missing_docs)]

mod notification;

pub use notification::NotificationJob;
