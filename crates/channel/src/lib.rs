//! Notification channel for the Unite settlement protocol
//!
//! The coordinator publishes announcements, escrow instructions, secret
//! reveals and status updates; resolvers publish commitments and readiness.
//! Delivery is at-least-once, so every consumer must tolerate duplicates.

pub mod channel;
pub mod memory;

pub use channel::{
    ChannelError, Envelope, NotificationChannel, NotificationChannelExt, Subscription, Topic,
};
pub use memory::InMemoryChannel;
