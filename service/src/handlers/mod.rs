//! Handlers registered with the event router.

pub mod otp;

pub use otp::{MAX_DELIVERY_ATTEMPTS, OtpEventHandler};
