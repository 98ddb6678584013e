//! Notification service: turns `auth.otp.generated` events into OTP emails.
//!
//! ```text
//!  auth-events ──► EventRouter ──► HandlerRegistry ──► OtpEventHandler
//!  (Kafka)         (one loop,        ("event-type"        │
//!                   commit after      header)             ▼
//!                   handler)                         DeliveryService ──► SMTP
//!                                                    (3 attempts,
//!                                                     0s / 1s / 2s)
//! ```
//!
//! The binary loads [`config::Config`], serves `/healthz`, `/readyz` and
//! `/metrics` immediately, and leaves broker connection to the bootstrap
//! supervisor in [`app`], which retries every five seconds until shutdown.
//!
//! # Modules
//!
//! - [`config`]: environment loading and validation
//! - [`handlers`]: the OTP event handler
//! - [`app`]: wiring and the bootstrap supervisor
//! - [`server`]: the HTTP surface
//! - [`shutdown`]: signal handling and graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod shutdown;

pub use app::{ConsumerShutdown, NotificationApp};
pub use config::{Config, ConfigError};
pub use error::{Result, ServiceError};
pub use handlers::OtpEventHandler;
