//! # Notifier Mailer
//!
//! Renders OTP emails and hands them to an SMTP relay.
//!
//! - [`DeliveryBackend`]: the transport seam, implemented by [`SmtpBackend`]
//!   and, behind the `test-utils` feature, by [`MockDeliveryBackend`]
//! - [`templates`]: subject, HTML and plain-text bodies
//! - [`DeliveryService`]: expiry math, composition and bounded retry
//!
//! ## Example
//!
//! ```ignore
//! use notifier_mailer::{Branding, DeliveryService, SmtpBackend, SmtpSettings};
//!
//! let backend = Arc::new(SmtpBackend::new(&settings)?);
//! backend.verify().await?;
//!
//! let delivery = DeliveryService::new(backend, SystemClock, Branding::default());
//! delivery.deliver_with_retry(&otp, 3).await?;
//! ```

pub mod backend;
pub mod error;
#[cfg(feature = "test-utils")]
pub mod mocks;
pub mod service;
pub mod smtp;
pub mod templates;

pub use backend::{DeliveryBackend, DeliveryReceipt, OutboundEmail};
pub use error::{DeliveryError, Result};
#[cfg(feature = "test-utils")]
pub use mocks::MockDeliveryBackend;
pub use service::{Branding, DeliveryService, minutes_until};
pub use smtp::{SmtpBackend, SmtpSettings};
