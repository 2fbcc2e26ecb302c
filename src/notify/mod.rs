//! Notification subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Notifier config
//!     → template.rs (compile subject/intro/display templates + skeletons)
//!     → mailer.rs (build one SMTP transport per notifier)
//!     → Freeze as immutable NotifierRuntime
//!
//! Validated submission:
//!     → template.rs (render subject, intro, HTML + text bodies)
//!     → mailer.rs (hand off to the email provider)
//! ```
//!
//! # Design Decisions
//! - Templates compiled once; request time only renders
//! - First failing notifier aborts the rest; no compensating rollback
//!   for notifiers that already sent

pub mod mailer;
pub mod template;

pub use mailer::{MailError, Mailer, MailerFactory, OutgoingEmail, SmtpMailer, SmtpMailerFactory};
pub use template::{NotifierRuntime, NotifyError, TemplateError};
