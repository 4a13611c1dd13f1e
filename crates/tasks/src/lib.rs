pub mod auth;
pub mod board;
pub mod calendar;
pub mod client;
pub mod error;
pub mod form;
pub mod identity;
pub mod notification;
pub mod pages;
pub mod session;
pub mod stats;
pub mod validation;

pub use auth::{AuthService, CallbackOutcome};
pub use board::{TaskBoard, TaskView};
pub use client::TaskDeskClient;
pub use error::{Result, ServiceError};
pub use form::TaskForm;
pub use identity::{HttpIdentityClient, IdentityClient, IdentityError};
pub use notification::{Notification, NotificationVariant};
pub use session::{Session, SessionContext, SessionKind, SessionStore};
