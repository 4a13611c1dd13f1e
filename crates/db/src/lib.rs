pub mod backend;
pub mod models;
mod rest;
pub mod types;

pub use backend::{ApiErrorBody, Backend, BackendError, RoleRpc, TaskOrder, TaskQuery};
pub use rest::{RestBackend, normalize_base_url};
