//! Shared fixtures for the workspace's tests.

mod env;
pub mod fake_backend;

pub use env::{TestEnvGuard, test_lock};
pub use fake_backend::{
    ANON_KEY, DEFAULT_PASSWORD, FailPoint, FakeBackend, RecordedRequest, TaskSeed,
};
