use std::{
    path::Path,
    sync::{Mutex, MutexGuard, OnceLock},
};

const ASSET_DIR_ENV: &str = "TASKDESK_ASSET_DIR";

pub fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Points the asset dir at a temp root and restores every touched variable on drop.
pub struct TestEnvGuard {
    _lock: MutexGuard<'static, ()>,
    previous: Vec<(String, Option<String>)>,
}

impl TestEnvGuard {
    pub fn new(asset_root: &Path) -> Self {
        let lock = test_lock().lock().unwrap_or_else(|err| err.into_inner());
        let guard = Self {
            _lock: lock,
            previous: Vec::new(),
        };
        guard.with_var(ASSET_DIR_ENV, asset_root.to_string_lossy())
    }

    pub fn with_var(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.previous.push((name.to_string(), std::env::var(name).ok()));
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            std::env::set_var(name, value.as_ref());
        }
        self
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            for (name, value) in self.previous.iter().rev() {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }
    }
}
