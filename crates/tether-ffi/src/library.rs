//! Library-wide initialisation

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use tether_core::{TetherError, TetherResult};

use crate::backend::Backend;
use crate::error::copy_string;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Proof that the foreign library is initialised.
///
/// Dropping it deinitialises the library. Instances borrow it, so every
/// handle is gone before deinit runs.
pub struct Library {
    backend: Rc<dyn Backend>,
}

impl Library {
    /// Initialise the foreign library.
    ///
    /// Fails with [`TetherError::AlreadyInitialized`] while another
    /// `Library` is alive in this process.
    pub fn init(backend: Rc<dyn Backend>) -> TetherResult<Self> {
        if INITIALIZED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TetherError::AlreadyInitialized);
        }
        backend.init();
        tracing::debug!("foreign library initialised");
        Ok(Library { backend })
    }

    /// Whether a `Library` is currently alive in this process
    pub fn is_initialized() -> bool {
        INITIALIZED.load(Ordering::Acquire)
    }

    pub fn backend(&self) -> &Rc<dyn Backend> {
        &self.backend
    }

    /// Version of the headers the backend was built against
    pub fn headers_version(&self) -> String {
        unsafe { copy_string(self.backend.headers_version()) }
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Version of the library loaded at runtime
    pub fn library_version(&self) -> String {
        unsafe { copy_string(self.backend.library_version()) }
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        self.backend.deinit();
        INITIALIZED.store(false, Ordering::Release);
        tracing::debug!("foreign library deinitialised");
    }
}
