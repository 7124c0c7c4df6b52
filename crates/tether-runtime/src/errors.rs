//! Server error aggregation

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tether_core::CoreError;

/// What a barrier drain does to the error list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorRetention {
    /// Each barrier reports only the errors seen since the previous one
    #[default]
    ClearOnDrain,
    /// Errors stay for the lifetime of the instance; every later barrier
    /// reports them again
    Accumulate,
}

/// Append-only list of server errors seen while pumping
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    errors: Mutex<Vec<CoreError>>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, error: CoreError) {
        self.errors.lock().push(error);
    }

    /// Read the list after a loop run, applying `retention`
    pub fn drain(&self, retention: ErrorRetention) -> Vec<CoreError> {
        let mut errors = self.errors.lock();
        match retention {
            ErrorRetention::ClearOnDrain => std::mem::take(&mut *errors),
            ErrorRetention::Accumulate => errors.clone(),
        }
    }

    pub fn snapshot(&self) -> Vec<CoreError> {
        self.errors.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}
