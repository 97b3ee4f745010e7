//! git::fault_injection
//!
//! Controlled failure injection for backend operations.
//!
//! Timeouts and command failures of fetch, merge, push and grep are hard to
//! provoke against real repositories. Under `cfg(test)` or the
//! `fault_injection` feature, a fault registered here replaces the next call
//! of the matching operation on the current thread. In other builds
//! [`injected`] always returns `None`.
//!
//! # Usage
//!
//! ```ignore
//! use docsync::git::fault_injection::{self, Fault, Operation};
//!
//! fault_injection::inject(Operation::Fetch, Fault::Timeout);
//! assert_eq!(repository.fetch(), Some(FetchResult::Error(...)));
//! fault_injection::reset();
//! ```

use super::interface::Outcome;

/// Backend operations that accept injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Merge,
    Push,
    Grep,
}

/// The failure to report instead of running the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Timeout,
    Failed(String),
}

#[cfg(any(test, feature = "fault_injection"))]
mod state {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::{Fault, Operation};

    // Thread-local so parallel tests cannot see each other's faults.
    thread_local! {
        static FAULTS: RefCell<HashMap<Operation, Fault>> = RefCell::new(HashMap::new());
    }

    pub fn inject(operation: Operation, fault: Fault) {
        FAULTS.with(|faults| {
            faults.borrow_mut().insert(operation, fault);
        });
    }

    pub fn take(operation: Operation) -> Option<Fault> {
        FAULTS.with(|faults| faults.borrow_mut().remove(&operation))
    }

    pub fn reset() {
        FAULTS.with(|faults| faults.borrow_mut().clear());
    }
}

#[cfg(any(test, feature = "fault_injection"))]
pub use state::{inject, reset};

/// The injected outcome for `operation`, consuming the fault.
#[cfg(any(test, feature = "fault_injection"))]
pub(crate) fn injected<T>(operation: Operation) -> Option<Outcome<T>> {
    state::take(operation).map(|fault| {
        tracing::debug!(?operation, ?fault, "injected backend fault");
        match fault {
            Fault::Timeout => Outcome::Timeout,
            Fault::Failed(message) => Outcome::Failed(message),
        }
    })
}

#[cfg(not(any(test, feature = "fault_injection")))]
pub(crate) fn injected<T>(_operation: Operation) -> Option<Outcome<T>> {
    None
}
