//! Raw status and error slot kept in one cell.
//!
//! Both the store and every tracked action own a [`StatusCell`]. A
//! transition writes the raw status and the error slot together, and the
//! observable `status`/`error` cells are projections of that single write,
//! so an observer of either one never sees the two disagree.

use signal_store_core::{Signal, Status, StoreError};

#[derive(Debug, Clone, PartialEq)]
struct Phase {
    raw: Status,
    error: Option<StoreError>,
}

impl Phase {
    fn observed(&self) -> Status {
        Status::derive(self.raw, self.error.is_some())
    }
}

#[derive(Clone)]
pub(crate) struct StatusCell {
    phase: Signal<Phase>,
    status: Signal<Status>,
    error: Signal<Option<StoreError>>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        let phase = Signal::new(Phase {
            raw: Status::Idle,
            error: None,
        });
        let status = phase.map_distinct(Phase::observed);
        let error = phase.map_distinct(|phase: &Phase| phase.error.clone());
        Self { phase, status, error }
    }

    pub(crate) fn status(&self) -> Status {
        self.phase.with(Phase::observed)
    }

    pub(crate) fn error(&self) -> Option<StoreError> {
        self.phase.with(|phase| phase.error.clone())
    }

    pub(crate) fn status_signal(&self) -> Signal<Status> {
        self.status.clone()
    }

    pub(crate) fn error_signal(&self) -> Signal<Option<StoreError>> {
        self.error.clone()
    }

    /// Enter `Loading` and clear the error slot.
    pub(crate) fn begin(&self) {
        self.phase.update(|phase| {
            phase.raw = Status::Loading;
            phase.error = None;
        });
    }

    pub(crate) fn resolve(&self) {
        self.phase.update(|phase| phase.raw = Status::Resolved);
    }

    /// Store `error` and enter `Error`.
    pub(crate) fn fail(&self, error: StoreError) {
        self.phase.update(|phase| {
            phase.raw = Status::Error;
            phase.error = Some(error);
        });
    }

    /// Fill the error slot, keeping the raw status.
    pub(crate) fn set_error(&self, error: StoreError) {
        self.phase.update(|phase| phase.error = Some(error));
    }

    /// Empty the error slot; a raw `Error` falls back to `Idle`.
    pub(crate) fn clear_error(&self) {
        self.phase.update(|phase| {
            phase.error = None;
            if phase.raw.is_error() {
                phase.raw = Status::Idle;
            }
        });
    }

    /// Drop every outside observer of the status and error cells.
    pub(crate) fn detach(&self) {
        self.status.clear_observers();
        self.error.clear_observers();
    }
}
