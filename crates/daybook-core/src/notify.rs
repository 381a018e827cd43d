use std::cell::RefCell;
use std::rc::Rc;

use crate::date_cursor::MonthTarget;
use crate::error::DataLoadError;

/// User-visible message about a failed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub target: MonthTarget,
    pub message: String,
    pub error: DataLoadError,
}

/// The single channel through which the engine reports load failures.
pub trait Notifier {
    fn notify(&mut self, notice: Notice);
}

/// Logs notices; used when the embedder supplies no channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&mut self, notice: Notice) {
        tracing::warn!(
            month = %notice.target,
            error = %notice.error,
            "{}",
            notice.message
        );
    }
}

/// Collects notices for later display. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct NoticeLog {
    inner: Rc<RefCell<Vec<Notice>>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.inner.borrow().clone()
    }

    pub fn drain(&self) -> Vec<Notice> {
        self.inner.borrow_mut().drain(..).collect()
    }
}

impl Notifier for NoticeLog {
    fn notify(&mut self, notice: Notice) {
        tracing::debug!(month = %notice.target, "queued notice");
        self.inner.borrow_mut().push(notice);
    }
}
