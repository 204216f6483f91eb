use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Identifies one scheduled tick so it can be cancelled before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickToken(pub u64);

/// Abstraction over the per-frame callback source driving the render loop.
///
/// Implementations arrange for [`RenderLoop::tick`](crate::RenderLoop::tick)
/// to be called once per requested tick. Everything runs on one thread.
pub trait TickScheduler {
    /// Requests a single future tick.
    fn request_tick(&mut self) -> TickToken;
    /// Withdraws a tick that has not fired yet.
    fn cancel_tick(&mut self, token: TickToken);
}

impl<S: TickScheduler + ?Sized> TickScheduler for Box<S> {
    fn request_tick(&mut self) -> TickToken {
        (**self).request_tick()
    }

    fn cancel_tick(&mut self, token: TickToken) {
        (**self).cancel_tick(token)
    }
}

/// Scheduler that only records requests; the owner decides when to tick.
///
/// Clones share the same queue, so a host can keep one clone and hand the
/// other to the loop.
#[derive(Debug, Clone, Default)]
pub struct QueuedScheduler {
    inner: Rc<RefCell<QueuedInner>>,
}

#[derive(Debug, Default)]
struct QueuedInner {
    next: u64,
    pending: BTreeSet<TickToken>,
    cancelled: usize,
}

impl QueuedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requested ticks not yet taken or cancelled.
    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    pub fn cancelled(&self) -> usize {
        self.inner.borrow().cancelled
    }

    /// Removes the oldest pending tick, if any.
    pub fn take(&self) -> Option<TickToken> {
        self.inner.borrow_mut().pending.pop_first()
    }
}

impl TickScheduler for QueuedScheduler {
    fn request_tick(&mut self) -> TickToken {
        let mut inner = self.inner.borrow_mut();
        inner.next += 1;
        let token = TickToken(inner.next);
        inner.pending.insert(token);
        token
    }

    fn cancel_tick(&mut self, token: TickToken) {
        let mut inner = self.inner.borrow_mut();
        if inner.pending.remove(&token) {
            inner.cancelled += 1;
        }
    }
}
