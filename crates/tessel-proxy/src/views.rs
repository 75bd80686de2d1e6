//! Memory views and dirty-tracking configuration handed to proxy classes.

use std::fmt;
use std::rc::Rc;

use tessel_arena::SharedMemory;

use crate::proxy::Proxy;

/// Callback fired synchronously whenever a dirty bit or index flips.
///
/// Receives the absolute dirty-bit index (objects), the element index
/// (arrays) or the key's position in the dirty-key set (maps), together
/// with the root instance that changed.
#[derive(Clone)]
pub struct DirtyCallback(Rc<dyn Fn(usize, &Proxy)>);

impl DirtyCallback {
    /// Wrap a closure.
    pub fn new(f: impl Fn(usize, &Proxy) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callback.
    pub fn call(&self, bit: usize, proxy: &Proxy) {
        (self.0)(bit, proxy);
    }
}

impl fmt::Debug for DirtyCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DirtyCallback")
    }
}

/// How a proxy class records changes.
#[derive(Clone, Debug, Default)]
pub enum Tracking {
    /// No dirty state at all; `diff()` returns `None`.
    Off,
    /// Dirty bits and index sets are maintained silently.
    #[default]
    On,
    /// Dirty state is maintained and every flip is reported.
    Notify(DirtyCallback),
}

impl Tracking {
    /// Track and report through `f`.
    pub fn notify(f: impl Fn(usize, &Proxy) + 'static) -> Self {
        Self::Notify(DirtyCallback::new(f))
    }

    /// Whether dirty state is maintained.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }

    pub(crate) fn callback(&self) -> Option<&DirtyCallback> {
        match self {
            Self::Notify(callback) => Some(callback),
            _ => None,
        }
    }
}

/// The memories and tracking mode a generated proxy class is bound to.
///
/// `data` is required for buffer-mapped storage. `dirty` holds the bit
/// vector for object leaves; without it object leaves are never reported
/// dirty, although arrays and maps still track their own index sets when
/// tracking is enabled.
#[derive(Clone, Debug, Default)]
pub struct Views {
    /// Data region for buffer-mapped objects.
    pub data: Option<SharedMemory>,
    /// Dirty bit vector.
    pub dirty: Option<SharedMemory>,
    /// Tracking mode.
    pub tracking: Tracking,
}

impl Views {
    /// Views with no memories and default tracking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a data region.
    pub fn with_data(mut self, data: SharedMemory) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a dirty bit vector.
    pub fn with_dirty(mut self, dirty: SharedMemory) -> Self {
        self.dirty = Some(dirty);
        self
    }

    /// Set the tracking mode.
    pub fn with_tracking(mut self, tracking: Tracking) -> Self {
        self.tracking = tracking;
        self
    }

    pub(crate) fn notify(&self, bit: usize, proxy: &Proxy) {
        if let Some(callback) = self.tracking.callback() {
            callback.call(bit, proxy);
        }
    }
}
