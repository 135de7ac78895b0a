//! Write-once accessor slot

use corvid_sdk::BridgeResult;
use once_cell::race::OnceBox;

/// A lazily resolved accessor.
///
/// Starts unresolved. Concurrent resolvers may each compute a value, but a
/// single compare-and-install commits exactly one; the losers' values are
/// dropped and every caller gets the winner. Readers only ever see a fully
/// built value.
pub struct AccessorSlot<T> {
    cell: OnceBox<T>,
}

impl<T> AccessorSlot<T> {
    /// An unresolved slot.
    pub const fn new() -> Self {
        Self {
            cell: OnceBox::new(),
        }
    }

    /// The resolved value, if any.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Whether a value has been committed.
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The resolved value, computing it with `resolve` if needed. A failed
    /// resolution leaves the slot unresolved and is returned as is.
    pub fn get_or_try_init(&self, resolve: impl FnOnce() -> BridgeResult<T>) -> BridgeResult<&T> {
        self.cell.get_or_try_init(|| resolve().map(Box::new))
    }
}

impl<T> Default for AccessorSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
