use crate::{
    buffer::{self, BufferId},
    error::Result,
    value::Value,
};
use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    marker::PhantomData,
};

/// Non-owning reference to a slot of a [`ResultBuffer`](crate::ResultBuffer)
/// holding (or about to hold) a value of type `T`.
///
/// Handles are plain `(buffer, slot)` pairs. They do not keep the
/// buffer alive; resolving a handle whose buffer was released fails
/// with [`Error::DanglingReference`](crate::Error::DanglingReference).
pub struct Handle<T> {
    buffer: BufferId,
    slot: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Value> Handle<T> {
    pub(crate) fn new(buffer: BufferId, slot: u32) -> Self {
        Self {
            buffer,
            slot,
            _marker: PhantomData,
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Whether the referenced buffer has not been released.
    pub fn is_alive(&self) -> bool {
        buffer::is_live(self.buffer)
    }

    /// Reads the value the producing operation wrote.
    pub fn resolve(&self) -> Result<T> {
        buffer::read_slot(self.buffer, self.slot)
    }
}

/// Reads the value behind `handle`.
pub fn resolve<T: Value>(handle: Handle<T>) -> Result<T> {
    handle.resolve()
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer && self.slot == other.slot
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.buffer.hash(state);
        self.slot.hash(state);
    }
}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("buffer", &self.buffer)
            .field("slot", &self.slot)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
