use crate::{
    error::{Error, Result},
    handle::Handle,
    value::{Value, ValueKind},
};
use parking_lot::{Mutex, MutexGuard};
use slotmap::SlotMap;
use std::sync::OnceLock;

pub mod storage;

use storage::{SlotInfo, Storage};

slotmap::new_key_type! {
    /// Identifies a result buffer. Keys are generational, so the ID
    /// of a released buffer never refers to a later allocation.
    pub struct BufferId;
}

type Registry = SlotMap<BufferId, Storage>;

/// All live result buffers. Each entry is owned by exactly one
/// `ResultBuffer`, which removes it on release.
fn registry() -> MutexGuard<'static, Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default).lock()
}

/// Runs `f` on the storage of a live buffer.
fn with_storage<R>(id: BufferId, f: impl FnOnce(&mut Storage) -> R) -> Result<R> {
    let mut registry = registry();
    let storage = registry
        .get_mut(id)
        .ok_or(Error::DanglingReference { buffer: id })?;
    Ok(f(storage))
}

fn expect_slot(storage: &Storage, id: BufferId, slot: u32) -> &SlotInfo {
    storage
        .slot(slot)
        .unwrap_or_else(|| panic!("slot {slot} out of bounds for buffer {id:?}"))
}

/// Reads a value out of a slot of any live buffer.
///
/// # Panics
/// Panics if the slot does not exist or holds a different kind of value.
pub(crate) fn read_slot<T: Value>(id: BufferId, slot: u32) -> Result<T> {
    with_storage(id, |storage| {
        let info = expect_slot(storage, id, slot);
        assert_eq!(
            info.kind,
            T::KIND,
            "slot {slot} of buffer {id:?} does not hold a {:?}",
            T::KIND
        );
        storage
            .read(slot)
            .map(T::from_slots)
            .ok_or(Error::UnevaluatedHandle { buffer: id, slot })
    })?
}

/// Returns whether the buffer has not been released yet.
pub fn is_live(id: BufferId) -> bool {
    registry().contains_key(id)
}

/// Exclusively-owned storage for the results of one operation
/// or compound operation.
///
/// The buffer is not `Clone`: exactly one owner exists at any time.
/// Its storage is freed by `release()` or, failing that, when the
/// owner is dropped. Releasing more than once is a no-op.
#[derive(Debug)]
pub struct ResultBuffer {
    id: BufferId,
    released: bool,
}

impl ResultBuffer {
    /// Allocates a buffer with one slot per entry in `layout`.
    pub fn allocate(layout: &[ValueKind]) -> Self {
        let id = registry().insert(Storage::new(layout));
        tracing::debug!(buffer = ?id, slots = layout.len(), "allocated result buffer");
        Self {
            id,
            released: false,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Number of slots, or zero once released.
    pub fn num_slots(&self) -> usize {
        with_storage(self.id, |storage| storage.num_slots()).unwrap_or(0)
    }

    /// Appends a slot of the given kind.
    pub fn push_slot(&mut self, kind: ValueKind) -> Result<u32> {
        with_storage(self.id, |storage| storage.push_slot(kind))
    }

    /// Returns a handle to a slot. The handle does not keep
    /// the buffer alive.
    ///
    /// # Panics
    /// Panics if the slot exists but holds a different kind of value.
    pub fn handle<T: Value>(&self, slot: u32) -> Handle<T> {
        if let Ok(Some(kind)) = with_storage(self.id, |storage| storage.slot(slot).map(|s| s.kind))
        {
            assert_eq!(
                kind,
                T::KIND,
                "slot {slot} of buffer {:?} does not hold a {:?}",
                self.id,
                T::KIND
            );
        }
        Handle::new(self.id, slot)
    }

    /// # Panics
    /// Panics if the slot does not exist or holds a different kind of value.
    pub fn write<T: Value>(&mut self, slot: u32, value: &T) -> Result<()> {
        self.write_slots(slot, value.as_slots())
    }

    pub(crate) fn write_slots(&mut self, slot: u32, values: &[f32]) -> Result<()> {
        let id = self.id;
        with_storage(id, |storage| {
            expect_slot(storage, id, slot);
            storage.write(slot, values)
        })
    }

    pub fn read<T: Value>(&self, slot: u32) -> Result<T> {
        read_slot(self.id, slot)
    }

    /// Returns `false` once released.
    ///
    /// # Panics
    /// Panics if the buffer is live and the slot does not exist.
    pub fn is_written(&self, slot: u32) -> bool {
        let id = self.id;
        with_storage(id, |storage| {
            expect_slot(storage, id, slot);
            storage.is_written(slot)
        })
        .unwrap_or(false)
    }

    /// Frees the storage. Outstanding handles become dangling.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        registry().remove(self.id);
        tracing::debug!(buffer = ?self.id, "released result buffer");
    }
}

impl Drop for ResultBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Matrix, Scalar};

    #[test]
    fn write_then_read() {
        let mut buffer = ResultBuffer::allocate(&[ValueKind::Scalar, ValueKind::Matrix]);
        buffer.write(1, &Matrix::IDENTITY).unwrap();
        assert_eq!(buffer.read::<Matrix>(1).unwrap(), Matrix::IDENTITY);
        assert_eq!(
            buffer.read::<Scalar>(0),
            Err(Error::UnevaluatedHandle {
                buffer: buffer.id(),
                slot: 0
            })
        );
    }

    #[test]
    fn release_is_idempotent() {
        let mut buffer = ResultBuffer::allocate(&[ValueKind::Scalar]);
        let id = buffer.id();
        assert!(is_live(id));

        buffer.release();
        buffer.release();
        assert!(buffer.is_released());
        assert!(!is_live(id));
        assert_eq!(buffer.num_slots(), 0);
        drop(buffer);
    }

    #[test]
    fn released_ids_are_not_reused() {
        let mut first = ResultBuffer::allocate(&[ValueKind::Scalar]);
        let stale = first.handle::<Scalar>(0);
        first.release();

        let mut second = ResultBuffer::allocate(&[ValueKind::Scalar]);
        second.write(0, &Scalar(3.0)).unwrap();
        assert_ne!(second.id(), stale.buffer());
        assert_eq!(
            stale.resolve(),
            Err(Error::DanglingReference {
                buffer: stale.buffer()
            })
        );
    }

    #[test]
    fn write_after_release_fails() {
        let mut buffer = ResultBuffer::allocate(&[ValueKind::Scalar]);
        buffer.release();
        assert_eq!(
            buffer.write(0, &Scalar(1.0)),
            Err(Error::DanglingReference {
                buffer: buffer.id()
            })
        );
    }

    #[test]
    #[should_panic(expected = "slot 1 out of bounds")]
    fn write_out_of_range_panics() {
        let mut buffer = ResultBuffer::allocate(&[ValueKind::Scalar]);
        let _ = buffer.write(1, &Scalar(1.0));
    }

    #[test]
    #[should_panic(expected = "slot 3 out of bounds")]
    fn is_written_out_of_range_panics() {
        let buffer = ResultBuffer::allocate(&[ValueKind::Matrix]);
        buffer.is_written(3);
    }

    #[test]
    #[should_panic(expected = "does not hold a Matrix")]
    fn mistyped_handle_panics() {
        let buffer = ResultBuffer::allocate(&[ValueKind::Scalar]);
        let _ = buffer.handle::<Matrix>(0);
    }
}
