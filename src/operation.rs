use crate::{
    buffer::{BufferId, ResultBuffer},
    error::{Error, Result},
    handle::Handle,
    opgraph::op::{Op, Operand},
    value::Value,
};
use std::{fmt, marker::PhantomData};

/// Something that produces a `Handle<Output>` when evaluated.
///
/// Implemented by [`Operation`] and [`CompoundOperation`](crate::CompoundOperation).
pub trait Evaluate {
    type Output: Value;

    /// Handle the result will be written to. Available before evaluation,
    /// so dependent operations can be built up front.
    fn handle(&self) -> Handle<Self::Output>;

    /// Computes the result if it has not been computed yet.
    ///
    /// Evaluation is idempotent: once it has succeeded, further calls
    /// return the same handle without recomputing.
    fn evaluate(&mut self) -> Result<Handle<Self::Output>>;

    fn is_evaluated(&self) -> bool;

    /// Frees the result buffer. Idempotent.
    fn release(&mut self);

    fn buffer_id(&self) -> BufferId;

    /// Buffers read by this node that it does not own.
    fn external_inputs(&self) -> Vec<BufferId>;
}

/// A single deferred computation writing one value of type `T`.
pub struct Operation<T> {
    op: Op,
    buffer: ResultBuffer,
    evaluated: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Value> Operation<T> {
    /// # Panics
    /// Panics if `op` does not produce a `T`.
    pub fn new(op: Op) -> Self {
        assert_eq!(
            op.output_kind(),
            T::KIND,
            "{:?} does not produce a {:?}",
            op.kind(),
            T::KIND
        );
        Self {
            op,
            buffer: ResultBuffer::allocate(&[T::KIND]),
            evaluated: false,
            _marker: PhantomData,
        }
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn handle(&self) -> Handle<T> {
        Handle::new(self.buffer.id(), 0)
    }

    #[profiling::function]
    pub fn evaluate(&mut self) -> Result<Handle<T>> {
        if self.buffer.is_released() {
            return Err(Error::DanglingReference {
                buffer: self.buffer.id(),
            });
        }
        if self.evaluated {
            return Ok(self.handle());
        }

        let computed = self.op.execute()?;
        self.buffer.write_slots(0, computed.as_slots())?;
        self.evaluated = true;
        tracing::trace!(buffer = ?self.buffer.id(), op = ?self.op.kind(), "evaluated operation");

        Ok(self.handle())
    }

    /// Evaluates and reads back the result.
    pub fn resolve(&mut self) -> Result<T> {
        self.evaluate()?.resolve()
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    pub fn release(&mut self) {
        self.buffer.release();
    }
}

impl<T: Value> Evaluate for Operation<T> {
    type Output = T;

    fn handle(&self) -> Handle<T> {
        Operation::handle(self)
    }

    fn evaluate(&mut self) -> Result<Handle<T>> {
        Operation::evaluate(self)
    }

    fn is_evaluated(&self) -> bool {
        Operation::is_evaluated(self)
    }

    fn release(&mut self) {
        Operation::release(self)
    }

    fn buffer_id(&self) -> BufferId {
        self.buffer.id()
    }

    fn external_inputs(&self) -> Vec<BufferId> {
        self.op.inputs().into_iter().map(|input| input.buffer).collect()
    }
}

impl<T: Value> From<&Operation<T>> for Operand<T> {
    fn from(operation: &Operation<T>) -> Self {
        Operand::Handle(operation.handle())
    }
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("op", &self.op)
            .field("buffer", &self.buffer.id())
            .field("evaluated", &self.evaluated)
            .finish()
    }
}
