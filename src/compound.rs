use crate::{
    buffer::{BufferId, ResultBuffer},
    error::{Error, Result},
    handle::Handle,
    operation::Evaluate,
    opgraph::op::{Op, Operand},
    value::{Matrix, Value},
};
use std::{fmt, marker::PhantomData};

/// An ordered sequence of operations evaluated as one unit.
///
/// Every step writes to its own slot of a single buffer owned by the
/// compound. Step `i` may read slots written by steps before it, or
/// handles from outside the compound. Only the last step's slot is
/// exposed through [`handle`](Self::handle).
pub struct CompoundOperation<T = Matrix> {
    buffer: ResultBuffer,
    steps: Vec<Step>,
    /// Number of leading steps whose results have been written.
    completed: usize,
    _marker: PhantomData<fn() -> T>,
}

#[derive(Debug, Clone)]
struct Step {
    op: Op,
    slot: u32,
}

impl<T: Value> CompoundOperation<T> {
    pub fn builder() -> CompoundBuilder {
        CompoundBuilder::new()
    }

    pub fn handle(&self) -> Handle<T> {
        Handle::new(self.buffer.id(), self.result_slot())
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn completed_steps(&self) -> usize {
        self.completed
    }

    pub fn ops(&self) -> impl Iterator<Item = &Op> + '_ {
        self.steps.iter().map(|step| &step.op)
    }

    /// Runs the remaining steps strictly in order.
    ///
    /// A failing step stops the sequence: its slot and all later slots stay
    /// unwritten, so no partial result is ever exposed. Calling `evaluate`
    /// again resumes at the failed step.
    #[profiling::function]
    pub fn evaluate(&mut self) -> Result<Handle<T>> {
        if self.buffer.is_released() {
            return Err(Error::DanglingReference {
                buffer: self.buffer.id(),
            });
        }

        while let Some(step) = self.steps.get(self.completed) {
            let computed = step.op.execute().inspect_err(|err| {
                tracing::debug!(
                    buffer = ?self.buffer.id(),
                    step = self.completed,
                    %err,
                    "compound step failed"
                );
            })?;
            self.buffer.write_slots(step.slot, computed.as_slots())?;
            tracing::trace!(
                buffer = ?self.buffer.id(),
                step = self.completed,
                op = ?step.op.kind(),
                "evaluated compound step"
            );
            self.completed += 1;
        }

        Ok(self.handle())
    }

    /// Evaluates and reads back the result.
    pub fn resolve(&mut self) -> Result<T> {
        self.evaluate()?.resolve()
    }

    pub fn is_evaluated(&self) -> bool {
        self.completed == self.steps.len()
    }

    /// Releases the buffer backing every step, including intermediates.
    pub fn release(&mut self) {
        self.buffer.release();
    }

    fn result_slot(&self) -> u32 {
        self.steps
            .last()
            .expect("compound operation has at least one step")
            .slot
    }
}

impl<T: Value> Evaluate for CompoundOperation<T> {
    type Output = T;

    fn handle(&self) -> Handle<T> {
        CompoundOperation::handle(self)
    }

    fn evaluate(&mut self) -> Result<Handle<T>> {
        CompoundOperation::evaluate(self)
    }

    fn is_evaluated(&self) -> bool {
        CompoundOperation::is_evaluated(self)
    }

    fn release(&mut self) {
        CompoundOperation::release(self)
    }

    fn buffer_id(&self) -> BufferId {
        self.buffer.id()
    }

    fn external_inputs(&self) -> Vec<BufferId> {
        let own = self.buffer.id();
        self.steps
            .iter()
            .flat_map(|step| step.op.inputs())
            .map(|input| input.buffer)
            .filter(|&buffer| buffer != own)
            .collect()
    }
}

impl<T: Value> From<&CompoundOperation<T>> for Operand<T> {
    fn from(operation: &CompoundOperation<T>) -> Self {
        Operand::Handle(operation.handle())
    }
}

impl<T> fmt::Display for CompoundOperation<T> {
    /// One line per step, e.g. `$2 = divide($1, $0)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "${} = {}",
                step.slot,
                step.op.display(Some(self.buffer.id()))
            )?;
        }
        Ok(())
    }
}

impl<T> fmt::Debug for CompoundOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompoundOperation")
            .field("buffer", &self.buffer.id())
            .field("steps", &self.steps)
            .field("completed", &self.completed)
            .finish()
    }
}

/// Builds a [`CompoundOperation`] step by step.
///
/// Each pushed step gets a fresh slot in the compound's buffer and
/// returns a handle to it that later steps can consume.
#[derive(Debug)]
pub struct CompoundBuilder {
    buffer: ResultBuffer,
    steps: Vec<Step>,
}

impl Default for CompoundBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CompoundBuilder {
    pub fn new() -> Self {
        Self {
            buffer: ResultBuffer::allocate(&[]),
            steps: Vec::new(),
        }
    }

    /// Appends a step producing a `U`.
    ///
    /// # Panics
    /// Panics if `op` does not produce a `U`, or if it reads a slot of
    /// this compound that no earlier step writes.
    pub fn push<U: Value>(&mut self, op: Op) -> Handle<U> {
        assert_eq!(
            op.output_kind(),
            U::KIND,
            "{:?} does not produce a {:?}",
            op.kind(),
            U::KIND
        );
        let own = self.buffer.id();
        let next_slot = self.steps.len() as u32;
        for input in op.inputs() {
            assert!(
                input.buffer != own || input.slot < next_slot,
                "step {next_slot} reads slot {} before it is written",
                input.slot
            );
        }

        let slot = self
            .buffer
            .push_slot(U::KIND)
            .expect("builder buffer is never released before finish()");
        debug_assert_eq!(slot, next_slot);
        self.steps.push(Step { op, slot });
        Handle::new(own, slot)
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    /// # Panics
    /// Panics if no steps were pushed or the last step does not produce a `T`.
    pub fn finish<T: Value>(self) -> CompoundOperation<T> {
        let last = self
            .steps
            .last()
            .expect("compound operation must have at least one step");
        assert_eq!(
            last.op.output_kind(),
            T::KIND,
            "last step of a compound producing {:?} yields {:?}",
            T::KIND,
            last.op.output_kind()
        );
        CompoundOperation {
            buffer: self.buffer,
            steps: self.steps,
            completed: 0,
            _marker: PhantomData,
        }
    }
}
