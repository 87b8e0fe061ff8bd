use crate::{
    buffer::BufferId,
    error::Result,
    handle::Handle,
    operation::Evaluate,
};
use ahash::AHashMap;
use slotmap::{SecondaryMap, SlotMap};

pub mod op;

slotmap::new_key_type! {
    pub struct NodeId;
}

/// Owns a set of operations and evaluates them in dependency order.
///
/// Nodes may be pushed in any order as long as every node they read
/// from is pushed before `evaluate` is called. Inputs produced outside
/// the graph must already be evaluated. Dropping the graph releases
/// the buffers of every node.
#[derive(Default)]
pub struct OpGraph {
    nodes: SlotMap<NodeId, Box<dyn Node>>,
    /// Maps each node's result buffer to the node owning it.
    producers: AHashMap<BufferId, NodeId>,
    order: Vec<NodeId>,
}

impl OpGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of an operation, returning the handle
    /// its result will be written to.
    pub fn push<E>(&mut self, node: E) -> Handle<E::Output>
    where
        E: Evaluate + 'static,
    {
        let handle = node.handle();
        let buffer = node.buffer_id();
        let id = self.nodes.insert(Box::new(node));
        self.producers.insert(buffer, id);
        self.order.push(id);
        handle
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Evaluates every node after the nodes producing its inputs,
    /// stopping at the first failure.
    ///
    /// Nodes that read each other's results form a cycle. The edge that
    /// closes it is ignored, so the node reached first fails with
    /// `UnevaluatedHandle` unless its inputs were evaluated beforehand.
    #[profiling::function]
    pub fn evaluate(&mut self) -> Result<()> {
        let mut state = SecondaryMap::new();
        for id in self.order.clone() {
            self.visit(id, &mut state)?;
        }
        tracing::debug!(nodes = self.nodes.len(), "evaluated op graph");
        Ok(())
    }

    /// Depth-first walk from `root` with an explicit stack, so long
    /// chains do not grow the call stack.
    fn visit(&mut self, root: NodeId, state: &mut SecondaryMap<NodeId, Visit>) -> Result<()> {
        let mut stack = vec![Task::Expand(root)];
        while let Some(task) = stack.pop() {
            match task {
                Task::Expand(id) => {
                    if state.contains_key(id) {
                        continue;
                    }
                    state.insert(id, Visit::InProgress);
                    stack.push(Task::Evaluate(id));
                    for buffer in self.nodes[id].external_inputs() {
                        let Some(&dependency) = self.producers.get(&buffer) else {
                            continue;
                        };
                        match state.get(dependency) {
                            None => stack.push(Task::Expand(dependency)),
                            Some(Visit::InProgress) => {
                                tracing::debug!(
                                    node = ?id,
                                    ?dependency,
                                    "skipping op graph cycle edge"
                                );
                            }
                            Some(Visit::Done) => {}
                        }
                    }
                }
                Task::Evaluate(id) => {
                    self.nodes[id].evaluate_erased()?;
                    state.insert(id, Visit::Done);
                }
            }
        }
        Ok(())
    }

    /// Releases every node's buffer. Outstanding handles become dangling.
    pub fn release(&mut self) {
        for node in self.nodes.values_mut() {
            node.release_erased();
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum Task {
    Expand(NodeId),
    Evaluate(NodeId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Object-safe view of an `Evaluate` implementation.
trait Node {
    fn evaluate_erased(&mut self) -> Result<()>;
    fn release_erased(&mut self);
    fn external_inputs(&self) -> Vec<BufferId>;
}

impl<E: Evaluate> Node for E {
    fn evaluate_erased(&mut self) -> Result<()> {
        self.evaluate().map(|_| ())
    }

    fn release_erased(&mut self) {
        self.release();
    }

    fn external_inputs(&self) -> Vec<BufferId> {
        Evaluate::external_inputs(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compound::CompoundBuilder,
        error::Error,
        opgraph::op::{Multiply, Op, Transpose},
        ops::MatrixOps,
        value::{Matrix, Scalar},
    };

    #[test]
    fn evaluates_in_dependency_order() {
        let mut graph = OpGraph::new();
        let m = Matrix::IDENTITY.scale(2.0);

        let determinant = MatrixOps::determinant(m);
        let scaled = MatrixOps::scale(m, &determinant);
        let inverse = MatrixOps::inverse(&scaled);

        // Pushed in reverse: the graph still evaluates producers first.
        let result = graph.push(inverse);
        let scaled = graph.push(scaled);
        let determinant = graph.push(determinant);
        assert_eq!(graph.num_nodes(), 3);

        graph.evaluate().unwrap();
        assert_eq!(determinant.resolve().unwrap(), Scalar(16.0));
        assert_eq!(scaled.resolve().unwrap(), Matrix::IDENTITY.scale(32.0));
        assert_eq!(
            result.resolve().unwrap(),
            Matrix::IDENTITY.scale(1.0 / 32.0)
        );
    }

    #[test]
    fn dropping_graph_releases_buffers() {
        let mut graph = OpGraph::new();
        let identity = graph.push(MatrixOps::identity());
        graph.evaluate().unwrap();
        assert!(identity.is_alive());

        drop(graph);
        assert_eq!(
            identity.resolve(),
            Err(Error::DanglingReference {
                buffer: identity.buffer()
            })
        );
    }

    #[test]
    fn first_failure_stops_evaluation() {
        let mut graph = OpGraph::new();
        let singular = graph.push(MatrixOps::inverse(Matrix::IDENTITY.scale(0.0)));
        let product = graph.push(MatrixOps::multiply(singular, Matrix::IDENTITY));

        assert!(matches!(
            graph.evaluate(),
            Err(Error::SingularMatrix { .. })
        ));
        assert!(matches!(
            product.resolve(),
            Err(Error::UnevaluatedHandle { .. })
        ));

        graph.release();
        graph.release();
        assert!(!product.is_alive());
    }

    #[test]
    fn long_chain_pushed_in_reverse() {
        const LEN: usize = 20_000;
        let mut chain = vec![MatrixOps::identity()];
        for _ in 1..LEN {
            let next = MatrixOps::multiply(chain.last().unwrap(), Matrix::IDENTITY.scale(1.0));
            chain.push(next);
        }

        let mut graph = OpGraph::new();
        let handles: Vec<_> = chain.into_iter().rev().map(|op| graph.push(op)).collect();
        graph.evaluate().unwrap();

        assert_eq!(handles[0].resolve().unwrap(), Matrix::IDENTITY);
        assert_eq!(handles[LEN - 1].resolve().unwrap(), Matrix::IDENTITY);
    }

    #[test]
    fn cycle_between_compounds_is_an_error() {
        let mut first = CompoundBuilder::new();
        let a0 = first.push::<Matrix>(Op::Identity);
        let mut second = CompoundBuilder::new();
        let b0 = second.push::<Matrix>(Op::Transpose(Transpose { input: a0.into() }));
        first.push::<Matrix>(Op::Multiply(Multiply {
            lhs: a0.into(),
            rhs: b0.into(),
        }));

        let mut graph = OpGraph::new();
        let product = graph.push(first.finish::<Matrix>());
        graph.push(second.finish::<Matrix>());

        assert_eq!(
            graph.evaluate(),
            Err(Error::UnevaluatedHandle {
                buffer: a0.buffer(),
                slot: 0
            })
        );
        assert!(matches!(
            product.resolve(),
            Err(Error::UnevaluatedHandle { .. })
        ));
    }
}
