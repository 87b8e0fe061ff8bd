use crate::{
    buffer::BufferId,
    error::{Error, Result},
    handle::Handle,
    value::{Matrix, Scalar, Value, ValueKind, Vector},
};
use std::fmt::{self, Display};

/// Input to an operation: a literal value, or the handle
/// of a result produced by another operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand<T> {
    Literal(T),
    Handle(Handle<T>),
}

impl<T: Value> Operand<T> {
    pub fn resolve(&self) -> Result<T> {
        match self {
            Operand::Literal(value) => Ok(*value),
            Operand::Handle(handle) => handle.resolve(),
        }
    }

    pub fn handle(&self) -> Option<Handle<T>> {
        match self {
            Operand::Literal(_) => None,
            Operand::Handle(handle) => Some(*handle),
        }
    }

    fn input(&self) -> Option<Input> {
        self.handle().map(|handle| Input {
            buffer: handle.buffer(),
            slot: handle.slot(),
        })
    }
}

impl<T: Value> From<Handle<T>> for Operand<T> {
    fn from(handle: Handle<T>) -> Self {
        Operand::Handle(handle)
    }
}

impl From<Matrix> for Operand<Matrix> {
    fn from(value: Matrix) -> Self {
        Operand::Literal(value)
    }
}

impl From<Vector> for Operand<Vector> {
    fn from(value: Vector) -> Self {
        Operand::Literal(value)
    }
}

impl From<Scalar> for Operand<Scalar> {
    fn from(value: Scalar) -> Self {
        Operand::Literal(value)
    }
}

impl From<f32> for Operand<Scalar> {
    fn from(value: f32) -> Self {
        Operand::Literal(Scalar(value))
    }
}

/// A buffer slot read by an operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Input {
    pub buffer: BufferId,
    pub slot: u32,
}

#[derive(Debug, Clone)]
pub enum Op {
    Identity,
    Multiply(Multiply),
    Transpose(Transpose),
    Add(Add),
    Scale(Scale),
    Determinant(Determinant),
    Adjugate(Adjugate),
    DivideByDeterminant(DivideByDeterminant),
    TransformVector(TransformVector),
}

impl Op {
    pub fn inputs(&self) -> Vec<Input> {
        let inputs = match self {
            Op::Identity => vec![],
            Op::Multiply(op) => vec![op.lhs.input(), op.rhs.input()],
            Op::Transpose(op) => vec![op.input.input()],
            Op::Add(op) => vec![op.lhs.input(), op.rhs.input()],
            Op::Scale(op) => vec![op.input.input(), op.factor.input()],
            Op::Determinant(op) => vec![op.input.input()],
            Op::Adjugate(op) => vec![op.input.input()],
            Op::DivideByDeterminant(op) => vec![op.adjugate.input(), op.determinant.input()],
            Op::TransformVector(op) => vec![op.vector.input(), op.matrix.input()],
        };
        inputs.into_iter().flatten().collect()
    }

    pub fn output_kind(&self) -> ValueKind {
        match self {
            Op::Determinant(_) => ValueKind::Scalar,
            Op::TransformVector(_) => ValueKind::Vector,
            Op::Identity
            | Op::Multiply(_)
            | Op::Transpose(_)
            | Op::Add(_)
            | Op::Scale(_)
            | Op::Adjugate(_)
            | Op::DivideByDeterminant(_) => ValueKind::Matrix,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Op::Identity => OpKind::Identity,
            Op::Multiply(_) => OpKind::Multiply,
            Op::Transpose(_) => OpKind::Transpose,
            Op::Add(_) => OpKind::Add,
            Op::Scale(_) => OpKind::Scale,
            Op::Determinant(_) => OpKind::Determinant,
            Op::Adjugate(_) => OpKind::Adjugate,
            Op::DivideByDeterminant(_) => OpKind::DivideByDeterminant,
            Op::TransformVector(_) => OpKind::TransformVector,
        }
    }

    /// Resolves the operands and computes the result.
    ///
    /// Fails without side effects if an operand cannot be
    /// resolved or a determinant is too close to zero.
    pub(crate) fn execute(&self) -> Result<Computed> {
        let computed = match self {
            Op::Identity => Computed::Matrix(Matrix::IDENTITY),
            Op::Multiply(op) => {
                let lhs = op.lhs.resolve()?;
                let rhs = op.rhs.resolve()?;
                Computed::Matrix(lhs.multiply(&rhs))
            }
            Op::Transpose(op) => Computed::Matrix(op.input.resolve()?.transpose()),
            Op::Add(op) => {
                let lhs = op.lhs.resolve()?;
                let rhs = op.rhs.resolve()?;
                Computed::Matrix(lhs.add(&rhs))
            }
            Op::Scale(op) => {
                let input = op.input.resolve()?;
                let Scalar(factor) = op.factor.resolve()?;
                Computed::Matrix(input.scale(factor))
            }
            Op::Determinant(op) => {
                let determinant = op.input.resolve()?.determinant();
                if let Some(epsilon) = op.singular_epsilon {
                    check_invertible(determinant, epsilon)?;
                }
                Computed::Scalar(Scalar(determinant))
            }
            Op::Adjugate(op) => Computed::Matrix(op.input.resolve()?.adjugate()),
            Op::DivideByDeterminant(op) => {
                // Determinant first: an unusable determinant must stop
                // the step before the adjugate is touched.
                let Scalar(determinant) = op.determinant.resolve()?;
                check_invertible(determinant, op.epsilon)?;
                let adjugate = op.adjugate.resolve()?;
                Computed::Matrix(adjugate.scale(determinant.recip()))
            }
            Op::TransformVector(op) => {
                let vector = op.vector.resolve()?;
                let matrix = op.matrix.resolve()?;
                Computed::Vector(vector.transform(&matrix))
            }
        };
        debug_assert_eq!(computed.kind(), self.output_kind());
        Ok(computed)
    }

    /// Renders the operation with operands that live in `owner`
    /// shown as `$slot`.
    pub fn display(&self, owner: Option<BufferId>) -> impl Display + '_ {
        OpDisplay { op: self, owner }
    }
}

fn check_invertible(determinant: f32, epsilon: f32) -> Result<()> {
    // Written so that a NaN determinant is rejected too.
    if determinant.abs() >= epsilon {
        Ok(())
    } else {
        tracing::debug!(determinant, epsilon, "refusing to invert singular matrix");
        Err(Error::SingularMatrix {
            determinant,
            epsilon,
        })
    }
}

/// Opcode of an `Op`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Identity,
    Multiply,
    Transpose,
    Add,
    Scale,
    Determinant,
    Adjugate,
    DivideByDeterminant,
    TransformVector,
}

/// Row-major matrix product `lhs * rhs`.
#[derive(Debug, Clone)]
pub struct Multiply {
    pub lhs: Operand<Matrix>,
    pub rhs: Operand<Matrix>,
}

#[derive(Debug, Clone)]
pub struct Transpose {
    pub input: Operand<Matrix>,
}

/// Elementwise sum.
#[derive(Debug, Clone)]
pub struct Add {
    pub lhs: Operand<Matrix>,
    pub rhs: Operand<Matrix>,
}

/// Multiplies every element by a scalar.
#[derive(Debug, Clone)]
pub struct Scale {
    pub input: Operand<Matrix>,
    pub factor: Operand<Scalar>,
}

#[derive(Debug, Clone)]
pub struct Determinant {
    pub input: Operand<Matrix>,
    /// If set, the step fails with `SingularMatrix` instead of
    /// producing a determinant whose magnitude is below this value.
    pub singular_epsilon: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct Adjugate {
    pub input: Operand<Matrix>,
}

/// `adjugate / determinant`, i.e. the final step of an inversion.
#[derive(Debug, Clone)]
pub struct DivideByDeterminant {
    pub adjugate: Operand<Matrix>,
    pub determinant: Operand<Scalar>,
    pub epsilon: f32,
}

/// Row-vector product `vector * matrix`.
#[derive(Debug, Clone)]
pub struct TransformVector {
    pub vector: Operand<Vector>,
    pub matrix: Operand<Matrix>,
}

/// Output of `Op::execute`, before it is written to a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Computed {
    Scalar(Scalar),
    Vector(Vector),
    Matrix(Matrix),
}

impl Computed {
    pub fn kind(&self) -> ValueKind {
        match self {
            Computed::Scalar(_) => ValueKind::Scalar,
            Computed::Vector(_) => ValueKind::Vector,
            Computed::Matrix(_) => ValueKind::Matrix,
        }
    }

    pub fn as_slots(&self) -> &[f32] {
        match self {
            Computed::Scalar(x) => x.as_slots(),
            Computed::Vector(x) => x.as_slots(),
            Computed::Matrix(x) => x.as_slots(),
        }
    }
}

struct OpDisplay<'a> {
    op: &'a Op,
    owner: Option<BufferId>,
}

impl OpDisplay<'_> {
    fn operand<T: Value>(&self, operand: &Operand<T>) -> String {
        match operand {
            Operand::Literal(_) => "literal".to_owned(),
            Operand::Handle(handle) if Some(handle.buffer()) == self.owner => {
                format!("${}", handle.slot())
            }
            Operand::Handle(_) => "external".to_owned(),
        }
    }
}

impl Display for OpDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Op::Identity => write!(f, "identity()"),
            Op::Multiply(op) => write!(
                f,
                "multiply({}, {})",
                self.operand(&op.lhs),
                self.operand(&op.rhs)
            ),
            Op::Transpose(op) => write!(f, "transpose({})", self.operand(&op.input)),
            Op::Add(op) => write!(
                f,
                "add({}, {})",
                self.operand(&op.lhs),
                self.operand(&op.rhs)
            ),
            Op::Scale(op) => write!(
                f,
                "scale({}, {})",
                self.operand(&op.input),
                self.operand(&op.factor)
            ),
            Op::Determinant(op) => write!(f, "determinant({})", self.operand(&op.input)),
            Op::Adjugate(op) => write!(f, "adjugate({})", self.operand(&op.input)),
            Op::DivideByDeterminant(op) => write!(
                f,
                "divide({}, {})",
                self.operand(&op.adjugate),
                self.operand(&op.determinant)
            ),
            Op::TransformVector(op) => write!(
                f,
                "transform({}, {})",
                self.operand(&op.vector),
                self.operand(&op.matrix)
            ),
        }
    }
}
