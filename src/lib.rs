//! Deferred 4x4 linear algebra.
//!
//! Computations are recorded as [`Operation`]s and [`CompoundOperation`]s
//! by the [`MatrixOps`] and [`VectorOps`] factories. Nothing is computed until
//! `evaluate()` is called; results are written into a [`ResultBuffer`] owned by
//! the operation and read back through copyable [`Handle`]s.

extern crate self as lazymath;

pub mod buffer;
pub mod compound;
pub mod config;
pub mod error;
pub mod handle;
pub mod operation;
pub mod opgraph;
mod ops;
pub mod value;

#[doc(inline)]
pub use self::{
    buffer::{BufferId, ResultBuffer},
    compound::{CompoundBuilder, CompoundOperation},
    config::EvalConfig,
    error::{ConfigError, Error, Result},
    handle::{resolve, Handle},
    operation::{Evaluate, Operation},
    opgraph::{
        op::{Op, OpKind, Operand},
        OpGraph,
    },
    ops::{MatrixOps, VectorOps},
    value::{Matrix, Scalar, Value, ValueKind, Vector},
};
#[doc(inline)]
pub use lazymath_macros::Value;
