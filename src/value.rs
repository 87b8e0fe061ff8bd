use bytemuck::{Pod, Zeroable};
use lazymath_macros::Value;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, slice};

/// Kind of value stored in a result buffer slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Scalar,
    Vector,
    Matrix,
}

impl ValueKind {
    /// Number of `f32` values occupied by a value of this kind.
    pub const fn width(self) -> usize {
        match self {
            ValueKind::Scalar => 1,
            ValueKind::Vector => 4,
            ValueKind::Matrix => 16,
        }
    }
}

/// A fixed-size numeric aggregate that can live in a result buffer slot.
///
/// Implement with `#[derive(Value)]`, which also checks at compile time
/// that the type's size matches the width of its kind.
pub trait Value: Pod + Debug + PartialEq + Send + Sync + 'static {
    const KIND: ValueKind;

    fn as_slots(&self) -> &[f32] {
        bytemuck::cast_slice(slice::from_ref(self))
    }

    /// # Panics
    /// Panics if `slots.len()` does not equal `Self::KIND.width()`.
    fn from_slots(slots: &[f32]) -> Self {
        assert_eq!(
            slots.len(),
            Self::KIND.width(),
            "slot width mismatch for {:?}",
            Self::KIND
        );
        bytemuck::pod_read_unaligned(bytemuck::cast_slice(slots))
    }
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, PartialOrd, Pod, Zeroable, Value, Serialize, Deserialize,
)]
#[value(kind = "scalar")]
#[repr(transparent)]
pub struct Scalar(pub f32);

impl From<f32> for Scalar {
    fn from(value: f32) -> Self {
        Self(value)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Value, Serialize, Deserialize)]
#[value(kind = "vector")]
#[repr(C)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vector {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Row-vector product `self * matrix`.
    pub fn transform(self, matrix: &Matrix) -> Self {
        let v = [self.x, self.y, self.z, self.w];
        let mut out = [0.0f32; 4];
        for (col, out) in out.iter_mut().enumerate() {
            *out = (0..4).map(|k| v[k] * matrix.rows[k][col]).sum();
        }
        Self::new(out[0], out[1], out[2], out[3])
    }
}

/// Row-major 4x4 matrix.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable, Value, Serialize, Deserialize)]
#[value(kind = "matrix")]
#[repr(C)]
pub struct Matrix {
    pub rows: [[f32; 4]; 4],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self::from_rows([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    pub const fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self { rows }
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.rows[row][col]
    }

    /// The 16 elements in row-major order.
    pub fn as_slice(&self) -> &[f32] {
        self.as_slots()
    }

    /// Composition `self * rhs`. Not commutative.
    pub fn multiply(&self, rhs: &Matrix) -> Matrix {
        let mut rows = [[0.0f32; 4]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, out) in row.iter_mut().enumerate() {
                *out = (0..4).map(|k| self.rows[i][k] * rhs.rows[k][j]).sum();
            }
        }
        Matrix { rows }
    }

    pub fn transpose(&self) -> Matrix {
        let mut rows = [[0.0f32; 4]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, out) in row.iter_mut().enumerate() {
                *out = self.rows[j][i];
            }
        }
        Matrix { rows }
    }

    pub fn add(&self, rhs: &Matrix) -> Matrix {
        self.zip_map(rhs, |a, b| a + b)
    }

    pub fn scale(&self, factor: f32) -> Matrix {
        self.map(|x| x * factor)
    }

    pub fn determinant(&self) -> f32 {
        let m = Minors::new(self);
        m.s0 * m.c5 - m.s1 * m.c4 + m.s2 * m.c3 + m.s3 * m.c2 - m.s4 * m.c1 + m.s5 * m.c0
    }

    /// Transpose of the cofactor matrix, so that
    /// `self.adjugate() * self == self.determinant() * I`.
    pub fn adjugate(&self) -> Matrix {
        let m = Minors::new(self);
        let [[a00, a01, a02, a03], [a10, a11, a12, a13], [a20, a21, a22, a23], [a30, a31, a32, a33]] =
            self.rows;
        let Minors {
            s0,
            s1,
            s2,
            s3,
            s4,
            s5,
            c0,
            c1,
            c2,
            c3,
            c4,
            c5,
        } = m;

        Matrix::from_rows([
            [
                a11 * c5 - a12 * c4 + a13 * c3,
                -a01 * c5 + a02 * c4 - a03 * c3,
                a31 * s5 - a32 * s4 + a33 * s3,
                -a21 * s5 + a22 * s4 - a23 * s3,
            ],
            [
                -a10 * c5 + a12 * c2 - a13 * c1,
                a00 * c5 - a02 * c2 + a03 * c1,
                -a30 * s5 + a32 * s2 - a33 * s1,
                a20 * s5 - a22 * s2 + a23 * s1,
            ],
            [
                a10 * c4 - a11 * c2 + a13 * c0,
                -a00 * c4 + a01 * c2 - a03 * c0,
                a30 * s4 - a31 * s2 + a33 * s0,
                -a20 * s4 + a21 * s2 - a23 * s0,
            ],
            [
                -a10 * c3 + a11 * c1 - a12 * c0,
                a00 * c3 - a01 * c1 + a02 * c0,
                -a30 * s3 + a31 * s1 - a32 * s0,
                a20 * s3 - a21 * s1 + a22 * s0,
            ],
        ])
    }

    fn map(&self, f: impl Fn(f32) -> f32) -> Matrix {
        Matrix {
            rows: self.rows.map(|row| row.map(&f)),
        }
    }

    fn zip_map(&self, rhs: &Matrix, f: impl Fn(f32, f32) -> f32) -> Matrix {
        let mut rows = self.rows;
        for (row, rhs_row) in rows.iter_mut().zip(&rhs.rows) {
            for (x, y) in row.iter_mut().zip(rhs_row) {
                *x = f(*x, *y);
            }
        }
        Matrix { rows }
    }
}

/// 2x2 minors of the top two rows (`s*`) and bottom two rows (`c*`),
/// shared by the determinant and adjugate expansions.
#[derive(Copy, Clone)]
struct Minors {
    s0: f32,
    s1: f32,
    s2: f32,
    s3: f32,
    s4: f32,
    s5: f32,
    c0: f32,
    c1: f32,
    c2: f32,
    c3: f32,
    c4: f32,
    c5: f32,
}

impl Minors {
    fn new(m: &Matrix) -> Self {
        let [[a00, a01, a02, a03], [a10, a11, a12, a13], [a20, a21, a22, a23], [a30, a31, a32, a33]] =
            m.rows;
        Self {
            s0: a00 * a11 - a10 * a01,
            s1: a00 * a12 - a10 * a02,
            s2: a00 * a13 - a10 * a03,
            s3: a01 * a12 - a11 * a02,
            s4: a01 * a13 - a11 * a03,
            s5: a02 * a13 - a12 * a03,
            c0: a20 * a31 - a30 * a21,
            c1: a20 * a32 - a30 * a22,
            c2: a20 * a33 - a30 * a23,
            c3: a21 * a32 - a31 * a22,
            c4: a21 * a33 - a31 * a23,
            c5: a22 * a33 - a32 * a23,
        }
    }
}
