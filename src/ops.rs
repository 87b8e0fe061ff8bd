use crate::{
    compound::{CompoundBuilder, CompoundOperation},
    config::EvalConfig,
    operation::Operation,
    opgraph::op::{
        self, Adjugate, Determinant, DivideByDeterminant, Multiply, Op, Operand, Scale,
        TransformVector, Transpose,
    },
    value::{Matrix, Scalar, Vector},
};

/// Builds matrix operations. Nothing is computed until the
/// returned operation is evaluated.
///
/// Every operand accepts a literal value, a `Handle`, or a reference
/// to a previously built operation.
#[derive(Debug, Clone, Copy)]
pub struct MatrixOps;

impl MatrixOps {
    /// Row-major composition `value1 * value2`. Operand order matters.
    pub fn multiply(
        value1: impl Into<Operand<Matrix>>,
        value2: impl Into<Operand<Matrix>>,
    ) -> Operation<Matrix> {
        Operation::new(Op::Multiply(Multiply {
            lhs: value1.into(),
            rhs: value2.into(),
        }))
    }

    pub fn identity() -> Operation<Matrix> {
        Operation::new(Op::Identity)
    }

    /// Inverts a matrix using the default [`EvalConfig`].
    pub fn inverse(matrix: impl Into<Operand<Matrix>>) -> CompoundOperation {
        Self::inverse_with(matrix, &EvalConfig::default())
    }

    /// Inverts a matrix as three steps: determinant, adjugate, and
    /// adjugate divided by determinant.
    ///
    /// Evaluation fails with `SingularMatrix` at the determinant step if
    /// its magnitude is below `config.singular_epsilon`.
    pub fn inverse_with(
        matrix: impl Into<Operand<Matrix>>,
        config: &EvalConfig,
    ) -> CompoundOperation {
        let matrix = matrix.into();
        let mut builder = CompoundBuilder::new();
        let determinant = builder.push::<Scalar>(Op::Determinant(Determinant {
            input: matrix,
            singular_epsilon: Some(config.singular_epsilon),
        }));
        let adjugate = builder.push::<Matrix>(Op::Adjugate(Adjugate { input: matrix }));
        builder.push::<Matrix>(Op::DivideByDeterminant(DivideByDeterminant {
            adjugate: adjugate.into(),
            determinant: determinant.into(),
            epsilon: config.singular_epsilon,
        }));
        builder.finish()
    }

    pub fn transpose(matrix: impl Into<Operand<Matrix>>) -> Operation<Matrix> {
        Operation::new(Op::Transpose(Transpose {
            input: matrix.into(),
        }))
    }

    pub fn add(
        value1: impl Into<Operand<Matrix>>,
        value2: impl Into<Operand<Matrix>>,
    ) -> Operation<Matrix> {
        Operation::new(Op::Add(op::Add {
            lhs: value1.into(),
            rhs: value2.into(),
        }))
    }

    pub fn scale(
        matrix: impl Into<Operand<Matrix>>,
        factor: impl Into<Operand<Scalar>>,
    ) -> Operation<Matrix> {
        Operation::new(Op::Scale(Scale {
            input: matrix.into(),
            factor: factor.into(),
        }))
    }

    pub fn determinant(matrix: impl Into<Operand<Matrix>>) -> Operation<Scalar> {
        Operation::new(Op::Determinant(Determinant {
            input: matrix.into(),
            singular_epsilon: None,
        }))
    }
}

/// Builds vector operations.
#[derive(Debug, Clone, Copy)]
pub struct VectorOps;

impl VectorOps {
    /// Row-vector product `vector * matrix`.
    pub fn transform(
        vector: impl Into<Operand<Vector>>,
        matrix: impl Into<Operand<Matrix>>,
    ) -> Operation<Vector> {
        Operation::new(Op::TransformVector(TransformVector {
            vector: vector.into(),
            matrix: matrix.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_abs_diff_eq;

    #[test]
    fn inverse_is_three_steps() {
        let inverse = MatrixOps::inverse(Matrix::IDENTITY);
        assert_eq!(inverse.num_steps(), 3);
        insta::assert_snapshot!(inverse.to_string(), @r"
        $0 = determinant(literal)
        $1 = adjugate(literal)
        $2 = divide($1, $0)
        ");
    }

    #[test]
    fn inverse_of_scaled_identity() {
        let mut inverse = MatrixOps::inverse(Matrix::IDENTITY.scale(4.0));
        let result = inverse.resolve().unwrap();
        assert_abs_diff_eq!(
            result.as_slice(),
            Matrix::IDENTITY.scale(0.25).as_slice(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn configured_epsilon_applies() {
        let config = EvalConfig {
            singular_epsilon: 0.5,
        };
        let mut inverse = MatrixOps::inverse_with(Matrix::IDENTITY.scale(0.5), &config);
        assert_eq!(
            inverse.evaluate(),
            Err(Error::SingularMatrix {
                determinant: 0.0625,
                epsilon: 0.5
            })
        );
    }

    #[test]
    fn scale_by_computed_determinant() {
        let m = Matrix::IDENTITY.scale(2.0);
        let mut determinant = MatrixOps::determinant(m);
        let mut scaled = MatrixOps::scale(Matrix::IDENTITY, &determinant);
        determinant.evaluate().unwrap();
        assert_eq!(scaled.resolve().unwrap(), Matrix::IDENTITY.scale(16.0));
    }

    #[test]
    fn add_and_transpose() {
        let upper = Matrix::from_rows([
            [0.0, 1.0, 2.0, 3.0],
            [0.0, 0.0, 4.0, 5.0],
            [0.0, 0.0, 0.0, 6.0],
            [0.0, 0.0, 0.0, 0.0],
        ]);
        let mut transposed = MatrixOps::transpose(upper);
        transposed.evaluate().unwrap();
        let mut symmetric = MatrixOps::add(upper, &transposed);
        let result = symmetric.resolve().unwrap();
        assert_eq!(result, result.transpose());
        assert_eq!(result.get(3, 0), 3.0);
    }

    #[test]
    fn transform_vector() {
        let mut transform = VectorOps::transform(
            Vector::new(1.0, 2.0, 3.0, 1.0),
            Matrix::IDENTITY.scale(2.0),
        );
        assert_eq!(
            transform.resolve().unwrap(),
            Vector::new(2.0, 4.0, 6.0, 2.0)
        );
    }
}
