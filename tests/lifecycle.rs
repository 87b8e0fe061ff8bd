use lazymath::{
    buffer,
    opgraph::op::{Adjugate, DivideByDeterminant, Op},
    CompoundBuilder, Error, Evaluate, Handle, Matrix, MatrixOps, OpGraph, ResultBuffer, ValueKind,
};

/// Two identical rows, so the determinant is exactly zero.
const SINGULAR: Matrix = Matrix::from_rows([
    [1.0, 2.0, 3.0, 4.0],
    [1.0, 2.0, 3.0, 4.0],
    [5.0, 6.0, 7.0, 9.0],
    [2.0, 0.0, 1.0, 3.0],
]);

const M: Matrix = Matrix::from_rows([
    [2.0, 0.0, 1.0, 0.0],
    [0.0, 3.0, 0.0, 0.0],
    [1.0, 0.0, 2.0, 0.0],
    [0.0, 1.0, 0.0, 1.0],
]);

#[test]
fn singular_matrix_is_rejected() {
    let mut inverse = MatrixOps::inverse(SINGULAR);
    let handle = inverse.handle();

    assert_eq!(
        inverse.evaluate(),
        Err(Error::SingularMatrix {
            determinant: 0.0,
            epsilon: 1e-6
        })
    );
    // Determinant step failed, so nothing after it ran.
    assert_eq!(inverse.completed_steps(), 0);
    assert!(!inverse.is_evaluated());
    assert_eq!(
        handle.resolve(),
        Err(Error::UnevaluatedHandle {
            buffer: handle.buffer(),
            slot: 2
        })
    );

    // Retrying fails the same way.
    assert!(matches!(
        inverse.evaluate(),
        Err(Error::SingularMatrix { .. })
    ));
}

#[test]
fn handle_outliving_operation_is_dangling() {
    let handle = {
        let mut identity = MatrixOps::identity();
        identity.evaluate().unwrap()
    };
    assert!(!handle.is_alive());
    assert_eq!(
        handle.resolve(),
        Err(Error::DanglingReference {
            buffer: handle.buffer()
        })
    );
}

#[test]
fn handle_outliving_compound_is_dangling() {
    let mut inverse = MatrixOps::inverse(M);
    let handle = inverse.evaluate().unwrap();
    assert!(handle.resolve().is_ok());

    drop(inverse);
    assert_eq!(
        handle.resolve(),
        Err(Error::DanglingReference {
            buffer: handle.buffer()
        })
    );
}

#[test]
fn consumer_of_released_operand_fails() {
    let mut identity = MatrixOps::identity();
    identity.evaluate().unwrap();
    let mut product = MatrixOps::multiply(&identity, M);
    let released = identity.handle().buffer();

    identity.release();
    assert_eq!(
        product.evaluate(),
        Err(Error::DanglingReference { buffer: released })
    );
    assert!(!product.is_evaluated());
}

#[test]
fn release_twice_then_drop() {
    let mut identity = MatrixOps::identity();
    let handle = identity.evaluate().unwrap();

    identity.release();
    identity.release();
    Evaluate::release(&mut identity);
    assert!(!buffer::is_live(handle.buffer()));
    drop(identity);

    let mut raw = ResultBuffer::allocate(&[ValueKind::Matrix]);
    raw.release();
    raw.release();
    assert!(raw.is_released());
}

#[test]
fn discarding_unevaluated_graph_releases_buffers() {
    let mut handles: Vec<Handle<Matrix>> = Vec::new();
    {
        let mut graph = OpGraph::new();
        let a = graph.push(MatrixOps::multiply(M, M));
        handles.push(a);
        handles.push(graph.push(MatrixOps::inverse(a)));
        assert!(handles.iter().all(Handle::is_alive));
    }
    assert!(handles.iter().all(|handle| !handle.is_alive()));
}

#[test]
fn divide_step_needs_determinant() {
    // Inversion with the determinant step left out: the determinant
    // comes from an operation that was never evaluated.
    let determinant = MatrixOps::determinant(M);

    let mut builder = CompoundBuilder::new();
    let adjugate = builder.push::<Matrix>(Op::Adjugate(Adjugate { input: M.into() }));
    builder.push::<Matrix>(Op::DivideByDeterminant(DivideByDeterminant {
        adjugate: adjugate.into(),
        determinant: (&determinant).into(),
        epsilon: 1e-6,
    }));
    let mut inverse = builder.finish::<Matrix>();

    assert_eq!(
        inverse.evaluate(),
        Err(Error::UnevaluatedHandle {
            buffer: determinant.handle().buffer(),
            slot: 0
        })
    );
    assert_eq!(inverse.completed_steps(), 1);
    assert!(matches!(
        inverse.handle().resolve(),
        Err(Error::UnevaluatedHandle { slot: 1, .. })
    ));
}

#[test]
fn divide_step_rejects_released_determinant() {
    let mut determinant = MatrixOps::determinant(M);
    determinant.evaluate().unwrap();

    let mut builder = CompoundBuilder::new();
    let adjugate = builder.push::<Matrix>(Op::Adjugate(Adjugate { input: M.into() }));
    builder.push::<Matrix>(Op::DivideByDeterminant(DivideByDeterminant {
        adjugate: adjugate.into(),
        determinant: (&determinant).into(),
        epsilon: 1e-6,
    }));
    let mut inverse = builder.finish::<Matrix>();

    let released = determinant.handle().buffer();
    drop(determinant);
    assert_eq!(
        inverse.evaluate(),
        Err(Error::DanglingReference { buffer: released })
    );
    assert!(!inverse.is_evaluated());
}
