//! Failure reporting and fixed-step accuracy on hand-built models.

use df_ocp::{DeclaredVariable, Expr, SymbolicOcp};
use df_sim::{IntegratorOptions, Method, SimError, Simulator, build};

/// der(x) = x^2, x(0) = 1: finite-time blow-up at t = 1.
fn blow_up() -> SymbolicOcp {
    SymbolicOcp::new(
        "BlowUp",
        vec![DeclaredVariable {
            name: "x".into(),
            start: Some(1.0),
            ..Default::default()
        }],
        vec![],
        vec![Expr::Sub(
            Box::new(Expr::der("x")),
            Box::new(Expr::Pow(Box::new(Expr::var("x")), Box::new(Expr::Const(2.0)))),
        )],
    )
    .unwrap()
    .make_explicit()
    .unwrap()
}

#[test]
fn blow_up_reports_last_good_index_and_partial_rows() {
    let (integrator, factory) = build(&blow_up(), &IntegratorOptions::default()).unwrap();
    let grid = df_core::linspace(0.0, 2.0, 21).unwrap();
    let mut sim = Simulator::new(integrator, factory.output(&["x"]).unwrap(), grid).unwrap();

    let failure = match sim.run(None) {
        Err(SimError::Integration(failure)) => failure,
        other => panic!("expected integration failure, got {:?}", other.map(|r| r.t)),
    };
    assert_eq!(failure.last_good_index, 9);
    assert!(failure.t_failed >= 0.9 && failure.t_failed <= 1.0);
    assert_eq!(failure.partial.n_rows(), 10);
    assert_eq!(failure.partial.t.len(), 10);
    // x = 1/(1 - t) on the rows that made it
    let x = failure.partial.column("x").unwrap();
    assert!((x[5] - 2.0).abs() < 1e-4);
}

#[test]
fn fixed_step_budget_is_enforced() {
    let options = IntegratorOptions {
        method: Method::Rk4,
        max_step: Some(1e-3),
        max_steps_per_interval: 10,
        ..Default::default()
    };
    let (integrator, factory) = build(&blow_up(), &options).unwrap();
    let mut sim =
        Simulator::new(integrator, factory.output(&["x"]).unwrap(), vec![0.0, 0.5]).unwrap();
    match sim.run(None) {
        Err(SimError::Integration(failure)) => {
            assert_eq!(failure.last_good_index, 0);
            assert!(failure.reason.contains("max_steps_per_interval"));
        }
        other => panic!("expected integration failure, got {:?}", other.map(|r| r.t)),
    }
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// der(x) = -k*x
    fn decay(k: f64) -> SymbolicOcp {
        SymbolicOcp::new(
            "Decay",
            vec![
                DeclaredVariable {
                    name: "x".into(),
                    start: Some(1.0),
                    ..Default::default()
                },
                DeclaredVariable {
                    name: "k".into(),
                    kind: Some(df_ocp::VariableKind::Parameter),
                    start: Some(k),
                    ..Default::default()
                },
            ],
            vec![],
            vec![Expr::Add(
                Box::new(Expr::der("x")),
                Box::new(Expr::Mul(Box::new(Expr::var("k")), Box::new(Expr::var("x")))),
            )],
        )
        .unwrap()
        .make_explicit()
        .unwrap()
    }

    proptest! {
        #[test]
        fn rk4_matches_exponential_decay(k in 0.1f64..2.0) {
            let options = IntegratorOptions {
                method: Method::Rk4,
                max_step: Some(0.01),
                ..Default::default()
            };
            let (integrator, factory) = build(&decay(k), &options).unwrap();
            let grid = df_core::linspace(0.0, 1.0, 11).unwrap();
            let mut sim =
                Simulator::new(integrator, factory.output(&["x"]).unwrap(), grid.clone()).unwrap();
            let record = sim.run(None).unwrap();
            for (r, t) in grid.iter().enumerate() {
                prop_assert!((record.values[(r, 0)] - (-k * t).exp()).abs() < 1e-8);
            }
        }
    }
}
