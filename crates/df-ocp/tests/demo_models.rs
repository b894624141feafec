use std::path::PathBuf;

use df_ocp::{OcpError, SolveStep, SymbolicOcp, VariableKind};

fn demo_path(model: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop();
    path.pop();
    path.join("demos")
        .join("fritzson")
        .join(format!("precompiled_{}.xml", model))
}

fn load(model: &str) -> SymbolicOcp {
    df_ocp::load(&demo_path(model)).unwrap_or_else(|e| panic!("Failed to load {}: {}", model, e))
}

#[test]
fn all_demos_load_and_become_explicit() {
    let models = [
        "BasicVolumeMassConservation",
        "BasicVolumeEnergyConservation",
        "BasicVolumeTest",
        "CtrlFlowSystem",
    ];
    for model in models {
        let ocp = load(model);
        assert_eq!(ocp.name(), model);
        let explicit = ocp
            .make_explicit()
            .unwrap_or_else(|e| panic!("Failed to make {} explicit: {}", model, e));

        // every der(x) and algebraic variable is the target of exactly one step
        let form = explicit.ode().unwrap();
        let targets: Vec<String> = form
            .steps
            .iter()
            .flat_map(|s| s.targets().iter().map(|t| t.to_string()))
            .collect();
        assert_eq!(targets.len(), ocp.xd().len() + ocp.z().len());
        for id in ocp.xd() {
            let der = format!("der({})", ocp.var(*id).name);
            assert_eq!(targets.iter().filter(|t| **t == der).count(), 1, "{}", der);
        }
    }
}

#[test]
fn mass_conservation_classification() {
    let ocp = load("BasicVolumeMassConservation");
    let names = |ids: &[df_core::VarId]| -> Vec<String> {
        ids.iter().map(|id| ocp.var(*id).name.clone()).collect()
    };
    assert_eq!(names(ocp.xd()), vec!["m"]);
    assert_eq!(names(ocp.z()), vec!["P", "V", "T", "mdot_in"]);
    assert_eq!(names(ocp.p()), vec!["R"]);
    assert_eq!(ocp.start_values(), vec![0.00119]);
    assert_eq!(ocp.variable("P").unwrap().unit.as_deref(), Some("Pa"));
    assert!(matches!(
        ocp.variable("Q"),
        Err(OcpError::NameNotFound { .. })
    ));
}

#[test]
fn binding_equation_defines_dependent_parameter() {
    let ocp = load("BasicVolumeTest");
    assert_eq!(
        ocp.variable("dV_0").unwrap().kind,
        VariableKind::DependentParameter
    );
    let values = ocp.parameter_values().unwrap();
    let k = ocp
        .p()
        .iter()
        .position(|id| ocp.var(*id).name == "dV_0")
        .unwrap();
    assert!((values[k] - 0.1 * 0.00119).abs() < 1e-18);
}

#[test]
fn valve_and_pipe_form_a_linear_block() {
    let explicit = load("CtrlFlowSystem").make_explicit().unwrap();
    let form = explicit.ode().unwrap();
    assert!(explicit.xd().is_empty());
    assert_eq!(form.coupled_equations(), 2);
    let linear = form
        .steps
        .iter()
        .find(|s| matches!(s, SolveStep::Linear { .. }))
        .unwrap();
    let mut targets: Vec<String> = linear.targets().iter().map(|t| t.to_string()).collect();
    targets.sort();
    assert_eq!(targets, vec!["P_mid", "mdot"]);
    // opening is solved before the block that reads it
    assert_eq!(form.steps[0].targets()[0].to_string(), "opening");
}

#[test]
fn loading_a_missing_file_is_an_io_error() {
    let err = df_ocp::load(&demo_path("NoSuchModel")).unwrap_err();
    assert!(matches!(err, OcpError::Io { .. }));
}

#[test]
fn printed_ocp_lists_explicit_program() {
    let explicit = load("BasicVolumeMassConservation")
        .make_explicit()
        .unwrap();
    let text = explicit.to_string();
    assert!(text.contains("Model: BasicVolumeMassConservation"));
    assert!(text.contains("Differential states (1):"));
    assert!(text.contains("der(m) := mdot_in"), "{}", text);
}

mod proptests {
    use df_ocp::affine::{decompose, isolate};
    use df_ocp::{Expr, Symbol};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn isolated_derivative_solves_the_residual(
            c in prop::sample::select(vec![-3.0, -0.5, 0.25, 2.0, 7.0]),
            r in -100.0f64..100.0,
            x in -10.0f64..10.0,
        ) {
            // c*der(x) + r*x = 0
            let e = Expr::Add(
                Box::new(Expr::Mul(Box::new(Expr::Const(c)), Box::new(Expr::der("x")))),
                Box::new(Expr::Mul(Box::new(Expr::Const(r)), Box::new(Expr::var("x")))),
            );
            let is_der = |s: &Symbol| matches!(s, Symbol::Der(_));
            let affine = decompose(&e, &is_der).unwrap();
            let sol = isolate(&affine, &Symbol::der("x")).unwrap();
            let dx = sol.eval(&|_: &Symbol| x);
            let residual = e.eval(&|s: &Symbol| match s {
                Symbol::Der(_) => dx,
                _ => x,
            });
            prop_assert!(residual.abs() <= 1e-9 * (1.0 + (r * x).abs()));
        }
    }
}
