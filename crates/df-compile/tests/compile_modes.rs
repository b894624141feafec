use std::path::PathBuf;

use df_compile::{CompileError, CompilerMode, CompilerSetting, ModelCompiler, SettingKind};

fn demos_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop();
    path.pop();
    path.join("demos").join("fritzson")
}

fn source() -> PathBuf {
    demos_dir().join("thermodynamics_example.mo")
}

fn work_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("df_compile_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn precompiled_fallback_copies_bytes() {
    let dir = work_dir("fallback");
    let setting = CompilerSetting {
        kind: SettingKind::Precompiled,
        ..Default::default()
    };
    let compiler = ModelCompiler::new(setting.resolve().unwrap(), &dir);

    let out = compiler
        .compile("BasicVolumeMassConservation", &source())
        .unwrap();
    assert_eq!(out, dir.join("BasicVolumeMassConservation.xml"));

    let original =
        std::fs::read(demos_dir().join("precompiled_BasicVolumeMassConservation.xml")).unwrap();
    let copied = std::fs::read(&out).unwrap();
    assert_eq!(original, copied);
}

#[test]
fn missing_artifact_is_configuration_error() {
    let compiler = ModelCompiler::new(
        CompilerMode::Precompiled {
            dir: Some(demos_dir()),
        },
        work_dir("missing"),
    );
    let err = compiler.compile("NoSuchModel", &source()).unwrap_err();
    assert!(matches!(err, CompileError::Configuration { .. }), "{}", err);
}

#[test]
fn missing_source_is_configuration_error() {
    let compiler = ModelCompiler::new(CompilerMode::Precompiled { dir: None }, work_dir("nosrc"));
    let err = compiler
        .compile("BasicVolumeTest", &demos_dir().join("missing.mo"))
        .unwrap_err();
    assert!(matches!(err, CompileError::Configuration { .. }));
}

#[test]
fn invalid_model_name_is_rejected_before_any_work() {
    let compiler = ModelCompiler::new(CompilerMode::Precompiled { dir: None }, work_dir("badname"));
    let err = compiler.compile("not a model", &source()).unwrap_err();
    assert!(matches!(err, CompileError::InvalidModelName { .. }));
}

#[cfg(unix)]
#[test]
fn toolchain_output_is_used() {
    let dir = work_dir("toolchain");
    let artifact = demos_dir().join("precompiled_CtrlFlowSystem.xml");
    let compiler = ModelCompiler::new(
        CompilerMode::Toolchain {
            program: PathBuf::from("sh"),
            args: vec![
                "-c".to_string(),
                format!("cp '{}' '{{output}}'", artifact.display()),
            ],
        },
        &dir,
    );
    let out = compiler.compile("CtrlFlowSystem", &source()).unwrap();
    assert_eq!(out, dir.join("CtrlFlowSystem.xml"));
    assert_eq!(std::fs::read(&out).unwrap(), std::fs::read(&artifact).unwrap());
}

#[cfg(unix)]
#[test]
fn toolchain_failure_carries_stderr() {
    let compiler = ModelCompiler::new(
        CompilerMode::Toolchain {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "echo 'no model {model}' >&2; exit 3".to_string()],
        },
        work_dir("toolfail"),
    );
    let err = compiler.compile("Pkg.M", &source()).unwrap_err();
    match err {
        CompileError::Toolchain { model, message } => {
            assert_eq!(model, "Pkg.M");
            assert!(message.contains("no model Pkg.M"), "{}", message);
        }
        other => panic!("expected toolchain error, got {}", other),
    }
}

#[cfg(unix)]
#[test]
fn toolchain_without_output_file_fails() {
    let compiler = ModelCompiler::new(
        CompilerMode::Toolchain {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "true".to_string()],
        },
        work_dir("nooutput"),
    );
    let err = compiler.compile("M", &source()).unwrap_err();
    assert!(err.to_string().contains("did not produce"));
}
