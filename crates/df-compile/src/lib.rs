//! df-compile: Modelica source to model description XML.
//!
//! The compiler itself is an external program. Which program to use, or
//! whether to fall back to precompiled XML artifacts, is decided once by
//! [`CompilerSetting::resolve`]; the resulting [`CompilerMode`] is fixed for
//! the lifetime of a [`ModelCompiler`].

pub mod compiler;
pub mod error;
pub mod mode;

pub use compiler::{ModelCompiler, output_file_name, validate_model_name};
pub use error::{CompileError, CompileResult};
pub use mode::{CompilerMode, CompilerSetting, SettingKind, find_in_path};
