//! Integrator and output-function construction from an explicit OCP.

use std::sync::Arc;

use df_ocp::SymbolicOcp;
use tracing::debug;

use crate::dae::DaeFunction;
use crate::error::SimResult;
use crate::integrator::{Integrator, IntegratorOptions};
use crate::output::OutputFunctionFactory;

/// Compile `ocp` and wrap it in an integrator and an output factory that
/// share the same [`DaeFunction`].
pub fn build(
    ocp: &SymbolicOcp,
    options: &IntegratorOptions,
) -> SimResult<(Integrator, OutputFunctionFactory)> {
    let dae = Arc::new(DaeFunction::new(ocp)?);
    debug!(
        model = dae.model(),
        states = dae.layout().nx,
        parameters = dae.layout().np,
        algebraic = dae.layout().nz,
        method = options.method.label(),
        "built DAE function"
    );
    let integrator = Integrator::new(Arc::clone(&dae), options.clone())?;
    Ok((integrator, OutputFunctionFactory::new(dae)))
}
