// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Build, start and run one or more graphs, and turn the result into an
//! exit code.

use tracing::{error, info};

use crate::builder::{Backend, GraphBuilder};
use crate::config::LifecycleConfig;
use crate::error::Result;
use crate::graph::GraphSpec;
use crate::lifecycle::{Controller, EXIT_FAILURE, Outcome, PipelineControl};

/// A media runtime plus the event loop that drives its pipelines.
pub trait Runner {
    /// Construction side of one pipeline.
    type Backend: Backend;

    /// Control side of one pipeline.
    type Pipeline: PipelineControl;

    /// Creates an empty pipeline for `spec`.
    fn backend(&mut self, spec: &GraphSpec) -> Result<Self::Backend>;

    /// Turns a fully built backend into its control handle.
    fn pipeline(&mut self, backend: Self::Backend) -> Self::Pipeline;

    /// Wires the interrupt, bus and drain handlers and blocks until every
    /// controller is finished. Controllers are already started.
    fn run(&mut self, controllers: Vec<Controller<Self::Pipeline>>) -> Result<Vec<Outcome>>;
}

/// Builds every graph of `specs`, starts them and runs `runner` until they
/// are all finished. Returns the process exit code.
///
/// Any configuration, construction or link error ends the session with
/// [`EXIT_FAILURE`] before the event loop is entered.
pub fn launch<R: Runner>(runner: &mut R, specs: &[GraphSpec], config: LifecycleConfig) -> u8 {
    match run_session(runner, specs, config) {
        Ok(outcomes) => {
            let code = Outcome::combined_exit_code(&outcomes);
            info!("Session finished with exit code {}", code);
            code
        }
        Err(err) => {
            error!("{}", err);
            EXIT_FAILURE
        }
    }
}

fn run_session<R: Runner>(
    runner: &mut R,
    specs: &[GraphSpec],
    config: LifecycleConfig,
) -> Result<Vec<Outcome>> {
    let mut controllers = Vec::with_capacity(specs.len());
    for spec in specs {
        let mut backend = runner.backend(spec)?;
        GraphBuilder::new(&mut backend).build(spec)?;
        let pipeline = runner.pipeline(backend);
        controllers.push(Controller::new(spec.name.clone(), pipeline, config));
    }

    for index in 0..controllers.len() {
        if let Err(err) = controllers[index].start() {
            for started in &controllers[..index] {
                started.pipeline().stop();
            }
            return Err(err);
        }
    }

    runner.run(controllers)
}
