// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Run/stop state machine of one pipeline.
//!
//! ```text
//!            start              interrupt (EOS injected)
//! Stopped ---------> Playing ---------------------------> Draining
//!                       |                                    |
//!                       | EOS / error / refused interrupt    | EOS / error / timeout / interrupt
//!                       v                                    v
//!                    Finished <------------------------------+
//! ```
//!
//! The controller is driven from a single event loop: the interrupt handler,
//! the bus watch and the drain timer all call into it on the same thread.
//! `Finished` is terminal; later events are ignored.

use std::fmt;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::LifecycleConfig;
use crate::error::{Error, Result};

/// Exit code for a clean end of stream.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for any error.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code when the drain did not complete in time.
pub const EXIT_DRAIN_TIMEOUT: u8 = 124;
/// Exit code for a hard stop on interrupt (128 + SIGINT).
pub const EXIT_INTERRUPTED: u8 = 130;

/// Pipeline operations the controller needs.
pub trait PipelineControl {
    /// Requests the playing state.
    fn start(&self) -> Result<()>;

    /// Whether the pipeline is playing, waiting at most `timeout`.
    fn is_playing(&self, timeout: Duration) -> bool;

    /// Injects an end-of-stream event at the sources. Returns false when the
    /// pipeline refused it.
    fn send_eos(&self) -> bool;

    /// Brings the pipeline down.
    fn stop(&self);
}

/// Position in the run/stop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built, not started.
    Stopped,
    /// Running.
    Playing,
    /// End-of-stream injected after an interrupt, waiting for it to reach
    /// the sinks.
    Draining,
    /// Done. Terminal.
    Finished,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Playing => "playing",
            LifecycleState::Draining => "draining",
            LifecycleState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Interrupted, drained cleanly.
    Drained,
    /// The input ended on its own.
    EndOfStream,
    /// Interrupted without a drain.
    Interrupted,
    /// Interrupted, but the drain did not finish in time.
    DrainTimedOut,
    /// The runtime reported an error.
    Failed {
        /// Stage that posted the error.
        source: String,
        /// Error message.
        message: String,
        /// Debug details, if any.
        debug: Option<String>,
    },
    /// Stopped because another pipeline of the session failed.
    Aborted {
        /// Name of the pipeline that failed.
        cause: String,
    },
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Drained | Outcome::EndOfStream => EXIT_SUCCESS,
            Outcome::Interrupted => EXIT_INTERRUPTED,
            Outcome::DrainTimedOut => EXIT_DRAIN_TIMEOUT,
            Outcome::Failed { .. } | Outcome::Aborted { .. } => EXIT_FAILURE,
        }
    }

    /// True for outcomes that end the whole session.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    fn severity(&self) -> u8 {
        match self {
            Outcome::Drained | Outcome::EndOfStream => 0,
            Outcome::Interrupted => 1,
            Outcome::DrainTimedOut => 2,
            Outcome::Aborted { .. } => 3,
            Outcome::Failed { .. } => 4,
        }
    }

    /// Exit code of a process that ran several pipelines: the code of the
    /// most severe outcome.
    pub fn combined_exit_code<'a>(outcomes: impl IntoIterator<Item = &'a Outcome>) -> u8 {
        outcomes
            .into_iter()
            .max_by_key(|outcome| outcome.severity())
            .map_or(EXIT_SUCCESS, Outcome::exit_code)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Drained => f.write_str("drained"),
            Outcome::EndOfStream => f.write_str("end of stream"),
            Outcome::Interrupted => f.write_str("interrupted"),
            Outcome::DrainTimedOut => f.write_str("drain timed out"),
            Outcome::Failed {
                source, message, ..
            } => write!(f, "failed: {}: {}", source, message),
            Outcome::Aborted { cause } => write!(f, "aborted after {} failed", cause),
        }
    }
}

/// Bus notifications the controller reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// End-of-stream reached every sink.
    EndOfStream,
    /// Unrecoverable error.
    Error {
        /// Stage that posted the error.
        source: String,
        /// Error message.
        message: String,
        /// Debug details, if any.
        debug: Option<String>,
    },
    /// Non-fatal warning, logged only.
    Warning {
        /// Stage that posted the warning.
        source: String,
        /// Warning message.
        message: String,
    },
}

/// What the event loop should do after a controller call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Keep running.
    Continue,
    /// This controller is finished.
    Quit,
}

/// Owns the lifecycle of one pipeline.
#[derive(Debug)]
pub struct Controller<P> {
    name: String,
    pipeline: P,
    config: LifecycleConfig,
    state: LifecycleState,
    drain_requested: bool,
    outcome: Option<Outcome>,
}

impl<P: PipelineControl> Controller<P> {
    /// Creates a controller in the `Stopped` state.
    pub fn new(name: impl Into<String>, pipeline: P, config: LifecycleConfig) -> Self {
        Controller {
            name: name.into(),
            pipeline,
            config: config.bounded(),
            state: LifecycleState::Stopped,
            drain_requested: false,
            outcome: None,
        }
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The controlled pipeline.
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// How the run ended, once `Finished`.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// True once `Finished`.
    pub fn is_finished(&self) -> bool {
        self.state == LifecycleState::Finished
    }

    /// How long a drain may take.
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.config.drain_timeout
    }

    /// Stopped → Playing.
    pub fn start(&mut self) -> Result<()> {
        if self.state != LifecycleState::Stopped {
            return Err(Error::Lifecycle(format!(
                "{} cannot start while {}",
                self.name, self.state
            )));
        }
        if let Err(err) = self.pipeline.start() {
            self.finish(Outcome::Failed {
                source: self.name.clone(),
                message: err.to_string(),
                debug: None,
            });
            return Err(err);
        }
        info!("{}: playing", self.name);
        self.state = LifecycleState::Playing;
        Ok(())
    }

    /// Handles an interrupt request.
    ///
    /// The first interrupt of a playing pipeline injects one end-of-stream
    /// and starts the drain. Any other interrupt stops the pipeline at once.
    pub fn handle_interrupt(&mut self) -> LoopAction {
        match self.state {
            LifecycleState::Finished => return LoopAction::Quit,
            LifecycleState::Stopped => {
                info!("{}: interrupted before start", self.name);
                self.finish(Outcome::Interrupted);
            }
            LifecycleState::Draining => {
                info!("{}: interrupted while draining, stopping", self.name);
                self.finish(Outcome::Interrupted);
            }
            LifecycleState::Playing if self.drain_requested => {
                self.finish(Outcome::Interrupted);
            }
            LifecycleState::Playing => {
                if !self.pipeline.is_playing(self.config.state_query_timeout) {
                    info!("{}: interrupted, pipeline not playing, stopping", self.name);
                    self.finish(Outcome::Interrupted);
                } else {
                    self.drain_requested = true;
                    if self.pipeline.send_eos() {
                        info!("{}: interrupted, draining", self.name);
                        self.state = LifecycleState::Draining;
                    } else {
                        warn!("{}: end-of-stream refused, stopping", self.name);
                        self.finish(Outcome::Interrupted);
                    }
                }
            }
        }
        self.action()
    }

    /// Handles a bus notification.
    pub fn handle_event(&mut self, event: &BusEvent) -> LoopAction {
        if self.is_finished() {
            return LoopAction::Quit;
        }
        match event {
            BusEvent::EndOfStream => {
                if self.state == LifecycleState::Draining {
                    info!("{}: drained", self.name);
                    self.finish(Outcome::Drained);
                } else {
                    info!("{}: end of stream", self.name);
                    self.finish(Outcome::EndOfStream);
                }
            }
            BusEvent::Error {
                source,
                message,
                debug: detail,
            } => {
                error!(
                    "{}: error from {}: {} ({})",
                    self.name,
                    source,
                    message,
                    detail.as_deref().unwrap_or("no debug info")
                );
                self.finish(Outcome::Failed {
                    source: source.clone(),
                    message: message.clone(),
                    debug: detail.clone(),
                });
            }
            BusEvent::Warning { source, message } => {
                warn!("{}: warning from {}: {}", self.name, source, message);
            }
        }
        self.action()
    }

    /// Stops the pipeline because `cause`, another pipeline of the same
    /// session, failed. No drain.
    pub fn abort(&mut self, cause: &str) -> LoopAction {
        if !self.is_finished() {
            warn!("{}: stopping, {} failed", self.name, cause);
            self.finish(Outcome::Aborted {
                cause: cause.to_owned(),
            });
        }
        self.action()
    }

    /// Handles expiry of the drain timer.
    pub fn handle_drain_timeout(&mut self) -> LoopAction {
        if self.state == LifecycleState::Draining {
            warn!("{}: drain timed out, stopping", self.name);
            self.finish(Outcome::DrainTimedOut);
        }
        self.action()
    }

    fn action(&self) -> LoopAction {
        if self.is_finished() {
            LoopAction::Quit
        } else {
            LoopAction::Continue
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        if self.is_finished() {
            return;
        }
        info!("{}: finished ({})", self.name, outcome);
        self.pipeline.stop();
        self.state = LifecycleState::Finished;
        self.outcome = Some(outcome);
    }
}
