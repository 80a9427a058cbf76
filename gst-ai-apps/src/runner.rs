// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! The GLib main loop that drives every pipeline of a session.
//!
//! All handlers run on the thread that called [`Runner::run`]: one SIGINT
//! source shared by every pipeline, one bus watch per pipeline, and one drain
//! timer per pipeline that entered the draining state. The loop quits once
//! every controller is finished. A pipeline failure stops the other pipelines
//! of the session without draining them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gst::prelude::*;
use gstreamer as gst;
use stagegraph::{
    BusEvent, Controller, Error, GraphSpec, LifecycleState, Outcome, Result, Runner,
};
use tracing::{debug, info, warn};

use crate::backend::{GstBackend, GstPipeline};

type SharedController = Rc<RefCell<Controller<GstPipeline>>>;

/// Pending drain timeout of one controller.
struct DrainTimer {
    source: glib::SourceId,
    fired: Rc<Cell<bool>>,
}

type DrainTimers = Rc<RefCell<Vec<DrainTimer>>>;

/// [`Runner`] on GStreamer and a GLib main loop.
#[derive(Debug)]
pub struct MainLoopRunner {
    _private: (),
}

impl MainLoopRunner {
    /// Initializes GStreamer.
    pub fn new() -> Result<Self> {
        gst::init()
            .map_err(|err| Error::Runtime(format!("Unable to initialize GStreamer: {}", err)))?;
        Ok(MainLoopRunner { _private: () })
    }
}

impl Runner for MainLoopRunner {
    type Backend = GstBackend;
    type Pipeline = GstPipeline;

    fn backend(&mut self, spec: &GraphSpec) -> Result<GstBackend> {
        Ok(GstBackend::new(&spec.name))
    }

    fn pipeline(&mut self, backend: GstBackend) -> GstPipeline {
        backend.into_pipeline()
    }

    fn run(&mut self, controllers: Vec<Controller<GstPipeline>>) -> Result<Vec<Outcome>> {
        let main_loop = glib::MainLoop::new(None, false);
        let controllers: Vec<SharedController> = controllers
            .into_iter()
            .map(|controller| Rc::new(RefCell::new(controller)))
            .collect();

        let mut bus_watches = Vec::with_capacity(controllers.len());
        for controller in &controllers {
            let bus = controller.borrow().pipeline().bus()?;
            let name = controller.borrow().name().to_owned();
            let own = Rc::clone(controller);
            let all = controllers.clone();
            let main_loop = main_loop.clone();
            let guard = bus
                .add_watch_local(move |_, msg| {
                    if let Some(event) = bus_event(msg) {
                        own.borrow_mut().handle_event(&event);
                        abort_after_failure(&own, &all);
                        quit_when_finished(&all, &main_loop);
                    }
                    glib::ControlFlow::Continue
                })
                .map_err(|err| Error::Runtime(format!("Unable to watch the bus of {}: {}", name, err)))?;
            bus_watches.push(guard);
        }

        let drain_timers: DrainTimers = Rc::default();
        let sigint = {
            let controllers = controllers.clone();
            let main_loop = main_loop.clone();
            let drain_timers = Rc::clone(&drain_timers);
            glib::unix_signal_add_local(libc::SIGINT, move || {
                info!("Interrupt received");
                for controller in &controllers {
                    let before = controller.borrow().state();
                    controller.borrow_mut().handle_interrupt();
                    let after = controller.borrow().state();
                    if before != LifecycleState::Draining && after == LifecycleState::Draining {
                        if let Some(timer) = arm_drain_timer(controller, &controllers, &main_loop)
                        {
                            drain_timers.borrow_mut().push(timer);
                        }
                    }
                }
                quit_when_finished(&controllers, &main_loop);
                glib::ControlFlow::Continue
            })
        };

        if !all_finished(&controllers) {
            debug!("Entering main loop with {} pipelines", controllers.len());
            main_loop.run();
        }

        sigint.remove();
        drop(bus_watches);
        for timer in drain_timers.take() {
            if !timer.fired.get() {
                timer.source.remove();
            }
        }

        controllers
            .iter()
            .map(|controller| {
                let controller = controller.borrow();
                controller.outcome().cloned().ok_or_else(|| {
                    Error::Lifecycle(format!(
                        "{} left the main loop while {}",
                        controller.name(),
                        controller.state()
                    ))
                })
            })
            .collect()
    }
}

fn arm_drain_timer(
    controller: &SharedController,
    controllers: &[SharedController],
    main_loop: &glib::MainLoop,
) -> Option<DrainTimer> {
    let timeout = controller.borrow().drain_timeout()?;
    debug!("{}: draining for at most {:?}", controller.borrow().name(), timeout);
    let own = Rc::clone(controller);
    let all = controllers.to_vec();
    let main_loop = main_loop.clone();
    let fired = Rc::new(Cell::new(false));
    let source = {
        let fired = Rc::clone(&fired);
        glib::timeout_add_local_once(timeout, move || {
            fired.set(true);
            own.borrow_mut().handle_drain_timeout();
            quit_when_finished(&all, &main_loop);
        })
    };
    Some(DrainTimer { source, fired })
}

/// Stops every other controller once `failed` finished with a failure.
fn abort_after_failure(failed: &SharedController, controllers: &[SharedController]) {
    let name = {
        let failed = failed.borrow();
        if !failed.outcome().is_some_and(Outcome::is_failure) {
            return;
        }
        failed.name().to_owned()
    };
    let peers = controllers
        .iter()
        .filter(|peer| !Rc::ptr_eq(*peer, failed) && !peer.borrow().is_finished());
    for peer in peers {
        warn!("Stopping {} after {} failed", peer.borrow().name(), name);
        peer.borrow_mut().abort(&name);
    }
}

fn all_finished(controllers: &[SharedController]) -> bool {
    controllers
        .iter()
        .all(|controller| controller.borrow().is_finished())
}

fn quit_when_finished(controllers: &[SharedController], main_loop: &glib::MainLoop) {
    if all_finished(controllers) {
        main_loop.quit();
    }
}

/// Maps a bus message to the event the controller reacts to.
fn bus_event(msg: &gst::Message) -> Option<BusEvent> {
    use gst::MessageView;

    let source = || {
        msg.src()
            .map(|src| src.path_string().to_string())
            .unwrap_or_else(|| "unknown".to_owned())
    };

    match msg.view() {
        MessageView::Eos(..) => Some(BusEvent::EndOfStream),
        MessageView::Error(err) => Some(BusEvent::Error {
            source: source(),
            message: err.error().to_string(),
            debug: err.debug().map(|debug| debug.to_string()),
        }),
        MessageView::Warning(warning) => Some(BusEvent::Warning {
            source: source(),
            message: warning.error().to_string(),
        }),
        MessageView::StateChanged(change) => {
            if msg.src().is_some_and(|src| src.is::<gst::Pipeline>()) {
                debug!(
                    "{} changed state {:?} -> {:?}",
                    source(),
                    change.old(),
                    change.current()
                );
            }
            None
        }
        _ => None,
    }
}
