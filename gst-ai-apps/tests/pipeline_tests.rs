// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests running graphs on a real GStreamer runtime.
//!
//! Only elements of the core plugin set are used, so no hardware or vendor
//! plugin is needed. Sessions share the process's default main context and
//! are serialized through [`SESSION_LOCK`].
//!
//! # Requirements
//!
//! - GStreamer 1.x with the core elements (`fakesrc`, `tee`, `queue`,
//!   `identity`, `input-selector`, `fakesink`, `filesink`)
//! - A writable temporary directory

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use gst::prelude::*;
use gst_ai_apps::{GstBackend, MainLoopRunner};
use gstreamer as gst;
use stagegraph::{
    EXIT_DRAIN_TIMEOUT, EXIT_FAILURE, EXIT_SUCCESS, Endpoint, Error, GraphBuilder, GraphSpec,
    LifecycleConfig, launch,
};
use tracing::info;

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

/// One main loop session at a time.
static SESSION_LOCK: Mutex<()> = Mutex::new(());

/// RAII guard for test output directories.
///
/// Creates a unique directory under the system temporary directory and
/// removes it when dropped.
struct OutputDirGuard {
    dir: PathBuf,
}

impl OutputDirGuard {
    fn new(test: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "gst_ai_apps_tests_{}_{}",
            test,
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).unwrap_or_else(|_| {
            panic!("Failed to create test directory \"{}\".", dir.display())
        });
        Self { dir }
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for OutputDirGuard {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).unwrap_or_else(|_| {
            panic!("Failed to remove test directory \"{}\".", self.dir.display())
        });
    }
}

/// Initializes logging and GStreamer, and takes the session lock.
fn setup_test() -> (MainLoopRunner, MutexGuard<'static, ()>) {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_test_writer()
            .init();
    });
    let guard = SESSION_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    (MainLoopRunner::new().unwrap(), guard)
}

/// `fakesrc` producing `buffers` buffers of 16 bytes.
fn counted_source(graph: &mut GraphSpec, name: &str, buffers: i32) {
    graph
        .stage("fakesrc", name)
        .set("num-buffers", buffers)
        .set("sizetype", "fixed")
        .set("sizemax", 16);
}

/// Endless `fakesrc` timestamping 16 byte buffers at `datarate` bytes/s.
fn paced_source(graph: &mut GraphSpec, name: &str, datarate: i32) {
    graph
        .stage("fakesrc", name)
        .set("sizetype", "fixed")
        .set("sizemax", 16)
        .set("datarate", datarate);
}

/// Raises SIGINT once the main loop has run for `delay`.
fn interrupt_after(delay: Duration) {
    glib::timeout_add_local_once(delay, || {
        info!("Raising SIGINT");
        // SAFETY: raise only signals the calling process.
        unsafe { libc::raise(libc::SIGINT) };
    });
}

fn build(graph: &GraphSpec) -> Result<GstBackend, Error> {
    let mut backend = GstBackend::new(&graph.name);
    GraphBuilder::new(&mut backend).build(graph)?;
    Ok(backend)
}

#[test]
fn end_of_stream_finishes_the_session() {
    let (mut runner, _lock) = setup_test();

    let mut graph = GraphSpec::new("fan-out");
    counted_source(&mut graph, "source", 20);
    graph.stage("tee", "split");
    for branch in ["a", "b"] {
        graph.stage("queue", &format!("queue-{}", branch));
        graph.stage("fakesink", &format!("sink-{}", branch));
        graph.chain(["split".to_owned(), format!("queue-{}", branch), format!("sink-{}", branch)]);
    }
    graph.chain(["source", "split"]);

    let code = launch(&mut runner, &[graph], LifecycleConfig::default());
    assert_eq!(code, EXIT_SUCCESS);
}

#[test]
fn recording_is_written_to_disk() {
    let (mut runner, _lock) = setup_test();
    let output = OutputDirGuard::new("recording");
    let location = output.file("out.bin");

    let mut graph = GraphSpec::new("record");
    counted_source(&mut graph, "source", 10);
    graph.stage("queue", "queue0");
    graph
        .stage("filesink", "filesink")
        .set("location", location.display().to_string());
    graph.chain(["source", "queue0", "filesink"]);

    let code = launch(&mut runner, &[graph], LifecycleConfig::default());
    assert_eq!(code, EXIT_SUCCESS);

    let written = std::fs::metadata(&location).unwrap().len();
    info!("Wrote {} bytes to {}", written, location.display());
    assert_eq!(written, 160);
}

#[test]
fn every_pipeline_of_a_session_runs_to_the_end() {
    let (mut runner, _lock) = setup_test();

    let graphs: Vec<GraphSpec> = [5, 50]
        .into_iter()
        .map(|buffers| {
            let mut graph = GraphSpec::new(format!("pipeline{}", buffers));
            counted_source(&mut graph, "source", buffers);
            graph.stage("fakesink", "sink");
            graph.chain(["source", "sink"]);
            graph
        })
        .collect();

    let code = launch(&mut runner, &graphs, LifecycleConfig::default());
    assert_eq!(code, EXIT_SUCCESS);
}

#[test]
fn unreadable_input_fails_the_session() {
    let (mut runner, _lock) = setup_test();
    let output = OutputDirGuard::new("unreadable");

    let mut graph = GraphSpec::new("unreadable");
    graph
        .stage("filesrc", "source")
        .set("location", output.file("missing.mp4").display().to_string());
    graph.stage("fakesink", "sink");
    graph.chain(["source", "sink"]);

    let code = launch(&mut runner, &[graph], LifecycleConfig::default());
    assert_eq!(code, EXIT_FAILURE);
}

#[test]
fn missing_plugin_is_a_creation_error() {
    let (_runner, _lock) = setup_test();

    let mut graph = GraphSpec::new("missing");
    graph.stage("no-such-element", "source");
    graph.stage("fakesink", "sink");
    graph.chain(["source", "sink"]);

    match build(&graph) {
        Err(Error::StageCreation { name, type_id }) => {
            assert_eq!(name, "source");
            assert_eq!(type_id, "no-such-element");
        }
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[test]
fn refused_properties_are_reported() {
    let (_runner, _lock) = setup_test();

    let mut unknown = GraphSpec::new("unknown-property");
    unknown.stage("fakesink", "sink").set("no-such-property", true);

    let mut out_of_range = GraphSpec::new("out-of-range");
    out_of_range.stage("fakesrc", "source").set("num-buffers", -5);

    let mut mistyped = GraphSpec::new("mistyped");
    mistyped.stage("fakesrc", "source").set("num-buffers", "many");

    for graph in [unknown, out_of_range, mistyped] {
        match build(&graph) {
            Err(Error::Property { target, .. }) => assert_ne!(target, ""),
            other => panic!("{}: unexpected result {:?}", graph.name, other.map(|_| ())),
        }
    }
}

#[test]
fn incompatible_stages_do_not_link() {
    let (_runner, _lock) = setup_test();

    let mut graph = GraphSpec::new("incompatible");
    graph.stage("fakesrc", "first");
    graph.stage("fakesrc", "second");
    graph.chain(["first", "second"]);

    assert!(matches!(
        build(&graph),
        Err(Error::Link { upstream, downstream, .. }) if upstream == "first" && downstream == "second"
    ));
}

#[test]
fn request_pads_carry_their_properties() {
    let (_runner, _lock) = setup_test();

    let mut graph = GraphSpec::new("selector");
    counted_source(&mut graph, "first", 1);
    counted_source(&mut graph, "second", 1);
    graph.stage("input-selector", "selector");
    graph.stage("fakesink", "sink");
    graph.chain([
        Endpoint::from("first"),
        Endpoint::request("selector", "sink_%u").with_pad_property("always-ok", false),
    ]);
    graph.chain([
        Endpoint::from("second"),
        Endpoint::request("selector", "sink_%u").with_pad_property("always-ok", true),
    ]);
    graph.chain(["selector", "sink"]);

    let backend = build(&graph).unwrap();
    let selector = backend.pipeline().by_name("selector").unwrap();
    let always_ok: Vec<bool> = ["sink_0", "sink_1"]
        .iter()
        .map(|pad| selector.static_pad(pad).unwrap().property::<bool>("always-ok"))
        .collect();
    assert_eq!(always_ok, [false, true]);
}

#[test]
fn interrupt_drains_the_recording() {
    let (mut runner, _lock) = setup_test();
    let output = OutputDirGuard::new("interrupted");
    let location = output.file("out.bin");

    let mut graph = GraphSpec::new("interrupted");
    paced_source(&mut graph, "source", 1600);
    graph.stage("queue", "queue0");
    graph
        .stage("filesink", "filesink")
        .set("location", location.display().to_string())
        .set("sync", true);
    graph.chain(["source", "queue0", "filesink"]);

    interrupt_after(Duration::from_millis(300));
    let code = launch(&mut runner, &[graph], LifecycleConfig::default());
    assert_eq!(code, EXIT_SUCCESS);

    let written = std::fs::metadata(&location).unwrap().len();
    info!("Drained {} bytes to {}", written, location.display());
    assert!(written > 0);
    assert_eq!(written % 16, 0);
}

#[test]
fn stuck_drain_times_out() {
    let (mut runner, _lock) = setup_test();

    // One buffer every 16 seconds: the end-of-stream waits behind the next one.
    let mut graph = GraphSpec::new("stuck");
    paced_source(&mut graph, "source", 1);
    graph.stage("fakesink", "sink").set("sync", true);
    graph.chain(["source", "sink"]);

    interrupt_after(Duration::from_millis(300));
    let code = launch(&mut runner, &[graph], LifecycleConfig::from_cli(2000, 1));
    assert_eq!(code, EXIT_DRAIN_TIMEOUT);
}

#[test]
fn failing_pipeline_stops_the_session() {
    let (mut runner, _lock) = setup_test();

    let mut endless = GraphSpec::new("endless");
    paced_source(&mut endless, "source", 1600);
    endless.stage("fakesink", "sink").set("sync", true);
    endless.chain(["source", "sink"]);

    let mut failing = GraphSpec::new("failing");
    counted_source(&mut failing, "source", -1);
    failing.stage("identity", "identity").set("error-after", 10);
    failing.stage("fakesink", "sink");
    failing.chain(["source", "identity", "sink"]);

    let code = launch(&mut runner, &[endless, failing], LifecycleConfig::default());
    assert_eq!(code, EXIT_FAILURE);
}
