// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Log output of a complete session.
//!
//! Kept in its own test binary: `traced_test` installs a global subscriber
//! and the session needs the default main context to itself.

use gst_ai_apps::MainLoopRunner;
use stagegraph::{EXIT_SUCCESS, GraphSpec, LifecycleConfig, launch};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn session_reports_construction_and_exit_code() {
    let mut runner = MainLoopRunner::new().unwrap();

    let mut graph = GraphSpec::new("logged");
    graph.stage("fakesrc", "source").set("num-buffers", 3);
    graph.stage("fakesink", "sink");
    graph.chain(["source", "sink"]);

    let code = launch(&mut runner, &[graph], LifecycleConfig::default());

    assert_eq!(code, EXIT_SUCCESS);
    assert!(logs_contain("Built graph logged"));
    assert!(logs_contain("logged: end of stream"));
    assert!(logs_contain("Session finished with exit code 0"));
}
