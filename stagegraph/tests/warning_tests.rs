// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Diagnostics that must show up in the logs.
//!
//! Kept in a separate test binary: `traced_test` installs its own global
//! subscriber.

mod common;

use common::{Call, FakeBackend, FakePipeline};
use stagegraph::{
    BusEvent, Controller, Dispatch, DynamicLinks, GraphBuilder, GraphSpec, LifecycleConfig,
    LifecycleState,
};
use tracing_test::traced_test;

/// A pad announced by a producer nobody registered is dropped with a warning.
#[test]
#[traced_test]
fn unregistered_producer_pad_is_dropped_with_warning() {
    let mut links = DynamicLinks::new();
    links.register("demux", "video", "parse".into());

    assert_eq!(links.dispatch("rtspsrc", "recv_rtp_src_0_1_96"), Dispatch::Unregistered);
    assert!(logs_contain("unregistered producer rtspsrc"));
    assert!(!links.is_complete());
}

/// Every dynamic producer with routes is watched, and only those.
#[test]
#[traced_test]
fn every_routed_producer_is_watched() {
    let mut graph = GraphSpec::new("two-files");
    for index in 0..2 {
        graph.stage("filesrc", &format!("filesrc{}", index));
        graph.stage("qtdemux", &format!("demux{}", index));
        graph.stage("h264parse", &format!("parse{}", index));
        graph.stage("fakesink", &format!("sink{}", index));
        graph.chain([
            format!("filesrc{}", index),
            format!("demux{}", index),
            format!("parse{}", index),
            format!("sink{}", index),
        ]);
    }
    graph.stage("qtdemux", "unused_demux");

    let mut backend = FakeBackend::new();
    GraphBuilder::new(&mut backend).build(&graph).unwrap();

    let watched: Vec<_> = backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Watch(name) => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(watched, vec!["demux0".to_owned(), "demux1".to_owned()]);
    assert!(logs_contain("Watching demux0 for new pads"));
}

/// Bus warnings are logged and do not change the state.
#[test]
#[traced_test]
fn bus_warnings_are_logged() {
    let mut controller = Controller::new("cam", FakePipeline::playing(), LifecycleConfig::default());
    controller.start().unwrap();
    controller.handle_event(&BusEvent::Warning {
        source: "display".into(),
        message: "A lot of buffers are being dropped".into(),
    });

    assert_eq!(controller.state(), LifecycleState::Playing);
    assert!(logs_contain("warning from display"));
}
