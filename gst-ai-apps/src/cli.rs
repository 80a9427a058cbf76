// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Command line: one subcommand per demo, plus `run` for saved graphs.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use stagegraph::config::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_STATE_QUERY_TIMEOUT, MAX_DRAIN_TIMEOUT_SECS,
    MAX_STATE_QUERY_TIMEOUT_MS,
};
use stagegraph::settings::require_file;
use stagegraph::{
    DisplayEnvironment, EXIT_FAILURE, EXIT_SUCCESS, Error, GraphSpec, LifecycleConfig, Result,
    launch,
};
use tracing::error;

use crate::apps::camera_encode::CameraEncodeArgs;
use crate::apps::daisychain::DaisychainArgs;
use crate::apps::jpeg_decode::JpegDecodeArgs;
use crate::apps::multi_camera::MultiCameraArgs;
use crate::apps::object_detection::ObjectDetectionArgs;
use crate::apps::parallel_inference::ParallelInferenceArgs;
use crate::apps::rotate_downscale::RotateDownscaleArgs;
use crate::apps::two_stream::TwoStreamArgs;
use crate::apps::videoplay_composition::VideoplayCompositionArgs;
use crate::runner::MainLoopRunner;

#[derive(Debug, Parser)]
#[command(
    name = "gst-ai-apps",
    version,
    about = "Camera, encode and on-device inference pipelines",
    after_help = "Ctrl+C drains the pipeline so that recordings are finalized; \
                  a second Ctrl+C stops it at once."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print the graph description as JSON and exit
    #[arg(long, global = true)]
    pub dump_graph: bool,

    /// Seconds to wait for the drain after Ctrl+C (0 waits forever)
    #[arg(
        long,
        global = true,
        env = "GST_AI_APPS_DRAIN_TIMEOUT",
        default_value_t = DEFAULT_DRAIN_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(0..=MAX_DRAIN_TIMEOUT_SECS)
    )]
    pub drain_timeout: u64,

    /// Milliseconds to wait for the pipeline state on Ctrl+C
    #[arg(
        long,
        global = true,
        env = "GST_AI_APPS_STATE_TIMEOUT",
        default_value_t = DEFAULT_STATE_QUERY_TIMEOUT.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(0..=MAX_STATE_QUERY_TIMEOUT_MS)
    )]
    pub state_timeout: u64,

    /// Leave XDG_RUNTIME_DIR and WAYLAND_DISPLAY untouched
    #[arg(long, global = true)]
    pub no_display_env: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Object detection on camera, file or RTSP input
    ObjectDetection(ObjectDetectionArgs),

    /// Record the camera to an MP4 file
    CameraEncode(CameraEncodeArgs),

    /// Record one camera stream while detecting objects on a second one
    CameraTwoStream(TwoStreamArgs),

    /// Record the camera rotated and downscaled
    CameraRotateDownscale(RotateDownscaleArgs),

    /// Detection, classification, pose and segmentation side by side
    ParallelInference(ParallelInferenceArgs),

    /// Both cameras at once
    MultiCamera(MultiCameraArgs),

    /// Pose estimation on the regions found by object detection
    DaisychainDetectionPose(DaisychainArgs),

    /// Up to 16 concurrent playbacks of one file on a grid
    VideoplayComposition(VideoplayCompositionArgs),

    /// Show numbered JPEG images
    JpegDecode(JpegDecodeArgs),

    /// Run a graph description written with --dump-graph
    Run {
        /// JSON file holding one graph or a list of graphs
        graph: PathBuf,
    },
}

impl Command {
    /// Graphs to run, after option validation.
    pub fn graphs(&self) -> Result<Vec<GraphSpec>> {
        match self {
            Command::ObjectDetection(args) => args.graph().map(|graph| vec![graph]),
            Command::CameraEncode(args) => args.graph().map(|graph| vec![graph]),
            Command::CameraTwoStream(args) => args.graph().map(|graph| vec![graph]),
            Command::CameraRotateDownscale(args) => args.graph().map(|graph| vec![graph]),
            Command::ParallelInference(args) => args.graph().map(|graph| vec![graph]),
            Command::MultiCamera(args) => args.graphs(),
            Command::DaisychainDetectionPose(args) => args.graph().map(|graph| vec![graph]),
            Command::VideoplayComposition(args) => args.graph().map(|graph| vec![graph]),
            Command::JpegDecode(args) => args.graph().map(|graph| vec![graph]),
            Command::Run { graph } => load_graphs(graph),
        }
    }
}

impl Cli {
    /// Lifecycle timing from the global flags.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig::from_cli(self.state_timeout, self.drain_timeout)
    }
}

/// Reads one graph or a list of graphs from a JSON file.
pub fn load_graphs(path: &Path) -> Result<Vec<GraphSpec>> {
    require_file(path)?;
    let text = std::fs::read_to_string(path)
        .map_err(|err| Error::config(format!("Unable to read {}: {}", path.display(), err)))?;
    if let Ok(graphs) = serde_json::from_str::<Vec<GraphSpec>>(&text) {
        return Ok(graphs);
    }
    serde_json::from_str::<GraphSpec>(&text)
        .map(|graph| vec![graph])
        .map_err(|err| {
            Error::config(format!(
                "Invalid graph description {}: {}",
                path.display(),
                err
            ))
        })
}

/// JSON form of `graphs`: an object for one graph, a list otherwise.
pub fn dump_graphs(graphs: &[GraphSpec]) -> Result<String> {
    let dumped = match graphs {
        [graph] => serde_json::to_string_pretty(graph),
        _ => serde_json::to_string_pretty(graphs),
    };
    dumped.map_err(|err| Error::Runtime(format!("Unable to serialize graph: {}", err)))
}

/// Runs the selected demo and returns the process exit code.
pub fn run(cli: &Cli) -> u8 {
    let graphs = match cli.command.graphs() {
        Ok(graphs) => graphs,
        Err(err) => {
            error!("{}", err);
            return EXIT_FAILURE;
        }
    };

    if cli.dump_graph {
        return match dump_graphs(&graphs) {
            Ok(text) => {
                println!("{}", text);
                EXIT_SUCCESS
            }
            Err(err) => {
                error!("{}", err);
                EXIT_FAILURE
            }
        };
    }

    if !cli.no_display_env {
        DisplayEnvironment::default().apply();
    }

    let mut runner = match MainLoopRunner::new() {
        Ok(runner) => runner,
        Err(err) => {
            error!("{}", err);
            return EXIT_FAILURE;
        }
    };
    launch(&mut runner, &graphs, cli.lifecycle_config())
}
