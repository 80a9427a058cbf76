// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Concurrent playback of one file, up to sixteen times, composed on the
//! display.

use std::path::PathBuf;

use clap::Args;
use stagegraph::settings::require_file;
use stagegraph::{Endpoint, GraphSpec, PropertyValue, Result};

use super::IO_MODE_DMABUF;

/// Size of each tile.
pub const TILE: (i32, i32) = (480, 270);

/// Tile origins in stream order. The first eight fill two columns, the rest
/// two more columns to the right.
pub const POSITIONS: [(i32, i32); 16] = [
    (0, 0),
    (480, 0),
    (480, 270),
    (0, 270),
    (480, 540),
    (0, 540),
    (480, 810),
    (0, 810),
    (960, 0),
    (1440, 0),
    (960, 270),
    (1440, 270),
    (960, 540),
    (1440, 540),
    (960, 810),
    (1440, 810),
];

/// Options of the `videoplay-composition` demo.
#[derive(Debug, Clone, Args)]
pub struct VideoplayCompositionArgs {
    /// Input video file
    #[arg(short, long)]
    pub infile: PathBuf,

    /// Number of concurrent streams
    #[arg(short = 'c', long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub stream_count: u8,
}

impl VideoplayCompositionArgs {
    /// Validates the options and describes the pipeline.
    pub fn graph(&self) -> Result<GraphSpec> {
        require_file(&self.infile)?;

        let mut graph = GraphSpec::new("videoplay-composition");
        graph.stage("qtivcomposer", "composer");
        graph.stage("queue", "outqueue");
        graph
            .stage("waylandsink", "display")
            .set("enable-last-sample", false)
            .set("fullscreen", true);

        for (index, (x, y)) in POSITIONS
            .iter()
            .take(usize::from(self.stream_count))
            .enumerate()
        {
            let names = ["source", "demux", "queue", "parse", "decoder", "deccaps"]
                .map(|stage| format!("{}{}", stage, index));
            let [source, demux, queue, parse, decoder, deccaps] = &names;

            graph
                .stage("filesrc", source)
                .set("location", self.infile.display().to_string());
            graph.stage("qtdemux", demux);
            graph.stage("queue", queue);
            graph.stage("h264parse", parse);
            graph
                .stage("v4l2h264dec", decoder)
                .set("capture-io-mode", IO_MODE_DMABUF)
                .set("output-io-mode", IO_MODE_DMABUF);
            graph
                .stage("capsfilter", deccaps)
                .set("caps", PropertyValue::caps("video/x-raw,format=NV12"));

            let mut chain: Vec<Endpoint> = names.iter().map(Endpoint::from).collect();
            chain.push(
                Endpoint::request("composer", "sink_%u")
                    .with_pad_property("position", PropertyValue::Point { x: *x, y: *y })
                    .with_pad_property(
                        "dimensions",
                        PropertyValue::Point {
                            x: TILE.0,
                            y: TILE.1,
                        },
                    ),
            );
            graph.chain(chain);
        }

        graph.chain(["composer", "outqueue", "display"]);
        Ok(graph)
    }
}
