// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Demo topologies.
//!
//! Each demo turns its parsed options into one or more [`GraphSpec`]s. All
//! option validation happens here, before any stage exists. The input and
//! output ends shared by several demos are [`Source`] and [`Sink`].

use std::path::PathBuf;

use clap::Args;
use stagegraph::settings::{CameraCaps, Framerate, require_file, require_writable_location};
use stagegraph::{Endpoint, GraphSpec, PropertyValue, Result, RtspEndpoint};

pub mod camera_encode;
pub mod daisychain;
pub mod jpeg_decode;
pub mod multi_camera;
pub mod object_detection;
pub mod parallel_inference;
pub mod rotate_downscale;
pub mod two_stream;
pub mod videoplay_composition;

/// V4L2 codec buffer mode: export DMA buffers.
pub const IO_MODE_DMABUF: &str = "dmabuf";

/// V4L2 codec buffer mode: import DMA buffers from the peer.
pub const IO_MODE_DMABUF_IMPORT: &str = "dmabuf-import";

/// Caps forced between the RTSP depayloader and the parser.
pub const RTSP_H264_CAPS: &str = "video/x-h264,colorimetry=bt709";

/// Camera output format options.
#[derive(Debug, Clone, Args)]
pub struct CameraFormatArgs {
    /// Camera output width
    #[arg(short = 'W', long, default_value_t = 1280)]
    pub width: u32,

    /// Camera output height
    #[arg(short = 'H', long, default_value_t = 720)]
    pub height: u32,

    /// Camera output framerate (N/D)
    #[arg(short = 'F', long, default_value = "30/1")]
    pub framerate: Framerate,
}

impl Default for CameraFormatArgs {
    fn default() -> Self {
        CameraFormatArgs {
            width: 1280,
            height: 720,
            framerate: Framerate::default(),
        }
    }
}

impl CameraFormatArgs {
    /// Caps of the camera source pad.
    pub fn caps(&self) -> Result<CameraCaps> {
        CameraCaps::new(self.width, self.height, self.framerate)
    }
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Camera by id.
    Camera(u32),
    /// H.264 in an MP4 container.
    File(PathBuf),
    /// H.264 over RTSP.
    Rtsp(RtspEndpoint),
}

/// Mutually exclusive input options. The camera is the default.
#[derive(Debug, Clone, Default, Args)]
#[group(multiple = false)]
pub struct SourceArgs {
    /// Camera id
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=1))]
    pub camera: Option<u32>,

    /// Input video file
    #[arg(long)]
    pub file_path: Option<PathBuf>,

    /// Input RTSP URL (rtsp://<address>:<port>/<mount point>)
    #[arg(long)]
    pub rtsp: Option<RtspEndpoint>,
}

impl SourceArgs {
    /// Selected source. Input files must exist.
    pub fn source(&self) -> Result<Source> {
        if let Some(path) = &self.file_path {
            require_file(path)?;
            return Ok(Source::File(path.clone()));
        }
        if let Some(url) = &self.rtsp {
            return Ok(Source::Rtsp(url.clone()));
        }
        Ok(Source::Camera(self.camera.unwrap_or_default()))
    }
}

impl Source {
    /// Whether frames arrive in real time.
    pub fn is_live(&self) -> bool {
        !matches!(self, Source::File(_))
    }

    /// Adds the stages producing decoded frames and links them into
    /// `downstream`.
    ///
    /// `decoded_caps` is forced after the decoder of file and RTSP inputs.
    pub fn add_to(
        &self,
        graph: &mut GraphSpec,
        camera_caps: &CameraCaps,
        decoded_caps: Option<&str>,
        downstream: &str,
    ) {
        let decoded = match self {
            Source::Camera(id) => {
                graph.stage("qtiqmmfsrc", "camsrc").set("camera", *id);
                graph.stage("capsfilter", "camcaps").set("caps", camera_caps);
                graph.chain(["camsrc", "camcaps", downstream]);
                return;
            }
            Source::File(path) => {
                graph
                    .stage("filesrc", "filesrc")
                    .set("location", path.display().to_string());
                graph.stage("qtdemux", "demux");
                graph.stage("h264parse", "parse");
                add_decoder(graph, IO_MODE_DMABUF_IMPORT);
                vec!["filesrc", "demux", "parse", "decoder"]
            }
            Source::Rtsp(url) => {
                graph.stage("rtspsrc", "rtspsrc").set("location", url.to_string());
                graph.stage("rtph264depay", "depay");
                graph
                    .stage("capsfilter", "h264caps")
                    .set("caps", PropertyValue::caps(RTSP_H264_CAPS));
                graph.stage("h264parse", "parse");
                add_decoder(graph, IO_MODE_DMABUF_IMPORT);
                vec!["rtspsrc", "depay", "h264caps", "parse", "decoder"]
            }
        };

        let mut chain = decoded;
        if let Some(caps) = decoded_caps {
            graph
                .stage("capsfilter", "deccaps")
                .set("caps", PropertyValue::caps(caps));
            chain.push("deccaps");
        }
        chain.push(downstream);
        graph.chain(chain);
    }
}

/// Adds a hardware H.264 decoder named `decoder`.
pub fn add_decoder(graph: &mut GraphSpec, io_mode: &str) {
    graph
        .stage("v4l2h264dec", "decoder")
        .set("capture-io-mode", io_mode)
        .set("output-io-mode", io_mode);
}

/// Adds a hardware H.264 encoder named `name`.
pub fn add_encoder(graph: &mut GraphSpec, name: &str) {
    graph
        .stage("v4l2h264enc", name)
        .set("capture-io-mode", IO_MODE_DMABUF_IMPORT)
        .set("output-io-mode", IO_MODE_DMABUF_IMPORT);
}

/// Where the rendered frames go.
#[derive(Debug, Clone, PartialEq)]
pub enum Sink {
    /// Full-screen Wayland window.
    Display,
    /// H.264 in an MP4 file.
    File(PathBuf),
    /// H.264 served over RTSP.
    Rtsp(RtspEndpoint),
}

/// Mutually exclusive output options. The display is the default.
#[derive(Debug, Clone, Default, Args)]
#[group(multiple = false)]
pub struct SinkArgs {
    /// Encode to this MP4 file instead of the display
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Serve the encoded stream at this RTSP URL instead of the display
    #[arg(long)]
    pub rtsp_out: Option<RtspEndpoint>,
}

impl SinkArgs {
    /// Selected sink. Output files must be creatable.
    pub fn sink(&self) -> Result<Sink> {
        if let Some(path) = &self.output {
            require_writable_location(path)?;
            return Ok(Sink::File(path.clone()));
        }
        if let Some(url) = &self.rtsp_out {
            return Ok(Sink::Rtsp(url.clone()));
        }
        Ok(Sink::Display)
    }
}

impl Sink {
    /// Adds the stages consuming the output of `upstream`.
    ///
    /// A live input renders without clock synchronization.
    pub fn add_to(&self, graph: &mut GraphSpec, upstream: &str, live: bool) {
        match self {
            Sink::Display => {
                let display = graph.stage("waylandsink", "display");
                display.set("fullscreen", true);
                if live {
                    display.set("sync", false);
                }
                graph.chain([upstream, "display"]);
            }
            Sink::File(path) => {
                add_file_writer(graph, upstream, path);
            }
            Sink::Rtsp(url) => {
                graph.stage("queue", "encqueue");
                add_encoder(graph, "encoder");
                graph.stage("h264parse", "encparse").set("config-interval", 1);
                graph.stage("queue", "rtspqueue");
                graph
                    .stage("qtirtspbin", "rtspbin")
                    .set("address", &url.address)
                    .set("port", url.port.to_string())
                    .set("mpoint", &url.mount_point);
                graph.chain([upstream, "encqueue", "encoder", "encparse", "rtspqueue", "rtspbin"]);
            }
        }
    }
}

/// Encodes the output of `upstream` and writes it as MP4 to `path`.
pub fn add_file_writer(graph: &mut GraphSpec, upstream: &str, path: &std::path::Path) {
    graph.stage("queue", "encqueue");
    add_encoder(graph, "encoder");
    graph.stage("h264parse", "encparse");
    graph.stage("queue", "muxqueue");
    graph.stage("mp4mux", "mux");
    graph.stage("queue", "filequeue");
    graph
        .stage("filesink", "filesink")
        .set("location", path.display().to_string());
    graph.chain([upstream, "encqueue", "encoder", "encparse", "muxqueue"]);
    graph.chain([Endpoint::from("muxqueue"), Endpoint::request("mux", "video_%u")]);
    graph.chain(["mux", "filequeue", "filesink"]);
}
