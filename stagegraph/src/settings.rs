// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Typed stage configuration.
//!
//! The inference and capture plugins take several loosely-typed string
//! properties (quantization constants, caps, delegate selections). The types
//! in this module parse and validate those values before any stage is
//! created, and render them back to the exact text the plugins expect.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::graph::{PropertyValue, StageSpec};

/// Shared object implementing the TFLite QNN external delegate.
pub const QNN_DELEGATE_PATH: &str = "libQnnTFLiteDelegate.so";

/// Delegate options selecting the HTP backend of the QNN delegate.
pub const QNN_DELEGATE_OPTIONS: &str = "QNNExternalDelegate,backend_type=htp;";

/// Fails with [`Error::MissingFile`] unless `path` names an existing file.
pub fn require_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingFile {
            path: path.display().to_string(),
        })
    }
}

/// Fails unless the directory that would hold `path` exists.
pub fn require_writable_location(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if parent.is_dir() && path.file_name().is_some() {
        Ok(())
    } else {
        Err(Error::config(format!(
            "output location \"{}\" cannot be created",
            path.display()
        )))
    }
}

static CONSTANTS_RE: LazyLock<core::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"^\s*([^,;<>]+?)\s*,\s*q-offsets\s*=\s*<([^>]*)>\s*,\s*q-scales\s*=\s*<([^>]*)>\s*;?\s*$",
    )
});

/// Quantization constants handed to a post-processing stage.
///
/// The text form is `Model,q-offsets=<o1, o2>,q-scales=<s1, s2>;`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantConstants {
    /// Model label the post-processing module keys the values on.
    pub model: String,
    /// Zero points, one per output tensor.
    pub offsets: Vec<f64>,
    /// Scales, one per output tensor.
    pub scales: Vec<f64>,
}

fn parse_list(raw: &str, what: &str, value: &str) -> Result<Vec<f64>> {
    let invalid = |reason: String| Error::InvalidConstants {
        value: value.to_owned(),
        reason,
    };
    let list = raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(format!("{} entry \"{}\" is not a finite number", what, item)))
        })
        .collect::<Result<Vec<_>>>()?;
    if list.is_empty() {
        return Err(invalid(format!("{} list is empty", what)));
    }
    Ok(list)
}

impl FromStr for QuantConstants {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let re = CONSTANTS_RE
            .as_ref()
            .map_err(|err| Error::Runtime(format!("constants pattern: {}", err)))?;
        let captures = re.captures(value).ok_or_else(|| Error::InvalidConstants {
            value: value.to_owned(),
            reason: "expected \"Model,q-offsets=<...>,q-scales=<...>;\"".to_owned(),
        })?;
        let offsets = parse_list(&captures[2], "q-offsets", value)?;
        let scales = parse_list(&captures[3], "q-scales", value)?;
        if offsets.len() != scales.len() {
            return Err(Error::InvalidConstants {
                value: value.to_owned(),
                reason: format!(
                    "{} offsets but {} scales",
                    offsets.len(),
                    scales.len()
                ),
            });
        }
        Ok(QuantConstants {
            model: captures[1].to_owned(),
            offsets,
            scales,
        })
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:?}", v))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for QuantConstants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},q-offsets=<{}>,q-scales=<{}>;",
            self.model,
            join(&self.offsets),
            join(&self.scales)
        )
    }
}

impl From<&QuantConstants> for PropertyValue {
    fn from(constants: &QuantConstants) -> Self {
        PropertyValue::structure(constants.to_string())
    }
}

/// Frame rate as a positive fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framerate {
    /// Frames.
    pub numerator: i32,
    /// Per this many seconds.
    pub denominator: i32,
}

impl Default for Framerate {
    fn default() -> Self {
        Framerate {
            numerator: 30,
            denominator: 1,
        }
    }
}

impl FromStr for Framerate {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || Error::config(format!("invalid framerate \"{}\", expected N/D", value));
        let (num, den) = value.trim().split_once('/').unwrap_or((value.trim(), "1"));
        let numerator: i32 = num.trim().parse().map_err(|_| invalid())?;
        let denominator: i32 = den.trim().parse().map_err(|_| invalid())?;
        if numerator <= 0 || denominator <= 0 {
            return Err(invalid());
        }
        Ok(Framerate {
            numerator,
            denominator,
        })
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl From<Framerate> for PropertyValue {
    fn from(rate: Framerate) -> Self {
        PropertyValue::Fraction {
            numerator: rate.numerator,
            denominator: rate.denominator,
        }
    }
}

/// Raw camera output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraCaps {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate.
    pub framerate: Framerate,
    /// Whether buffers live in GBM memory.
    pub memory_gbm: bool,
    /// Bandwidth compression mode, if any (`ubwc`).
    pub compression: Option<String>,
}

impl CameraCaps {
    /// GBM-backed, UBWC-compressed NV12 as produced by the camera source.
    pub fn new(width: u32, height: u32, framerate: Framerate) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::config(format!(
                "invalid resolution {}x{}",
                width, height
            )));
        }
        Ok(CameraCaps {
            width,
            height,
            framerate,
            memory_gbm: true,
            compression: Some("ubwc".to_owned()),
        })
    }

    /// Drops the compression field.
    pub fn uncompressed(mut self) -> Self {
        self.compression = None;
        self
    }
}

impl fmt::Display for CameraCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("video/x-raw")?;
        if self.memory_gbm {
            f.write_str("(memory:GBM)")?;
        }
        write!(
            f,
            ",format=NV12,width={},height={},framerate={}",
            self.width, self.height, self.framerate
        )?;
        if let Some(compression) = &self.compression {
            write!(f, ",compression={}", compression)?;
        }
        Ok(())
    }
}

impl From<&CameraCaps> for PropertyValue {
    fn from(caps: &CameraCaps) -> Self {
        PropertyValue::caps(caps.to_string())
    }
}

/// Inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlFramework {
    /// Qualcomm Neural Processing SDK.
    Snpe,
    /// TensorFlow Lite.
    Tflite,
}

impl MlFramework {
    /// Plugin type running the model.
    pub fn stage_type(self) -> &'static str {
        match self {
            MlFramework::Snpe => "qtimlsnpe",
            MlFramework::Tflite => "qtimltflite",
        }
    }
}

impl FromStr for MlFramework {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "snpe" => Ok(MlFramework::Snpe),
            "tflite" => Ok(MlFramework::Tflite),
            other => Err(Error::config(format!("unknown ML framework \"{}\"", other))),
        }
    }
}

/// Hardware the inference runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Runtime {
    /// Application processor.
    Cpu,
    /// Graphics processor.
    Gpu,
    /// Hexagon DSP / HTP.
    #[default]
    Dsp,
}

impl FromStr for Runtime {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Runtime::Cpu),
            "gpu" => Ok(Runtime::Gpu),
            "dsp" => Ok(Runtime::Dsp),
            other => Err(Error::config(format!("unknown runtime \"{}\"", other))),
        }
    }
}

impl Runtime {
    /// Properties selecting this runtime on an inference stage of
    /// `framework`.
    pub fn delegate_properties(self, framework: MlFramework) -> Vec<(&'static str, PropertyValue)> {
        match (self, framework) {
            (Runtime::Cpu, _) => vec![("delegate", "none".into())],
            (Runtime::Gpu, _) => vec![("delegate", "gpu".into())],
            (Runtime::Dsp, MlFramework::Snpe) => vec![("delegate", "dsp".into())],
            (Runtime::Dsp, MlFramework::Tflite) => vec![
                ("delegate", "external".into()),
                ("external-delegate-path", QNN_DELEGATE_PATH.into()),
                (
                    "external-delegate-options",
                    PropertyValue::structure(QNN_DELEGATE_OPTIONS),
                ),
            ],
        }
    }

    /// Applies [`Runtime::delegate_properties`] to `stage`.
    pub fn apply(self, framework: MlFramework, stage: &mut StageSpec) {
        for (name, value) in self.delegate_properties(framework) {
            stage.set(name, value);
        }
    }
}

/// Detection confidence threshold in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f64);

impl Threshold {
    /// Validates that `value` lies in `[0, 100]`.
    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=100.0).contains(&value) {
            Ok(Threshold(value))
        } else {
            Err(Error::config(format!(
                "threshold {} is outside [0, 100]",
                value
            )))
        }
    }

    /// Value in percent.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl FromStr for Threshold {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let parsed = value
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::config(format!("threshold \"{}\" is not a number", value)))?;
        Threshold::new(parsed)
    }
}

impl From<Threshold> for PropertyValue {
    fn from(threshold: Threshold) -> Self {
        PropertyValue::Double(threshold.0)
    }
}
