// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for graph construction and configuration.
//!
//! Every failure that can happen before the event loop starts is an [`Error`].
//! Failures reported asynchronously by a running pipeline are not errors of
//! this crate; they end the run through [`crate::Outcome::Failed`].

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while describing, configuring or building a graph.
///
/// The variants follow the phase in which they are detected: configuration
/// errors come out of argument and value parsing, construction errors out of
/// stage creation and property setting, link errors out of pad linking.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid or inconsistent option (missing flag, bad range, mutually
    /// exclusive choices).
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A required input file is missing or unreadable.
    #[error("File \"{path}\" does not exist or is not readable")]
    MissingFile {
        /// Offending path as given by the user.
        path: String,
    },

    /// An RTSP URL that does not have the `rtsp://host:port/mount` shape.
    #[error("Invalid RTSP URL \"{url}\": {reason}")]
    RtspUrl {
        /// The URL that failed to parse.
        url: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A post-processing constants string that could not be parsed.
    #[error("Invalid constants \"{value}\": {reason}")]
    InvalidConstants {
        /// The raw constants string.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The plugin type for a stage is not available on this host.
    #[error("Unable to create stage \"{name}\" of type \"{type_id}\"")]
    StageCreation {
        /// Stage name.
        name: String,
        /// Plugin type identifier.
        type_id: String,
    },

    /// The same stage name was declared twice with different types.
    #[error("Stage \"{name}\" declared as both \"{first}\" and \"{second}\"")]
    ConflictingStage {
        /// Stage name.
        name: String,
        /// Type of the first declaration.
        first: String,
        /// Type of the conflicting declaration.
        second: String,
    },

    /// A link chain or property references a stage that was never declared.
    #[error("Unknown stage \"{0}\"")]
    UnknownStage(String),

    /// A stage embedded in another stage's property also appears in a link.
    #[error("Stage \"{0}\" is embedded as a property value and cannot be linked")]
    EmbeddedStageLinked(String),

    /// A link chain with fewer than two endpoints.
    #[error("Link chain {index} has fewer than two stages")]
    ShortChain {
        /// Position of the chain in the graph description.
        index: usize,
    },

    /// A property could not be set on a stage or pad.
    #[error("Unable to set property \"{property}\" on \"{target}\": {reason}")]
    Property {
        /// Stage name, or `stage.pad` for pad properties.
        target: String,
        /// Property name.
        property: String,
        /// Why the runtime refused it.
        reason: String,
    },

    /// A request pad could not be allocated.
    #[error("Unable to request pad \"{template}\" on stage \"{stage}\"")]
    PadRequest {
        /// Stage name.
        stage: String,
        /// Pad template name (e.g. `sink_%u`).
        template: String,
    },

    /// Two stages could not be linked.
    #[error("Unable to link stage \"{upstream}\" to \"{downstream}\": {reason}")]
    Link {
        /// Upstream stage name.
        upstream: String,
        /// Downstream stage name.
        downstream: String,
        /// Reason reported by the runtime.
        reason: String,
    },

    /// A lifecycle transition that the state machine does not allow.
    #[error("Invalid lifecycle transition: {0}")]
    Lifecycle(String),

    /// The runtime failed in a way not covered by the variants above.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Shorthand for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Shorthand for [`Error::Property`].
    pub fn property(
        target: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Property {
            target: target.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised before any stage was created.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::MissingFile { .. }
                | Error::RtspUrl { .. }
                | Error::InvalidConstants { .. }
        )
    }
}
