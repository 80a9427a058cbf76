// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Routing of pads that stages announce at runtime.
//!
//! Demultiplexers and RTSP sources only create their source pads once they
//! have seen the stream. Links out of such stages are recorded as routes
//! here while the graph is built; when a pad shows up, [`DynamicLinks::dispatch`]
//! picks the route it belongs to.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::graph::{Endpoint, Property};

/// Stage types whose source pads are announced at runtime, with the pad
/// name fragment that selects the pads worth linking.
pub const DYNAMIC_PRODUCERS: &[(&str, &str)] = &[
    ("qtdemux", "video"),
    ("matroskademux", "video"),
    ("tsdemux", "video"),
    ("decodebin", "video"),
    ("uridecodebin", "video"),
    ("rtspsrc", "rtp"),
];

/// Pad name pattern for stages of `type_id`, if the type announces its pads
/// at runtime.
pub fn dynamic_pad_pattern(type_id: &str) -> Option<&'static str> {
    DYNAMIC_PRODUCERS
        .iter()
        .find(|(producer, _)| *producer == type_id)
        .map(|(_, pattern)| *pattern)
}

/// A pending link out of a dynamic producer.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Substring the announced pad name must contain.
    pub pattern: String,
    /// Where matching pads go.
    pub consumer: Endpoint,
    /// Properties set on the announced pad once it is linked.
    pub pad_properties: Vec<Property>,
    /// Set once a pad has been linked along this route.
    pub linked: bool,
}

/// What to do with an announced pad.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Link the pad to `consumer`, then set `pad_properties` on it.
    Link {
        consumer: Endpoint,
        pad_properties: Vec<Property>,
    },
    /// The producer has routes but none is waiting for this pad (e.g. an
    /// audio track, or a second video track).
    Ignored,
    /// The producer was never registered.
    Unregistered,
}

impl Dispatch {
    /// Endpoint the pad goes to, for [`Dispatch::Link`].
    pub fn consumer(&self) -> Option<&Endpoint> {
        match self {
            Dispatch::Link { consumer, .. } => Some(consumer),
            _ => None,
        }
    }
}

/// Route table keyed by producer stage name.
#[derive(Debug, Default)]
pub struct DynamicLinks {
    routes: BTreeMap<String, Vec<Route>>,
}

impl DynamicLinks {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that pads of `producer` whose name contains `pattern` go to
    /// `consumer`. The returned route takes pad properties.
    pub fn register(
        &mut self,
        producer: impl Into<String>,
        pattern: impl Into<String>,
        consumer: Endpoint,
    ) -> &mut Route {
        let producer = producer.into();
        let pattern = pattern.into();
        debug!(
            "Routing \"{}\" pads of {} to {}",
            pattern, producer, consumer
        );
        let routes = self.routes.entry(producer).or_default();
        routes.push(Route {
            pattern,
            consumer,
            pad_properties: Vec::new(),
            linked: false,
        });
        let last = routes.len() - 1;
        &mut routes[last]
    }

    /// Names of the producers that have at least one route.
    pub fn producers(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Routes registered for `producer`.
    pub fn routes(&self, producer: &str) -> &[Route] {
        self.routes.get(producer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when every route has been linked.
    pub fn is_complete(&self) -> bool {
        self.routes.values().flatten().all(|route| route.linked)
    }

    /// Claims the first unlinked route of `producer` matching `pad`.
    ///
    /// A claimed route is marked linked even if the caller then fails to
    /// link; the failure is the caller's to report.
    pub fn dispatch(&mut self, producer: &str, pad: &str) -> Dispatch {
        let Some(routes) = self.routes.get_mut(producer) else {
            warn!(
                "Pad {} announced by unregistered producer {}, dropping it",
                pad, producer
            );
            return Dispatch::Unregistered;
        };

        match routes
            .iter_mut()
            .find(|route| !route.linked && pad.contains(route.pattern.as_str()))
        {
            Some(route) => {
                route.linked = true;
                Dispatch::Link {
                    consumer: route.consumer.clone(),
                    pad_properties: route.pad_properties.clone(),
                }
            }
            None => {
                debug!("Ignoring pad {} of {}", pad, producer);
                Dispatch::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_patterns() {
        assert_eq!(dynamic_pad_pattern("qtdemux"), Some("video"));
        assert_eq!(dynamic_pad_pattern("rtspsrc"), Some("rtp"));
        assert_eq!(dynamic_pad_pattern("tee"), None);
    }

    #[test]
    fn first_matching_pad_wins() {
        let mut links = DynamicLinks::new();
        links.register("demux", "video", Endpoint::from("parse"));

        assert_eq!(links.dispatch("demux", "audio_0"), Dispatch::Ignored);
        assert!(!links.is_complete());
        assert_eq!(
            links.dispatch("demux", "video_0").consumer(),
            Some(&Endpoint::from("parse"))
        );
        assert_eq!(links.dispatch("demux", "video_1"), Dispatch::Ignored);
        assert!(links.is_complete());
    }

    #[test]
    fn several_routes_fill_in_order() {
        let mut links = DynamicLinks::new();
        links.register("src", "rtp", Endpoint::from("depay0"));
        links.register("src", "rtp", Endpoint::from("depay1"));

        assert_eq!(
            links.dispatch("src", "recv_rtp_src_0_1_96").consumer(),
            Some(&Endpoint::from("depay0"))
        );
        assert_eq!(
            links.dispatch("src", "recv_rtp_src_1_2_96").consumer(),
            Some(&Endpoint::from("depay1"))
        );
        assert_eq!(links.producers().collect::<Vec<_>>(), vec!["src"]);
    }

    #[test]
    fn route_carries_pad_properties() {
        let mut links = DynamicLinks::new();
        links
            .register("demux", "audio_", Endpoint::from("aparse"))
            .pad_properties
            .push(Property::new("offset", 40));

        match links.dispatch("demux", "audio_0") {
            Dispatch::Link {
                consumer,
                pad_properties,
            } => {
                assert_eq!(consumer, Endpoint::from("aparse"));
                assert_eq!(pad_properties, vec![Property::new("offset", 40)]);
            }
            other => panic!("unexpected dispatch {:?}", other),
        }
    }

    #[test]
    fn unknown_producer() {
        let mut links = DynamicLinks::new();
        assert_eq!(links.dispatch("ghost", "video_0"), Dispatch::Unregistered);
        assert!(links.routes("ghost").is_empty());
    }
}
