//! Edges, channel matrices and the channel naming scheme.
//!
//! ```text
//!                 consumer index →
//!               ┌────────┬────────┬────────┐
//!  producer  0  │ (0,0)  │ (0,1)  │ (0,2)  │   a producer only writes its own row
//!  index     1  │ (1,0)  │ (1,1)  │ (1,2)  │   a consumer only reads its own column
//!     ↓         └────────┴────────┴────────┘
//! ```
//!
//! Channel names follow `<moduleRole>{InboundFrom|OutboundTo}<peerRole>(<p>,<c>)`
//! and are the only addressing key, so the format must not change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an edge relative to the module role that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    /// Upstream peer → module.
    Inbound,
    /// Module → downstream peer.
    Outbound,
}

impl Edge {
    fn infix(self) -> &'static str {
        match self {
            Edge::Inbound => "InboundFrom",
            Edge::Outbound => "OutboundTo",
        }
    }

    /// `(producer, consumer)` roles of an edge between `module` and `peer`.
    fn endpoints<'a>(self, module: &'a str, peer: &'a str) -> (&'a str, &'a str) {
        match self {
            Edge::Inbound => (peer, module),
            Edge::Outbound => (module, peer),
        }
    }
}

/// Identity of one channel: edge, roles on both ends and replica indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub edge: Edge,
    pub module_role: String,
    pub peer_role: String,
    pub producer: usize,
    pub consumer: usize,
}

impl ChannelKey {
    pub fn inbound(
        module_role: impl Into<String>,
        source_role: impl Into<String>,
        producer: usize,
        consumer: usize,
    ) -> Self {
        Self {
            edge: Edge::Inbound,
            module_role: module_role.into(),
            peer_role: source_role.into(),
            producer,
            consumer,
        }
    }

    pub fn outbound(
        module_role: impl Into<String>,
        sink_role: impl Into<String>,
        producer: usize,
        consumer: usize,
    ) -> Self {
        Self {
            edge: Edge::Outbound,
            module_role: module_role.into(),
            peer_role: sink_role.into(),
            producer,
            consumer,
        }
    }

    /// Role that enqueues on this channel.
    pub fn producer_role(&self) -> &str {
        self.edge.endpoints(&self.module_role, &self.peer_role).0
    }

    /// Role that dequeues from this channel.
    pub fn consumer_role(&self) -> &str {
        self.edge.endpoints(&self.module_role, &self.peer_role).1
    }

    /// Addressing key shared by every process in the cluster.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}({},{})",
            self.module_role,
            self.edge.infix(),
            self.peer_role,
            self.producer,
            self.consumer
        )
    }
}

/// Shape of the channel matrix for one edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLayout {
    pub edge: Edge,
    pub module_role: String,
    pub peer_role: String,
    /// Replica count of the producing role.
    pub producers: usize,
    /// Replica count of the consuming role.
    pub consumers: usize,
}

impl EdgeLayout {
    pub fn key(&self, producer: usize, consumer: usize) -> ChannelKey {
        ChannelKey {
            edge: self.edge,
            module_role: self.module_role.clone(),
            peer_role: self.peer_role.clone(),
            producer,
            consumer,
        }
    }

    /// Role whose replicas index the rows.
    pub fn producer_role(&self) -> &str {
        self.edge.endpoints(&self.module_role, &self.peer_role).0
    }

    /// Role whose replicas index the columns.
    pub fn consumer_role(&self) -> &str {
        self.edge.endpoints(&self.module_role, &self.peer_role).1
    }

    /// Every key in the matrix, row-major.
    pub fn keys(&self) -> impl Iterator<Item = ChannelKey> + '_ {
        (0..self.producers).flat_map(move |p| (0..self.consumers).map(move |c| self.key(p, c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_name() {
        let key = ChannelKey::inbound("replay", "worker", 1, 0);
        assert_eq!(key.name(), "replayInboundFromworker(1,0)");
        assert_eq!(key.producer_role(), "worker");
        assert_eq!(key.consumer_role(), "replay");
    }

    #[test]
    fn test_outbound_name() {
        let key = ChannelKey::outbound("replay", "learner", 0, 2);
        assert_eq!(key.name(), "replayOutboundTolearner(0,2)");
        assert_eq!(key.producer_role(), "replay");
        assert_eq!(key.consumer_role(), "learner");
    }

    #[test]
    fn test_layout_keys_cover_matrix() {
        let layout = EdgeLayout {
            edge: Edge::Outbound,
            module_role: "learner".into(),
            peer_role: "worker".into(),
            producers: 1,
            consumers: 3,
        };
        let names: Vec<String> = layout.keys().map(|k| k.name()).collect();
        assert_eq!(
            names,
            vec![
                "learnerOutboundToworker(0,0)",
                "learnerOutboundToworker(0,1)",
                "learnerOutboundToworker(0,2)",
            ]
        );
    }

    #[test]
    fn test_same_edge_same_name_from_both_ends() {
        // Producer and consumer build the key independently.
        let from_producer = EdgeLayout {
            edge: Edge::Inbound,
            module_role: "replay".into(),
            peer_role: "worker".into(),
            producers: 2,
            consumers: 1,
        }
        .key(1, 0);
        let from_consumer = ChannelKey::inbound("replay", "worker", 1, 0);
        assert_eq!(from_producer, from_consumer);
        assert_eq!(from_producer.name(), from_consumer.name());
    }

    #[test]
    fn test_layout_roles_match_its_keys() {
        for edge in [Edge::Inbound, Edge::Outbound] {
            let layout = EdgeLayout {
                edge,
                module_role: "replay".into(),
                peer_role: "worker".into(),
                producers: 2,
                consumers: 2,
            };
            for key in layout.keys() {
                assert_eq!(key.producer_role(), layout.producer_role());
                assert_eq!(key.consumer_role(), layout.consumer_role());
            }
        }
        let inbound = EdgeLayout {
            edge: Edge::Inbound,
            module_role: "replay".into(),
            peer_role: "worker".into(),
            producers: 1,
            consumers: 1,
        };
        assert_eq!(inbound.producer_role(), "worker");
        assert_eq!(inbound.consumer_role(), "replay");
    }
}
