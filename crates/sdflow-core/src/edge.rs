//! Channel edges of the dataflow graph.
//!
//! A channel connects one output port to one input port and buffers tokens
//! in between. Its production and consumption rates are not stored here --
//! they are inherited from the endpoint ports -- but the initial token count
//! (the delay) is a property of the channel itself.

use serde::{Deserialize, Serialize};

use crate::id::PortId;

/// A directed token channel between two ports.
///
/// `delay` is the number of tokens present on the channel before any node has
/// fired. A delay of at least 1 is what makes a feedback cycle schedulable:
/// the destination can fire against the initial tokens before the source ever
/// runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// The producing endpoint. Always an output port.
    pub source_port: PortId,
    /// The consuming endpoint. Always an input port.
    pub target_port: PortId,
    /// Initial tokens present before any firing.
    pub delay: u64,
}

impl Channel {
    /// Returns `true` if this channel carries initial tokens and therefore
    /// does not constrain firing order.
    pub fn is_delayed(&self) -> bool {
        self.delay >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_channel_is_not_delayed() {
        let ch = Channel {
            source_port: PortId(0),
            target_port: PortId(1),
            delay: 0,
        };
        assert!(!ch.is_delayed());
    }

    #[test]
    fn channel_with_initial_tokens_is_delayed() {
        let ch = Channel {
            source_port: PortId(2),
            target_port: PortId(3),
            delay: 4,
        };
        assert!(ch.is_delayed());
    }

    #[test]
    fn serde_roundtrip() {
        let ch = Channel {
            source_port: PortId(1),
            target_port: PortId(5),
            delay: 2,
        };
        let json = serde_json::to_string(&ch).unwrap();
        let back: Channel = serde_json::from_str(&json).unwrap();
        assert_eq!(ch, back);
    }
}
