use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Node ids are opaque strings issued by the backend.
pub type NodeId = String;

/// Job ids are opaque strings issued by the backend.
pub type JobId = String;

/// Compound key addressing one input of one node.
///
/// Flattens to `"<node_id>.<input_name>"` in run requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueKey {
    pub node_id: NodeId,
    pub input_name: String,
}

impl ValueKey {
    pub fn new(node_id: impl Into<NodeId>, input_name: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            input_name: input_name.into(),
        }
    }

    /// The flattened wire form, e.g. `"3.seed"`.
    pub fn flattened(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node_id, self.input_name)
    }
}

impl FromStr for ValueKey {
    type Err = StoreError;

    /// Splits at the first `.`; input names may themselves contain dots.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((node, input)) if !node.is_empty() && !input.is_empty() => {
                Ok(Self::new(node, input))
            }
            _ => Err(StoreError::MalformedKey(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_flattens_with_dot() {
        assert_eq!(ValueKey::new("3", "seed").to_string(), "3.seed");
    }

    #[test]
    fn parse_splits_at_first_dot() {
        let key: ValueKey = "12.lora.strength".parse().unwrap();
        assert_eq!(key.node_id, "12");
        assert_eq!(key.input_name, "lora.strength");
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert!("seed".parse::<ValueKey>().is_err());
        assert!(".seed".parse::<ValueKey>().is_err());
        assert!("3.".parse::<ValueKey>().is_err());
    }
}
