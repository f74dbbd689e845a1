//! Values: globally unique units of account

use serde::{Deserialize, Serialize};

use crate::{Height, NodeId, ValueId};

/// A value is created exactly once at node startup and never destroyed; its
/// owner changes only through a confirmed transaction. The triple here is
/// the immutable birth record a proof chain is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    /// Node that held the value at creation
    pub init_owner: NodeId,
    /// Account-chain height at creation (0 for genesis values)
    pub init_height: Height,
    /// Globally unique identifier
    pub id: ValueId,
}

impl Value {
    /// Create a value record.
    pub fn new(init_owner: NodeId, id: ValueId, init_height: Height) -> Self {
        Self {
            init_owner,
            init_height,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_identity() {
        let v = Value::new(3, 17, 0);
        assert_eq!(v.init_owner, 3);
        assert_eq!(v.id, 17);
        assert_eq!(v.init_height, 0);
    }
}
