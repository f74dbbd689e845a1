//! Transactions

use serde::{Deserialize, Serialize};

use crate::codec::Cursor;
use crate::errors::WireError;
use crate::{Height, NodeId, TxId, ValueId};

/// A single transfer of one value between two nodes.
///
/// The *core* wire form excludes the attached proof and is the unit the
/// batch digest is computed over; the full form appends the serialised
/// proof for transmission inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    /// Transaction identifier
    pub tx_id: TxId,
    /// Value being transferred
    pub value_id: ValueId,
    /// Sending owner
    pub owner: NodeId,
    /// Receiving node
    pub recipient: NodeId,
    /// Height of the sealing account-chain block, 0 until sealed
    pub acb_height: Height,
    /// Serialised ownership proof attached for transmission
    pub proof_wire: String,
}

impl Tx {
    pub fn new(tx_id: TxId, value_id: ValueId, owner: NodeId, recipient: NodeId) -> Self {
        Self {
            tx_id,
            value_id,
            owner,
            recipient,
            acb_height: 0,
            proof_wire: String::new(),
        }
    }

    /// Core wire form, `;`-terminated, proof excluded. Deterministic: the
    /// batch digest hashes the concatenation of these.
    pub fn to_wire_core(&self) -> String {
        format!(
            "{},{},{},{},{};",
            self.tx_id, self.value_id, self.owner, self.acb_height, self.recipient
        )
    }

    /// Full wire form: core followed by the attached proof.
    pub fn to_wire(&self) -> String {
        let mut s = self.to_wire_core();
        s.push_str(&self.proof_wire);
        s
    }

    /// Parse a core wire form (the proof, if any, is left in the cursor).
    pub fn from_cursor(c: &mut Cursor<'_>) -> Result<Self, WireError> {
        let tx_id = c.u64_field(',')?;
        let value_id = c.u64_field(',')?;
        let owner = c.u64_field(',')?;
        let acb_height = c.u64_field(',')?;
        let recipient = c.u64_field(';')?;
        Ok(Self {
            tx_id,
            value_id,
            owner,
            recipient,
            acb_height,
            proof_wire: String::new(),
        })
    }

    /// Parse a full wire form: core plus trailing proof string.
    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut c = Cursor::new("tx", s);
        let mut tx = Self::from_cursor(&mut c)?;
        tx.proof_wire = c.rest().to_string();
        Ok(tx)
    }

    /// Parse a core-only wire form, rejecting trailing bytes.
    pub fn from_wire_core(s: &str) -> Result<Self, WireError> {
        let mut c = Cursor::new("tx", s);
        let tx = Self::from_cursor(&mut c)?;
        if !c.is_empty() {
            return Err(WireError::new("tx", "trailing bytes after core record"));
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_round_trip() {
        let tx = Tx::new(42, 7, 0, 1);
        let wire = tx.to_wire_core();
        assert_eq!(wire, "42,7,0,0,1;");
        assert_eq!(Tx::from_wire_core(&wire).unwrap(), tx);
    }

    #[test]
    fn test_full_round_trip_keeps_proof() {
        let mut tx = Tx::new(1, 2, 3, 4);
        tx.proof_wire = "0,3,0,2;-0".to_string();
        let back = Tx::from_wire(&tx.to_wire()).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.proof_wire, "0,3,0,2;-0");
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(Tx::from_wire_core("1,2,3").is_err());
        assert!(Tx::from_wire_core("a,b,c,d,e;").is_err());
        assert!(Tx::from_wire_core("1,2,3,4,5;extra").is_err());
    }
}
