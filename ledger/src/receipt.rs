//! Receipts
//!
//! One receipt per sealed transaction, unicast from the batch author to the
//! transaction recipient. It carries everything the recipient needs to
//! extend and verify the proof: the sealing height, the full batch, the
//! transaction itself and the sender's proof as of the previous block.
//!
//! The wire form is length-prefixed: variable sections are introduced by
//! explicit counts, so a proof payload can never be confused with framing.

use serde::{Deserialize, Serialize};

use crate::codec::Cursor;
use crate::errors::WireError;
use crate::transaction::Tx;
use crate::{Height, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Batch author (the spending owner)
    pub sender: NodeId,
    /// Transaction recipient
    pub recipient: NodeId,
    /// Height of the sealing account-chain block
    pub height: Height,
    /// Index of `tx` within the batch
    pub tx_index: usize,
    /// All transaction cores of the sealed batch
    pub batch_txs: Vec<Tx>,
    /// The transaction this receipt confirms
    pub tx: Tx,
    /// Sender's proof as of the block before `height`
    pub proof_wire: String,
}

impl Receipt {
    pub fn to_wire(&self) -> String {
        let mut s = format!(
            "{},{},{},{},{}$",
            self.sender,
            self.recipient,
            self.height,
            self.tx_index,
            self.batch_txs.len()
        );
        for tx in &self.batch_txs {
            s.push_str(&tx.to_wire_core());
            s.push('$');
        }
        s.push_str(&self.tx.to_wire_core());
        s.push('$');
        s.push_str(&self.proof_wire);
        s
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut c = Cursor::new("receipt", s);
        let sender = c.u64_field(',')?;
        let recipient = c.u64_field(',')?;
        let height = c.u64_field(',')?;
        let tx_index = c.u64_field(',')? as usize;
        let count = c.u64_field('$')? as usize;
        let mut batch_txs = Vec::with_capacity(count);
        for _ in 0..count {
            let item = c.until('$')?;
            batch_txs
                .push(Tx::from_wire_core(item).map_err(|e| WireError::new("receipt", e.detail))?);
        }
        let tx_item = c.until('$')?;
        let tx = Tx::from_wire_core(tx_item).map_err(|e| WireError::new("receipt", e.detail))?;
        let proof_wire = c.rest().to_string();
        Ok(Self {
            sender,
            recipient,
            height,
            tx_index,
            batch_txs,
            tx,
            proof_wire,
        })
    }
}
