//! Verification context over a node's chain views

use ezchain_ledger::{Height, NodeId, Verdict, VerifyContext};

use crate::ac::AcChain;
use crate::cc::CcChain;

/// A node's local view of both chains, borrowed for one verification.
pub struct ChainContext<'a> {
    pub ac: &'a AcChain,
    pub cc: &'a CcChain,
}

impl<'a> ChainContext<'a> {
    pub fn new(ac: &'a AcChain, cc: &'a CcChain) -> Self {
        Self { ac, cc }
    }
}

impl VerifyContext for ChainContext<'_> {
    fn has_block(&self, height: Height) -> bool {
        self.ac.get(height).is_some()
    }

    fn digest_on_chain(&self, height: Height, digest: &str) -> bool {
        self.ac
            .get(height)
            .map(|b| b.lists_digest(digest))
            .unwrap_or(false)
    }

    fn author_filtered(&self, height: Height, author: NodeId) -> bool {
        self.ac
            .get(height)
            .map(|b| b.filter.contains(&author))
            .unwrap_or(false)
    }

    fn checkpoint_height(&self) -> Option<Height> {
        self.cc.latest_acb_height()
    }

    fn verdict(&self, height: Height, digest: &str) -> Verdict {
        self.cc.verdict_for(height, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ac::AcBlock;
    use crate::cc::CcBlock;

    #[test]
    fn test_context_answers_from_both_chains() {
        let mut ac = AcChain::new();
        let mut block = AcBlock::new(1, 1, 0, 0, 0.0);
        block.push_batch("aa".to_string(), 0);
        ac.append(block).unwrap();

        let mut cc = CcChain::new();
        let mut checkpoint = CcBlock::new(0, 1, 0, 0, 1, 1, 5.0);
        checkpoint.mark_missing("bb".to_string());
        cc.append(checkpoint).unwrap();

        let ctx = ChainContext::new(&ac, &cc);
        assert!(ctx.has_block(1));
        assert!(!ctx.has_block(2));
        assert!(ctx.digest_on_chain(1, "aa"));
        assert!(ctx.author_filtered(1, 0));
        assert!(!ctx.author_filtered(1, 3));
        assert_eq!(ctx.checkpoint_height(), Some(1));
        assert_eq!(ctx.verdict(1, "bb"), Verdict::BatchInvalid);
        assert_eq!(ctx.verdict(1, "aa"), Verdict::Clean);
    }
}
