use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

use validit::Validate;

use crate::OpId;

/// Acknowledgement watermarks reported by one peer.
///
/// `received` bounds what the peer holds in its own queue; `replicated` and
/// `safe_commit` bound what it has acknowledged for each purpose. Neither
/// acknowledgement watermark may exceed `received`.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PeerWatermarks {
    pub received: OpId,
    pub replicated: OpId,
    pub safe_commit: OpId,
}

impl PeerWatermarks {
    /// Watermarks for a freshly tracked peer: all three start at the same id.
    pub fn new_initial(watermark: OpId) -> Self {
        Self {
            received: watermark,
            replicated: watermark,
            safe_commit: watermark,
        }
    }

    /// The lowest acknowledged id, where ack processing for this peer
    /// resumes.
    pub(crate) fn lowest_acked(&self) -> OpId {
        std::cmp::min(self.replicated, self.safe_commit)
    }
}

impl Display for PeerWatermarks {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{received: {}, replicated: {}, safe_commit: {}}}",
            self.received, self.replicated, self.safe_commit
        )
    }
}

impl Validate for PeerWatermarks {
    fn validate(&self) -> Result<(), Box<dyn Error>> {
        validit::less_equal!(self.replicated, self.received);
        validit::less_equal!(self.safe_commit, self.received);
        Ok(())
    }
}
