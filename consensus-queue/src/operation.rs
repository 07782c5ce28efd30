use std::fmt::Display;
use std::fmt::Formatter;

use crate::OpId;

/// What a queued operation asks of a follower.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub enum OpKind {
    /// An operation the leader proposes to replicate.
    Replicate,

    /// Bookkeeping that records commitment of a prior replicate.
    Commit,
}

impl Display for OpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Replicate => write!(f, "REPLICATE"),
            OpKind::Commit => write!(f, "COMMIT"),
        }
    }
}

/// Payload variants of a queued operation.
///
/// The payload bytes are opaque to the queue and stable for the operation's
/// lifetime in it; only their size takes part in memory accounting.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub enum OpPayload {
    /// Serialized data the leader proposes to replicate.
    Replicate { data: Vec<u8> },

    /// The serialized result of applying the operation that
    /// `committed_op_id` refers to.
    Commit { committed_op_id: OpId, result: Vec<u8> },
}

/// A consensus operation as held by the leader queue.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub struct Operation {
    id: OpId,
    payload: OpPayload,
}

impl Operation {
    pub fn replicate(id: OpId, data: Vec<u8>) -> Self {
        Self {
            id,
            payload: OpPayload::Replicate { data },
        }
    }

    pub fn commit(id: OpId, committed_op_id: OpId, result: Vec<u8>) -> Self {
        Self {
            id,
            payload: OpPayload::Commit { committed_op_id, result },
        }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn kind(&self) -> OpKind {
        match self.payload {
            OpPayload::Replicate { .. } => OpKind::Replicate,
            OpPayload::Commit { .. } => OpKind::Commit,
        }
    }

    /// The operation this one marks as committed, if it is a COMMIT.
    pub fn committed_op_id(&self) -> Option<OpId> {
        match self.payload {
            OpPayload::Replicate { .. } => None,
            OpPayload::Commit { committed_op_id, .. } => Some(committed_op_id),
        }
    }

    /// Steady-state in-memory cost of the payload, in bytes.
    pub fn byte_size(&self) -> u64 {
        match &self.payload {
            OpPayload::Replicate { data } => data.len() as u64,
            OpPayload::Commit { result, .. } => result.len() as u64,
        }
    }

    pub fn payload(&self) -> &OpPayload {
        &self.payload
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.id, self.kind())?;
        if let OpPayload::Commit { committed_op_id, .. } = &self.payload {
            write!(f, " of {}", committed_op_id)?;
        }
        write!(f, " ({} bytes)", self.byte_size())
    }
}

#[cfg(test)]
mod tests {
    use crate::OpId;
    use crate::OpKind;
    use crate::Operation;

    #[test]
    fn test_operation_accessors() {
        let r = Operation::replicate(OpId::new(1, 2), vec![0u8; 100]);
        assert_eq!(OpId::new(1, 2), r.id());
        assert_eq!(OpKind::Replicate, r.kind());
        assert_eq!(None, r.committed_op_id());
        assert_eq!(100, r.byte_size());

        let c = Operation::commit(OpId::new(1, 4), OpId::new(1, 2), vec![0u8; 8]);
        assert_eq!(OpKind::Commit, c.kind());
        assert_eq!(Some(OpId::new(1, 2)), c.committed_op_id());
        assert_eq!(8, c.byte_size());
    }

    #[test]
    fn test_operation_display() {
        let r = Operation::replicate(OpId::new(1, 2), vec![0u8; 3]);
        assert_eq!("1.2 REPLICATE (3 bytes)", r.to_string());

        let c = Operation::commit(OpId::new(1, 4), OpId::new(1, 2), vec![]);
        assert_eq!("1.4 COMMIT of 1.2 (0 bytes)", c.to_string());
    }
}
