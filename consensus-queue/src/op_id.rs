use std::fmt::Display;
use std::fmt::Formatter;

/// The identity of a consensus operation.
///
/// A term and an index identify an operation globally. The ordering compares
/// `term` first and `index` second; the derive relies on the field
/// declaration order.
#[derive(Debug, Default, Copy, Clone, Hash)]
#[derive(PartialOrd, Ord, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct OpId {
    pub term: u64,
    pub index: u64,
}

impl OpId {
    /// The zero value `(0, 0)`: a valid initial watermark for a peer that
    /// has acknowledged nothing yet.
    pub const MIN: OpId = OpId { term: 0, index: 0 };

    pub fn new(term: u64, index: u64) -> Self {
        Self { term, index }
    }
}

impl Display for OpId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.term, self.index)
    }
}
