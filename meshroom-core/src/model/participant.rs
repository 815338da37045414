use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of one participant session in a room.
///
/// A person who leaves and joins again gets a fresh id. Ordering is the
/// byte order of the underlying UUID, which matches the lexicographic order
/// of its canonical lowercase string, so both sides of a pair agree on
/// which id is greater without exchanging anything.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ParticipantId(pub Uuid);

#[derive(Debug, Error)]
#[error("invalid participant id `{input}`")]
pub struct ParticipantIdError {
    pub input: String,
}

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ParticipantId {
    type Err = ParticipantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ParticipantIdError {
                input: s.to_owned(),
            })
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
