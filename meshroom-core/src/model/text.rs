use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of a side-channel text message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TextKind {
    Chat,
    GestureDerived,
}

impl fmt::Display for TextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextKind::Chat => f.write_str("chat"),
            TextKind::GestureDerived => f.write_str("gesture-derived"),
        }
    }
}
