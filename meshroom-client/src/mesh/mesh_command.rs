use crate::error::MeshResult;
use crate::mesh::PeerSnapshot;
use meshroom_core::RosterEntry;
use tokio::sync::oneshot;

/// Requests a `MeshHandle` sends to its coordinator.
#[derive(Debug)]
pub enum MeshCommand {
    Peers {
        reply: oneshot::Sender<Vec<PeerSnapshot>>,
    },
    Roster {
        reply: oneshot::Sender<Vec<RosterEntry>>,
    },
    Leave {
        reply: oneshot::Sender<MeshResult<()>>,
    },
}
