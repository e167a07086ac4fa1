//! Domain types for the campaign runtime
//!
//! Core domain types: Operation, Campaign, PlacementRecord.
//! Operations are the unit the scheduler moves between queue and active set;
//! campaigns and placements are owned by the storage collaborator.

mod campaign;
mod operation;
mod placement;

pub use campaign::{Campaign, CampaignStatus, RuntimeStatus};
pub use operation::{Operation, OperationStatus, OperationType};
pub use placement::{PlacementRecord, PlacementStatus};
