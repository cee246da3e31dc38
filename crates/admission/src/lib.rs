//! Call admission and membership reconciliation.
//!
//! A join request is normalized, its room is created on demand, and then,
//! under a per-room exclusion, the room's members are scanned, the seat
//! policy is applied and the requester is seated. Credentials are issued
//! only after the exclusion has been released.

pub mod engine;
pub mod error;
pub mod exclusion;
pub mod grants;
pub mod policy;
pub mod reconcile;
pub mod snapshot;

pub use engine::{AdmissionEngine, AdmissionOutcome, AdmissionPlan, AdmissionSettings};
pub use error::{AdmissionError, AdmissionStage};
pub use exclusion::ExclusionQueue;
pub use grants::{lock_join_to_members, restrict_join_to_members, GrantLockOutcome};
pub use policy::{evaluate, AdmissionDecision, SeatPolicy, DIRECT_CAPACITY};
pub use reconcile::{reconcile, Reconciliation, ADMITTED_ROLE};
pub use snapshot::{MembershipSnapshot, SnapshotReader};
