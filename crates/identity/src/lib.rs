//! Identity domain event vocabulary (organisations, users, targets).
//!
//! This crate only declares the events appended to each aggregate type; the
//! rules deciding *when* they are emitted live in the command engine. No IO.

pub mod org;
pub mod target;
pub mod user;

pub use org::{
    ORG_OWNER_ROLE, OrgAdded, OrgDomainAdded, OrgDomainPolicySet, OrgDomainPrimarySet,
    OrgDomainRemoved, OrgDomainVerified, OrgEvent, OrgMemberAdded, OrgRemoved,
};
pub use target::{
    TargetAdded, TargetEvent, TargetPublicKeyActivated, TargetPublicKeyAdded,
    TargetPublicKeyDeactivated, TargetPublicKeyRemoved, TargetRemoved,
};
pub use user::{
    HumanUserAdded, RecoveryCodeCheckFailed, RecoveryCodeCheckSucceeded, RecoveryCodesAdded,
    RecoveryCodesRemoved, UserEvent, UserLocked, UserRemoved,
};
