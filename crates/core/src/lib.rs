//! `warden-core`: foundation types shared by every layer of the command side.
//!
//! This crate contains **pure** primitives (no IO): identifiers, the request
//! context that carries the tenant boundary, write acknowledgements and the
//! error taxonomy.

pub mod context;
pub mod details;
pub mod error;
pub mod id;

pub use context::RequestContext;
pub use details::ObjectDetails;
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{
    AggregateId, IdGenerator, InstanceId, ResourceOwner, SequenceIdGenerator, UserId,
    UuidGenerator,
};
