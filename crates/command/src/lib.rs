//! Command side of the identity engine.
//!
//! Commands validate inputs, fold the relevant history into write models,
//! and append new events with a single optimistic-concurrency push. Nothing
//! here reads projections; every decision is taken on events.

pub mod commander;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod error;
pub mod org;
pub mod permission;
pub mod preparation;
pub mod push;
pub mod query_reducer;
pub mod target;
pub mod user;
pub mod write_model;


pub use commander::{Commander, CommanderBuilder, TransactionFilter};
pub use commands::Commands;
pub use config::{CommandsConfig, RecoveryCodesConfig};
pub use crypto::{
    KeyError, SecretGenerator, SecretHasher, Sha256SecretHasher, UuidSecretGenerator,
    public_key_fingerprint,
};
pub use error::{CommandError, CommandResult};
pub use org::{
    DomainState, OrgDomainPolicyWriteModel, OrgDomainWriteModel, OrgSetupDetails, OrgState,
    OrgWriteModel, VerifiedOrgDomainsWriteModel,
};
pub use permission::{AllowAll, DenyAll, PermissionCheck, USER_CREDENTIAL_WRITE};
pub use preparation::{
    CommandsFuture, CreateCommands, Validation, create_commands, prepare_commands, validation,
};
pub use push::{push_and_sync, pushed_details};
pub use query_reducer::{FilterToQueryReducer, StoreLoader, load_write_model};
pub use target::{
    PublicKeyState, TargetPublicKeyWriteModel, TargetPublicKeysWriteModel, TargetState,
    TargetWriteModel,
};
pub use user::{AddHumanUser, UserState, UserWriteModel, UsernamesWriteModel};
pub use write_model::{WriteModel, WriteModelBase};
