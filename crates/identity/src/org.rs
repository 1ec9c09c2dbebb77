//! Organisations, their domains, domain policy and members.

use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, InstanceId, ResourceOwner, UserId};
use warden_events::{AggregateRef, aggregate_events};

pub const AGGREGATE_TYPE: &str = "org";

pub const ADDED: &str = "org.added";
pub const REMOVED: &str = "org.removed";
pub const DOMAIN_ADDED: &str = "org.domain.added";
pub const DOMAIN_VERIFIED: &str = "org.domain.verified";
pub const DOMAIN_PRIMARY_SET: &str = "org.domain.primary.set";
pub const DOMAIN_REMOVED: &str = "org.domain.removed";
pub const DOMAIN_POLICY_SET: &str = "org.policy.domain.set";
pub const MEMBER_ADDED: &str = "org.member.added";

/// Role granted to the first administrator of a new organisation.
pub const ORG_OWNER_ROLE: &str = "ORG_OWNER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgAdded {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrgRemoved {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainAdded {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainVerified {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainPrimarySet {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainRemoved {
    pub domain: String,
}

/// Organisation-level override of the instance's domain validation default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDomainPolicySet {
    pub validate_org_domains: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMemberAdded {
    pub user_id: UserId,
    pub roles: Vec<String>,
}

aggregate_events! {
    /// Events of the `org` aggregate.
    pub enum OrgEvent for "org" {
        Added(OrgAdded) = ADDED,
        Removed(OrgRemoved) = REMOVED,
        DomainAdded(OrgDomainAdded) = DOMAIN_ADDED,
        DomainVerified(OrgDomainVerified) = DOMAIN_VERIFIED,
        DomainPrimarySet(OrgDomainPrimarySet) = DOMAIN_PRIMARY_SET,
        DomainRemoved(OrgDomainRemoved) = DOMAIN_REMOVED,
        DomainPolicySet(OrgDomainPolicySet) = DOMAIN_POLICY_SET,
        MemberAdded(OrgMemberAdded) = MEMBER_ADDED,
    }
}

/// Organisations own themselves: the resource owner is the org id.
pub fn aggregate(id: &AggregateId, instance_id: impl Into<InstanceId>) -> AggregateRef {
    AggregateRef::new(AGGREGATE_TYPE, id.clone(), ResourceOwner::from(id), instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_events::AggregateEvent;

    #[test]
    fn org_aggregate_is_its_own_resource_owner() {
        let org = aggregate(&AggregateId::new("o1"), "inst1");
        assert_eq!(org.aggregate_type, "org");
        assert_eq!(org.resource_owner.as_str(), "o1");
        assert_eq!(org.instance_id.as_str(), "inst1");
    }

    #[test]
    fn event_types_are_distinct() {
        let mut types = OrgEvent::EVENT_TYPES.to_vec();
        types.sort_unstable();
        types.dedup();
        assert_eq!(types.len(), OrgEvent::EVENT_TYPES.len());
    }
}
