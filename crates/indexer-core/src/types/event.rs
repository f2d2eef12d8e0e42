use crate::events::{
    CredentialIssued, CredentialRevoked, OrganizationRegistered, RequestApproved, RequestCreated,
    RequestExecuted, RequestRejected, RoleGranted, RoleRevoked,
};
use alloy_primitives::B256;
use alloy_sol_types::SolEvent;

/// Closed set of registry event signatures this system ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OrganizationRegistered,
    RoleGranted,
    RoleRevoked,
    CredentialIssued,
    CredentialRevoked,
    RequestCreated,
    RequestApproved,
    RequestExecuted,
    RequestRejected,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::OrganizationRegistered,
        EventKind::RoleGranted,
        EventKind::RoleRevoked,
        EventKind::CredentialIssued,
        EventKind::CredentialRevoked,
        EventKind::RequestCreated,
        EventKind::RequestApproved,
        EventKind::RequestExecuted,
        EventKind::RequestRejected,
    ];

    pub fn signature_hash(&self) -> B256 {
        match self {
            EventKind::OrganizationRegistered => OrganizationRegistered::SIGNATURE_HASH,
            EventKind::RoleGranted => RoleGranted::SIGNATURE_HASH,
            EventKind::RoleRevoked => RoleRevoked::SIGNATURE_HASH,
            EventKind::CredentialIssued => CredentialIssued::SIGNATURE_HASH,
            EventKind::CredentialRevoked => CredentialRevoked::SIGNATURE_HASH,
            EventKind::RequestCreated => RequestCreated::SIGNATURE_HASH,
            EventKind::RequestApproved => RequestApproved::SIGNATURE_HASH,
            EventKind::RequestExecuted => RequestExecuted::SIGNATURE_HASH,
            EventKind::RequestRejected => RequestRejected::SIGNATURE_HASH,
        }
    }

    /// All topic0 hashes, used to build getLogs filters
    pub fn all_signature_hashes() -> Vec<B256> {
        Self::ALL.iter().map(|k| k.signature_hash()).collect()
    }

    pub fn from_topic0(topic0: &B256) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.signature_hash() == *topic0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrganizationRegistered => "OrganizationRegistered",
            EventKind::RoleGranted => "RoleGranted",
            EventKind::RoleRevoked => "RoleRevoked",
            EventKind::CredentialIssued => "CredentialIssued",
            EventKind::CredentialRevoked => "CredentialRevoked",
            EventKind::RequestCreated => "RequestCreated",
            EventKind::RequestApproved => "RequestApproved",
            EventKind::RequestExecuted => "RequestExecuted",
            EventKind::RequestRejected => "RequestRejected",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic0_round_trips_through_kind() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_topic0(&kind.signature_hash()), Some(kind));
        }
    }

    #[test]
    fn unknown_topic0_is_none() {
        assert_eq!(EventKind::from_topic0(&B256::ZERO), None);
    }

    #[test]
    fn name_round_trips() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_name("NotAnEvent"), None);
    }

    #[test]
    fn signatures_are_distinct() {
        let hashes = EventKind::all_signature_hashes();
        for (i, a) in hashes.iter().enumerate() {
            for b in hashes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
