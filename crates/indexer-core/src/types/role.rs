use serde::{Deserialize, Serialize};

/// Role kinds a holder can carry within an organization.
/// The on-chain encoding is a uint8; anything else is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Issuer,
    Revoker,
    Verifier,
}

impl Role {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Role::Issuer),
            1 => Some(Role::Revoker),
            2 => Some(Role::Verifier),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Issuer => "issuer",
            Role::Revoker => "revoker",
            Role::Verifier => "verifier",
        }
    }
}

/// Action kind carried by a multi-party approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    IssueCredential,
    RevokeCredential,
    GrantRole,
    RevokeRole,
}

impl RequestAction {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RequestAction::IssueCredential),
            1 => Some(RequestAction::RevokeCredential),
            2 => Some(RequestAction::GrantRole),
            3 => Some(RequestAction::RevokeRole),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestAction::IssueCredential => "issue_credential",
            RequestAction::RevokeCredential => "revoke_credential",
            RequestAction::GrantRole => "grant_role",
            RequestAction::RevokeRole => "revoke_role",
        }
    }
}

/// Lifecycle of a multi-party approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Executed,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Executed => "executed",
            RequestStatus::Rejected => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_decoding_rejects_unknown_discriminants() {
        assert_eq!(Role::from_u8(0), Some(Role::Issuer));
        assert_eq!(Role::from_u8(2), Some(Role::Verifier));
        assert_eq!(Role::from_u8(3), None);
    }

    #[test]
    fn action_decoding() {
        assert_eq!(RequestAction::from_u8(1), Some(RequestAction::RevokeCredential));
        assert_eq!(RequestAction::from_u8(9), None);
    }
}
