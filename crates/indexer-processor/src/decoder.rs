use alloy_primitives::{Address, Bytes, Log, LogData, B256, U256};
use alloy_sol_types::SolEvent;
use indexer_core::events::{
    CredentialIssued, CredentialRevoked, OrganizationRegistered, RequestApproved, RequestCreated,
    RequestExecuted, RequestRejected, RoleGranted, RoleRevoked,
};
use indexer_core::types::{RequestAction, Role};
use indexer_core::{IndexerError, Result};
use indexer_db::models::DbRawEvent;

/// Closed set of typed event variants the projector dispatches on.
/// Anything that does not decode into one of these is a malformed event
/// and is left unprocessed for inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    OrganizationRegistered {
        org_id: i64,
        admin: String,
        name: String,
    },
    RoleGranted {
        org_id: i64,
        holder: String,
        role: Role,
    },
    RoleRevoked {
        org_id: i64,
        holder: String,
        role: Role,
    },
    CredentialIssued {
        token_id: i64,
        org_id: i64,
        owner: String,
        schema_hash: String,
    },
    CredentialRevoked {
        token_id: i64,
        org_id: i64,
        reason: String,
    },
    RequestCreated {
        request_id: i64,
        org_id: i64,
        action: RequestAction,
        required_approvals: i32,
        initiator: String,
    },
    RequestApproved {
        request_id: i64,
        approver: String,
    },
    RequestExecuted {
        request_id: i64,
    },
    RequestRejected {
        request_id: i64,
        rejecter: String,
        reason: String,
    },
}

/// Narrow an on-chain uint256 id to the i64 the derived tables key on.
/// The ledger never assigns ids anywhere near this range, so an
/// oversized value is a malformed payload, not a panic.
fn event_id(value: U256, field: &str) -> Result<i64> {
    u64::try_from(value)
        .ok()
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| {
            IndexerError::MalformedEvent(format!("{} {} exceeds the id range", field, value))
        })
}

/// Decode a stored raw event back into a typed variant.
pub fn decode_raw_event(raw: &DbRawEvent) -> Result<RegistryEvent> {
    let log = primitive_log(raw)?;
    let topic0 = log
        .topics()
        .first()
        .copied()
        .ok_or_else(|| IndexerError::MalformedEvent("log without topic0".to_string()))?;

    match topic0 {
        sig if sig == OrganizationRegistered::SIGNATURE_HASH => {
            let event = OrganizationRegistered::decode_log(&log)
                .map_err(|e| IndexerError::MalformedEvent(e.to_string()))?;
            Ok(RegistryEvent::OrganizationRegistered {
                org_id: event_id(event.orgId, "orgId")?,
                admin: format!("{:?}", event.admin),
                name: event.name.clone(),
            })
        }
        sig if sig == RoleGranted::SIGNATURE_HASH => {
            let event = RoleGranted::decode_log(&log)
                .map_err(|e| IndexerError::MalformedEvent(e.to_string()))?;
            let role = Role::from_u8(event.role).ok_or_else(|| {
                IndexerError::MalformedEvent(format!("unknown role discriminant {}", event.role))
            })?;
            Ok(RegistryEvent::RoleGranted {
                org_id: event_id(event.orgId, "orgId")?,
                holder: format!("{:?}", event.holder),
                role,
            })
        }
        sig if sig == RoleRevoked::SIGNATURE_HASH => {
            let event = RoleRevoked::decode_log(&log)
                .map_err(|e| IndexerError::MalformedEvent(e.to_string()))?;
            let role = Role::from_u8(event.role).ok_or_else(|| {
                IndexerError::MalformedEvent(format!("unknown role discriminant {}", event.role))
            })?;
            Ok(RegistryEvent::RoleRevoked {
                org_id: event_id(event.orgId, "orgId")?,
                holder: format!("{:?}", event.holder),
                role,
            })
        }
        sig if sig == CredentialIssued::SIGNATURE_HASH => {
            let event = CredentialIssued::decode_log(&log)
                .map_err(|e| IndexerError::MalformedEvent(e.to_string()))?;
            Ok(RegistryEvent::CredentialIssued {
                token_id: event_id(event.tokenId, "tokenId")?,
                org_id: event_id(event.orgId, "orgId")?,
                owner: format!("{:?}", event.owner),
                schema_hash: format!("{:?}", event.schemaHash),
            })
        }
        sig if sig == CredentialRevoked::SIGNATURE_HASH => {
            let event = CredentialRevoked::decode_log(&log)
                .map_err(|e| IndexerError::MalformedEvent(e.to_string()))?;
            Ok(RegistryEvent::CredentialRevoked {
                token_id: event_id(event.tokenId, "tokenId")?,
                org_id: event_id(event.orgId, "orgId")?,
                reason: event.reason.clone(),
            })
        }
        sig if sig == RequestCreated::SIGNATURE_HASH => {
            let event = RequestCreated::decode_log(&log)
                .map_err(|e| IndexerError::MalformedEvent(e.to_string()))?;
            let action = RequestAction::from_u8(event.action).ok_or_else(|| {
                IndexerError::MalformedEvent(format!(
                    "unknown request action discriminant {}",
                    event.action
                ))
            })?;
            Ok(RegistryEvent::RequestCreated {
                request_id: event_id(event.requestId, "requestId")?,
                org_id: event_id(event.orgId, "orgId")?,
                action,
                required_approvals: event.requiredApprovals as i32,
                initiator: format!("{:?}", event.initiator),
            })
        }
        sig if sig == RequestApproved::SIGNATURE_HASH => {
            let event = RequestApproved::decode_log(&log)
                .map_err(|e| IndexerError::MalformedEvent(e.to_string()))?;
            Ok(RegistryEvent::RequestApproved {
                request_id: event_id(event.requestId, "requestId")?,
                approver: format!("{:?}", event.approver),
            })
        }
        sig if sig == RequestExecuted::SIGNATURE_HASH => {
            let event = RequestExecuted::decode_log(&log)
                .map_err(|e| IndexerError::MalformedEvent(e.to_string()))?;
            Ok(RegistryEvent::RequestExecuted {
                request_id: event_id(event.requestId, "requestId")?,
            })
        }
        sig if sig == RequestRejected::SIGNATURE_HASH => {
            let event = RequestRejected::decode_log(&log)
                .map_err(|e| IndexerError::MalformedEvent(e.to_string()))?;
            Ok(RegistryEvent::RequestRejected {
                request_id: event_id(event.requestId, "requestId")?,
                rejecter: format!("{:?}", event.rejecter),
                reason: event.reason.clone(),
            })
        }
        _ => Err(IndexerError::MalformedEvent(format!(
            "unknown event signature {:?}",
            topic0
        ))),
    }
}

/// Rebuild an alloy primitive log from the stored topics and data
fn primitive_log(raw: &DbRawEvent) -> Result<Log> {
    let address: Address = raw
        .contract_address
        .parse()
        .map_err(|_| IndexerError::MalformedEvent("invalid contract address".to_string()))?;

    let topics: Vec<B256> = raw
        .topics
        .0
        .iter()
        .map(|t| {
            t.parse::<B256>()
                .map_err(|_| IndexerError::MalformedEvent(format!("invalid topic {}", t)))
        })
        .collect::<Result<Vec<_>>>()?;

    let data: Bytes = raw
        .data
        .parse()
        .map_err(|_| IndexerError::MalformedEvent("invalid event data".to_string()))?;

    let data = LogData::new(topics, data)
        .ok_or_else(|| IndexerError::MalformedEvent("too many topics".to_string()))?;

    Ok(Log { address, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, U256};
    use alloy_sol_types::SolEvent;
    use chrono::Utc;
    use indexer_core::events::{CredentialIssued, OrganizationRegistered, RequestCreated};

    fn raw_from_log(log: &Log) -> DbRawEvent {
        DbRawEvent {
            chain_id: 1,
            tx_hash: format!("{:?}", B256::repeat_byte(0x11)),
            log_index: 0,
            event_name: "test".to_string(),
            contract_address: format!("{:?}", log.address),
            block_number: 10,
            block_hash: None,
            topics: sqlx::types::Json(
                log.topics().iter().map(|t| format!("{:?}", t)).collect(),
            ),
            data: format!("0x{}", hex::encode(&log.data.data)),
            is_finalized: false,
            confirmation_depth: 0,
            processed: false,
            processed_at: None,
            projection_applied: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn decodes_organization_registered() {
        let event = OrganizationRegistered {
            orgId: U256::from(7u64),
            admin: Address::repeat_byte(0xab),
            name: "Example University".to_string(),
        };
        let log = Log {
            address: Address::repeat_byte(0x01),
            data: event.encode_log_data(),
        };
        let raw = raw_from_log(&log);

        match decode_raw_event(&raw).unwrap() {
            RegistryEvent::OrganizationRegistered { org_id, name, admin } => {
                assert_eq!(org_id, 7);
                assert_eq!(name, "Example University");
                assert_eq!(admin, format!("{:?}", Address::repeat_byte(0xab)));
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn decodes_credential_issued() {
        let event = CredentialIssued {
            tokenId: U256::from(42u64),
            orgId: U256::from(7u64),
            owner: Address::repeat_byte(0xcd),
            schemaHash: B256::repeat_byte(0x5a),
        };
        let log = Log {
            address: Address::repeat_byte(0x01),
            data: event.encode_log_data(),
        };
        let raw = raw_from_log(&log);

        match decode_raw_event(&raw).unwrap() {
            RegistryEvent::CredentialIssued {
                token_id, org_id, ..
            } => {
                assert_eq!(token_id, 42);
                assert_eq!(org_id, 7);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn oversized_org_id_is_malformed_not_a_panic() {
        let event = OrganizationRegistered {
            orgId: U256::MAX,
            admin: Address::repeat_byte(0xab),
            name: "overflowing".to_string(),
        };
        let log = Log {
            address: Address::repeat_byte(0x01),
            data: event.encode_log_data(),
        };
        let raw = raw_from_log(&log);

        assert!(matches!(
            decode_raw_event(&raw),
            Err(IndexerError::MalformedEvent(_))
        ));
    }

    #[test]
    fn oversized_token_id_is_malformed_not_a_panic() {
        let event = CredentialIssued {
            tokenId: U256::from(u64::MAX),
            orgId: U256::from(7u64),
            owner: Address::repeat_byte(0xcd),
            schemaHash: B256::repeat_byte(0x5a),
        };
        let log = Log {
            address: Address::repeat_byte(0x01),
            data: event.encode_log_data(),
        };
        let raw = raw_from_log(&log);

        // u64::MAX fits u64 but not i64; the narrowing must still reject it.
        assert!(matches!(
            decode_raw_event(&raw),
            Err(IndexerError::MalformedEvent(_))
        ));
    }

    #[test]
    fn rejects_unknown_action_discriminant() {
        let event = RequestCreated {
            requestId: U256::from(1u64),
            orgId: U256::from(7u64),
            action: 250,
            requiredApprovals: 2,
            initiator: Address::repeat_byte(0xee),
        };
        let log = Log {
            address: Address::repeat_byte(0x01),
            data: event.encode_log_data(),
        };
        let raw = raw_from_log(&log);

        assert!(matches!(
            decode_raw_event(&raw),
            Err(IndexerError::MalformedEvent(_))
        ));
    }

    #[test]
    fn rejects_unknown_signature() {
        let raw = DbRawEvent {
            chain_id: 1,
            tx_hash: format!("{:?}", B256::repeat_byte(0x22)),
            log_index: 0,
            event_name: "Unknown".to_string(),
            contract_address: format!("{:?}", Address::repeat_byte(0x01)),
            block_number: 1,
            block_hash: None,
            topics: sqlx::types::Json(vec![format!("{:?}", B256::repeat_byte(0x99))]),
            data: "0x".to_string(),
            is_finalized: false,
            confirmation_depth: 0,
            processed: false,
            processed_at: None,
            projection_applied: false,
            created_at: Utc::now(),
        };

        assert!(matches!(
            decode_raw_event(&raw),
            Err(IndexerError::MalformedEvent(_))
        ));
    }

    #[test]
    fn rejects_garbage_topics() {
        let raw = DbRawEvent {
            chain_id: 1,
            tx_hash: format!("{:?}", B256::repeat_byte(0x33)),
            log_index: 0,
            event_name: "Broken".to_string(),
            contract_address: format!("{:?}", Address::repeat_byte(0x01)),
            block_number: 1,
            block_hash: None,
            topics: sqlx::types::Json(vec!["not-hex".to_string()]),
            data: "0x".to_string(),
            is_finalized: false,
            confirmation_depth: 0,
            processed: false,
            processed_at: None,
            projection_applied: false,
            created_at: Utc::now(),
        };

        assert!(matches!(
            decode_raw_event(&raw),
            Err(IndexerError::MalformedEvent(_))
        ));
    }
}
