use alloy_sol_types::sol;

sol! {
    /// Emitted when an organization is registered on the ledger
    #[derive(Debug)]
    event OrganizationRegistered(
        uint256 indexed orgId,
        address indexed admin,
        string name
    );

    /// Emitted when a role is granted to a holder within an organization
    #[derive(Debug)]
    event RoleGranted(
        uint256 indexed orgId,
        address indexed holder,
        uint8 role
    );

    /// Emitted when a previously granted role is revoked
    #[derive(Debug)]
    event RoleRevoked(
        uint256 indexed orgId,
        address indexed holder,
        uint8 role
    );

    /// Emitted when a credential token is issued to an owner
    #[derive(Debug)]
    event CredentialIssued(
        uint256 indexed tokenId,
        uint256 indexed orgId,
        address indexed owner,
        bytes32 schemaHash
    );

    /// Emitted when an issued credential is revoked
    #[derive(Debug)]
    event CredentialRevoked(
        uint256 indexed tokenId,
        uint256 indexed orgId,
        string reason
    );
}
