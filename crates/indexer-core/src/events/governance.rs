use alloy_sol_types::sol;

sol! {
    /// Emitted when a multi-party approval request is opened
    #[derive(Debug)]
    event RequestCreated(
        uint256 indexed requestId,
        uint256 indexed orgId,
        uint8 action,
        uint8 requiredApprovals,
        address initiator
    );

    /// Emitted for each distinct approver of a request
    #[derive(Debug)]
    event RequestApproved(
        uint256 indexed requestId,
        address indexed approver
    );

    /// Emitted once a request gathers enough approvals and executes
    #[derive(Debug)]
    event RequestExecuted(
        uint256 indexed requestId
    );

    /// Emitted when a request is rejected before execution
    #[derive(Debug)]
    event RequestRejected(
        uint256 indexed requestId,
        address indexed rejecter,
        string reason
    );
}
