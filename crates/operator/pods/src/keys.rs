//! Packet keys shared by the pod and scheduling steps

/// Effective [`ServerConfig`](operator_types::ServerConfig) of the server a
/// forked sub-chain works on
pub const SERVER_CONFIG: &str = "serverConfig";

/// [`WlsServerConfig`](operator_types::WlsServerConfig) scan entry of that server
pub const SERVER_SCAN: &str = "serverScan";

/// The pass's [`RollingBatch`](crate::rolling::RollingBatch)
pub const SERVERS_TO_ROLL: &str = "serversToRoll";
