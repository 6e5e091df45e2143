//! Error types for the pipehost daemon.

use pipehost_server_api::ServerError;
use thiserror::Error;

/// Errors raised while selecting the hosted server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Nothing was registered, which means the binary was packaged without a server.
    #[error("No pipeline server implementation was found. Seems a server crate is missing from the build?")]
    NoImplementation,
}

/// Errors surfaced by the host to its callers.
#[derive(Error, Debug)]
pub enum HostError {
    /// Server discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The server could not load its connection properties.
    #[error("Failed to load connection properties: {0}")]
    ConfigLoad(#[source] ServerError),

    /// `open` or `close` failed while supervising the server.
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[source] ServerError),

    /// An accessor was used before a server was selected.
    #[error("The host does not have a pipeline server associated")]
    NoServer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_error_message() {
        let err = HostError::from(DiscoveryError::NoImplementation);
        assert!(err.to_string().contains("No pipeline server implementation"));
    }

    #[test]
    fn test_wrapped_server_error() {
        let err = HostError::ConfigLoad(ServerError::Properties("bad endpoint".to_string()));
        assert_eq!(
            err.to_string(),
            "Failed to load connection properties: Properties error: bad endpoint"
        );

        let err = HostError::Lifecycle(ServerError::Connection("refused".to_string()));
        assert_eq!(err.to_string(), "Lifecycle error: Connection error: refused");
    }
}
