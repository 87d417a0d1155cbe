//! IPAM errors

use thiserror::Error;

/// Errors raised while resolving networks or loading pool configuration
#[derive(Debug, Error)]
pub enum IpamError {
    /// Referenced resource is absent from the cache
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Human-readable kind of the missing resource
        kind: &'static str,
        /// Namespace that was looked up
        namespace: String,
        /// Name that was looked up
        name: String,
    },

    /// NetworkAttachmentDefinition exists but does not point at a pool
    #[error("network attachment definition {namespace}/{name} has no label {key}")]
    MissingLabel {
        /// Namespace of the NAD
        namespace: String,
        /// Name of the NAD
        name: String,
        /// Label that is absent
        key: &'static str,
    },

    /// Malformed CIDR or address in pool configuration
    #[error("cannot parse {what} {input:?}: {reason}")]
    Parse {
        /// Which field was being parsed
        what: &'static str,
        /// Offending text
        input: String,
        /// Parser message
        reason: String,
    },

    /// Service CIDR could not be read from node arguments
    #[error("service CIDR not found for node {node}: {reason}")]
    ServiceCidr {
        /// Node whose annotation was read
        node: String,
        /// Why no CIDR could be extracted
        reason: String,
    },
}

impl IpamError {
    pub(crate) fn parse(what: &'static str, input: &str, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            what,
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for lookups that may succeed once caches catch up
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
