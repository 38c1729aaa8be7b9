//! Account identity used to authenticate connections against a zone.

use std::path::PathBuf;

use secrecy::SecretString;

/// Authentication scheme spoken during the connect ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    /// Password challenge against the zone's own user catalog.
    Native,
    /// PAM-backed authentication proxied by the server.
    Pam,
    /// GSI certificate authentication.
    Gsi,
}

impl AuthScheme {
    /// Wire name of the scheme, as sent in the auth request.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Pam => "pam",
            Self::Gsi => "gsi",
        }
    }
}

/// Client side of the client-server transport negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsNegotiationPolicy {
    /// Refuse to proceed unless the transport is TLS.
    RequireTls,
    /// Accept whatever the server prefers.
    #[default]
    DontCare,
    /// Refuse TLS; plain transport only.
    Refuse,
}

impl CsNegotiationPolicy {
    /// Wire name of the policy, as sent in the startup request.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::RequireTls => "CS_NEG_REQUIRE",
            Self::DontCare => "CS_NEG_DONT_CARE",
            Self::Refuse => "CS_NEG_REFUSE",
        }
    }
}

/// TLS material handed to a TLS-capable dialer.
///
/// Opaque to the connection layer; the dialer that performs the TLS
/// handshake is the only consumer.
#[derive(Debug, Clone, Default)]
pub struct SslConfig {
    /// CA certificate bundle, if not using the system roots.
    pub ca_certificate_file: Option<PathBuf>,
    /// Encryption key size negotiated for the shared-secret exchange.
    pub key_size: u32,
    /// Salt size for the shared-secret exchange.
    pub salt_size: u32,
    /// Hash rounds for the shared-secret exchange.
    pub hash_rounds: u32,
}

/// Everything needed to dial and authenticate one connection.
#[derive(Debug, Clone)]
pub struct Account {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Zone the paths of this account are rooted under.
    pub zone: String,
    /// Authenticating (proxy) user.
    pub proxy_user: String,
    /// User operations are performed as.
    pub client_user: String,
    /// Authentication scheme for the connect ceremony.
    pub auth_scheme: AuthScheme,
    /// Password or token for the scheme.
    pub password: SecretString,
    /// Whether to run the transport negotiation at startup.
    pub client_server_negotiation: bool,
    /// Client policy for the transport negotiation.
    pub cs_negotiation_policy: CsNegotiationPolicy,
    /// Expected server distinguished name (GSI).
    pub server_dn: Option<String>,
    /// TLS material for a TLS-capable dialer.
    pub ssl_config: Option<SslConfig>,
}

impl Account {
    /// The account's home collection, `/<zone>/home/<client_user>`.
    #[must_use]
    pub fn home_path(&self) -> String {
        format!("/{}/home/{}", self.zone, self.client_user)
    }

    /// Host:port pair for dialing.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
