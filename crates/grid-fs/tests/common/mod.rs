#![allow(missing_docs, clippy::unwrap_used, dead_code)]

pub mod mock_server;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use grid_fs::{Account, AuthScheme, CsNegotiationPolicy, FileSystem, FileSystemConfig};

use mock_server::{MockDialer, MockGridState};

pub const TEST_PASSWORD: &str = "hunter2";

/// Account matching the mock server's seeded zone.
pub fn test_account() -> Account {
    Account {
        host: "grid.test".into(),
        port: 1247,
        zone: "zone".into(),
        proxy_user: "rods".into(),
        client_user: "rods".into(),
        auth_scheme: AuthScheme::Native,
        password: SecretString::from(TEST_PASSWORD),
        client_server_negotiation: false,
        cs_negotiation_policy: CsNegotiationPolicy::DontCare,
        server_dn: None,
        ssl_config: None,
    }
}

/// Test configuration: short operation timeout so stuck tests fail fast.
pub fn test_config() -> FileSystemConfig {
    FileSystemConfig {
        operation_timeout: Duration::from_secs(5),
        ..FileSystemConfig::new("grid-fs-tests")
    }
}

pub fn make_fs(state: &Arc<MockGridState>) -> FileSystem<MockDialer> {
    make_fs_with_config(state, test_config())
}

pub fn make_fs_with_config(
    state: &Arc<MockGridState>,
    config: FileSystemConfig,
) -> FileSystem<MockDialer> {
    FileSystem::with_dialer(test_account(), config, MockDialer::new(state))
}
