//! One authenticated transport to the server.
//!
//! A [`Connection`] is exclusive: callers must not share one across
//! concurrent operations. The pool in the layer above enforces this by
//! handing out owned guards.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::ExposeSecret as _;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::account::{Account, CsNegotiationPolicy};
use crate::codec::{self, Envelope, read_envelope, write_envelope};
use crate::error::GridError;
use crate::messages::{AuthRequest, StartupRequest, StartupResponse, msg};
use crate::metrics::TransferMetrics;

/// Byte streams a [`Connection`] can run over.
pub trait Wire: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Wire for T {}

/// Pluggable transport backend: produces a fresh stream to the account's
/// endpoint. The production backend dials TCP; a TLS-capable backend wraps
/// the handshake here (consuming `Account::ssl_config`); tests hand out
/// in-memory duplex streams.
pub trait Dialer: Clone + Send + Sync + 'static {
    type Stream: Wire;

    /// Establish a fresh stream. No protocol bytes are exchanged yet.
    fn dial(&self, account: &Account) -> impl Future<Output = Result<Self::Stream, GridError>> + Send;
}

/// Plain TCP backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, account: &Account) -> Result<TcpStream, GridError> {
        let stream = TcpStream::connect(account.endpoint()).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Lifecycle of a connection. `Stale` and `Broken` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Returned to the pool, ready for use.
    Idle,
    /// An exchange is in flight.
    Busy,
    /// Lifespan exceeded; will not be reused.
    Stale,
    /// Transport failed; refuses all further calls.
    Broken,
}

/// One authenticated request/response transport.
pub struct Connection<S> {
    stream: Option<S>,
    account: Arc<Account>,
    state: ConnectionState,
    seq: i32,
    created_at: Instant,
    last_used: Instant,
    operation_timeout: Duration,
    metrics: Arc<TransferMetrics>,
}

impl<S: Wire> Connection<S> {
    /// Wrap a freshly dialed stream. Call [`connect`](Self::connect) before
    /// issuing requests.
    pub fn new(
        stream: S,
        account: Arc<Account>,
        operation_timeout: Duration,
        metrics: Arc<TransferMetrics>,
    ) -> Self {
        let now = Instant::now();
        Self {
            stream: Some(stream),
            account,
            state: ConnectionState::Idle,
            seq: 0,
            created_at: now,
            last_used: now,
            operation_timeout,
            metrics,
        }
    }

    /// Run the startup negotiation and the auth ceremony.
    pub async fn connect(&mut self, application_name: &str) -> Result<(), GridError> {
        let account = Arc::clone(&self.account);

        let startup = StartupRequest {
            application: application_name.to_owned(),
            proxy_user: account.proxy_user.clone(),
            client_user: account.client_user.clone(),
            zone: account.zone.clone(),
            negotiation_policy: account
                .client_server_negotiation
                .then(|| account.cs_negotiation_policy.wire_name().to_owned()),
        };
        let reply: StartupResponse = self.request_typed(msg::STARTUP, &startup).await?;

        if account.client_server_negotiation {
            let agreed_tls = reply.negotiation_result == "tls";
            let acceptable = match account.cs_negotiation_policy {
                CsNegotiationPolicy::RequireTls => agreed_tls,
                CsNegotiationPolicy::Refuse => !agreed_tls,
                CsNegotiationPolicy::DontCare => true,
            };
            if !acceptable {
                self.state = ConnectionState::Broken;
                self.stream = None;
                return Err(codec::error_from_code(
                    codec::code::NEGOTIATION_FAILED,
                    format!(
                        "server settled on {:?} transport against policy {:?}",
                        reply.negotiation_result, account.cs_negotiation_policy
                    ),
                ));
            }
        }

        let auth = AuthRequest {
            scheme: account.auth_scheme.wire_name().to_owned(),
            secret: account.password.expose_secret().to_owned(),
        };
        self.request_unit(msg::AUTHENTICATE, &auth).await?;

        debug!(
            host = %account.host,
            zone = %account.zone,
            user = %account.client_user,
            "connection authenticated"
        );
        Ok(())
    }

    /// Best-effort goodbye, then drop the stream. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.stream.is_some() && self.state != ConnectionState::Broken {
            // A peer that already went away must not turn disconnect into an
            // error, so the result is deliberately ignored.
            let _ = self.request(msg::DISCONNECT, &[], &[]).await;
        }
        self.stream = None;
        self.state = ConnectionState::Broken;
        trace!("connection closed");
    }

    /// One framed request/response exchange.
    ///
    /// Transport failures and deadline overruns poison the connection;
    /// server-reported errors do not.
    pub async fn request(
        &mut self,
        msg_type: &str,
        body: &[u8],
        bs: &[u8],
    ) -> Result<Envelope, GridError> {
        if !self.is_alive() {
            return Err(GridError::ConnectionBroken);
        }
        self.state = ConnectionState::Busy;
        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;

        let operation_timeout = self.operation_timeout;
        let Some(stream) = self.stream.as_mut() else {
            return Err(GridError::ConnectionBroken);
        };

        let exchange = async {
            let sent = write_envelope(stream, msg_type, seq, body, bs).await?;
            let (envelope, received) = read_envelope(stream).await?;
            Ok::<_, std::io::Error>((envelope, sent, received))
        };
        let outcome = tokio::time::timeout(operation_timeout, exchange).await;

        match outcome {
            Err(_) => {
                warn!(msg_type, "exchange exceeded operation timeout");
                self.state = ConnectionState::Broken;
                self.stream = None;
                Err(GridError::Timeout)
            }
            Ok(Err(error)) => {
                warn!(msg_type, %error, "transport failure");
                self.state = ConnectionState::Broken;
                self.stream = None;
                Err(GridError::ConnectionBroken)
            }
            Ok(Ok((envelope, sent, received))) => {
                self.state = ConnectionState::Idle;
                self.touch();
                self.metrics.record_exchange(sent, received);
                trace!(msg_type, status = envelope.header.int_info, "exchange complete");
                envelope.check()
            }
        }
    }

    /// Exchange a serialized request for a deserialized response body.
    pub async fn request_typed<Req: Serialize, Resp: DeserializeOwned>(
        &mut self,
        msg_type: &str,
        req: &Req,
    ) -> Result<Resp, GridError> {
        let body = encode_body(msg_type, req)?;
        let envelope = self.request(msg_type, &body, &[]).await?;
        envelope.decode_body()
    }

    /// Exchange a serialized request, discarding the response body.
    pub async fn request_unit<Req: Serialize>(
        &mut self,
        msg_type: &str,
        req: &Req,
    ) -> Result<(), GridError> {
        let body = encode_body(msg_type, req)?;
        self.request(msg_type, &body, &[]).await.map(drop)
    }

    /// Whether the connection can still carry requests.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.stream.is_some()
            && matches!(self.state, ConnectionState::Idle | ConnectionState::Busy)
    }

    /// Refresh the last-activity time.
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// Mark the connection past its lifespan. Absorbing.
    pub fn mark_stale(&mut self) {
        if self.state != ConnectionState::Broken {
            self.state = ConnectionState::Stale;
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Age since creation.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the last completed exchange.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }
}

fn encode_body<Req: Serialize>(msg_type: &str, req: &Req) -> Result<Vec<u8>, GridError> {
    serde_json::to_vec(req).map_err(|e| GridError::InvalidArgument(format!(
        "unencodable {msg_type} request: {e}"
    )))
}
