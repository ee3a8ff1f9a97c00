//! # Connection Manager
//!
//! Purpose: Own the transport session and keep it usable: log in on open,
//! log in again lazily after a failure, and drop the session whenever a reply
//! leaves it in doubt.
//!
//! ## State Machine
//!
//! ```text
//!            open ok                    fault / io error
//! Closed ───────────▶ Open ─────────────────────────────▶ Failed
//!   ▲  open err          ▲                                  │
//!   └──────┘             └──────── next execute logs in ────┘
//!
//! close(): any state ──▶ Closed
//! ```
//!
//! There is no background retry; the first call after an outage pays for the
//! relogin.

use tracing::{debug, error, warn};

use crate::command::Command;
use crate::config::{EndpointConfig, Topology};
use crate::error::{StoreError, StoreResult};
use crate::reply::{classify, Fault, Outcome, Payload, ReplyKind};
use crate::transport::{self, ConnectParams, Connector, TcpConnector, Transport};

/// Lifecycle state of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not configured; every command fails with `NotOpen`.
    Closed,
    /// Configured and connected.
    Open,
    /// Configured, session torn down; the next command logs in again.
    Failed,
}

/// Owns at most one live transport, direct or cluster.
pub struct ConnectionManager<C: Connector = TcpConnector> {
    connector: C,
    endpoint: Option<Endpoint>,
    session: Option<Box<dyn Transport>>,
}

// Config and its parsed topology are set and cleared together.
#[derive(Clone)]
struct Endpoint {
    config: EndpointConfig,
    topology: Topology,
}

impl ConnectionManager<TcpConnector> {
    pub fn new() -> Self {
        Self::with_connector(TcpConnector)
    }
}

impl Default for ConnectionManager<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> ConnectionManager<C> {
    pub fn with_connector(connector: C) -> Self {
        ConnectionManager {
            connector,
            endpoint: None,
            session: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.endpoint, &self.session) {
            (None, _) => SessionState::Closed,
            (Some(_), Some(_)) => SessionState::Open,
            (Some(_), None) => SessionState::Failed,
        }
    }

    pub fn config(&self) -> Option<&EndpointConfig> {
        self.endpoint.as_ref().map(|endpoint| &endpoint.config)
    }

    pub fn is_cluster(&self) -> bool {
        self.endpoint
            .as_ref()
            .is_some_and(|endpoint| endpoint.topology.is_cluster())
    }

    /// Pattern scans cannot be routed to a single shard.
    pub fn supports_pattern_scan(&self) -> bool {
        !self.is_cluster()
    }

    /// Replaces any previous session and logs in with `config`.
    ///
    /// On failure the manager is left `Closed`.
    pub fn open(&mut self, config: EndpointConfig) -> StoreResult<()> {
        self.close();

        let topology = config.topology()?;
        self.endpoint = Some(Endpoint { config, topology });

        if let Err(err) = self.login() {
            error!(error = %err, "store open failed");
            self.close();
            return Err(err);
        }
        debug!("store open");
        Ok(())
    }

    /// Drops the session and the configuration. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.endpoint.is_none() && self.session.is_none() {
            return;
        }
        self.session = None;
        self.endpoint = None;
        debug!("store closed");
    }

    /// Clears the selected table. The session stays open.
    pub fn destroy(&mut self) -> StoreResult<()> {
        self.execute(&Command::flushdb(), ReplyKind::Status)
            .map(|_| ())
    }

    /// Runs one command, logging in first if the session is down.
    pub fn execute(&mut self, command: &Command, expected: ReplyKind) -> StoreResult<Payload> {
        if self.endpoint.is_none() {
            return Err(StoreError::NotOpen);
        }
        if self.session.is_none() {
            self.login()?;
        }
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return Err(StoreError::NotOpen),
        };

        let result = run(session.as_mut(), command, expected);
        match &result {
            Ok(_) => debug!(command = %command, "command succeeded"),
            Err(err) if err.is_fatal() => {
                error!(command = %command, error = %err, "command failed, dropping session");
                self.session = None;
            }
            Err(err) => warn!(command = %command, error = %err, "command not applied"),
        }
        result
    }

    fn login(&mut self) -> StoreResult<()> {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint,
            None => return Err(StoreError::NotOpen),
        };
        let config = &endpoint.config;
        let params = ConnectParams {
            username: config.username(),
            password: config.password(),
            timeout: config.timeout,
        };

        let mut session = transport::connect(&self.connector, &endpoint.topology, &params)
            .map_err(|err| {
                error!(address = %config.address, error = %err, "connect to store failed");
                StoreError::from(err)
            })?;

        if let Topology::Single(node) = &endpoint.topology {
            // Dropping `session` on any `?` below closes the half-built login.
            if let Some(password) = params.password {
                run(session.as_mut(), &Command::auth(password), ReplyKind::Status)?;
            }
            run(session.as_mut(), &Command::select(config.table), ReplyKind::Status)?;
            debug!(node = %node, table = config.table, "logged in");
        } else {
            debug!(address = %config.address, "logged in to cluster");
        }

        self.session = Some(session);
        Ok(())
    }
}

impl<C: Connector + Clone> Clone for ConnectionManager<C> {
    /// Copies the configuration only. The clone logs in on first use.
    fn clone(&self) -> Self {
        ConnectionManager {
            connector: self.connector.clone(),
            endpoint: self.endpoint.clone(),
            session: None,
        }
    }
}

fn run(transport: &mut dyn Transport, command: &Command, expected: ReplyKind) -> StoreResult<Payload> {
    let reply = transport.execute(command)?;
    match classify(reply, expected) {
        Outcome::Success(payload) => Ok(payload),
        Outcome::Miss if expected == ReplyKind::Bulk => Err(StoreError::Missing {
            command: command.to_string(),
        }),
        Outcome::Miss => Err(StoreError::Rejected {
            command: command.to_string(),
        }),
        Outcome::Fault(Fault::Server(message)) => Err(StoreError::Server {
            command: command.to_string(),
            message,
        }),
        Outcome::Fault(Fault::Mismatch { actual }) => Err(StoreError::UnexpectedReply {
            command: command.to_string(),
            expected,
            actual,
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use crate::config::NodeAddr;
    use crate::error::{ClientError, ClientResult};
    use crate::reply::Reply;

    /// Replies handed out in order; an empty script answers `+OK`.
    #[derive(Default)]
    pub(crate) struct Script {
        pub replies: VecDeque<ClientResult<Reply>>,
        pub sent: Vec<String>,
        pub connects: usize,
        pub refuse_connect: bool,
    }

    #[derive(Clone, Default)]
    pub(crate) struct ScriptedConnector {
        pub script: Rc<RefCell<Script>>,
    }

    impl ScriptedConnector {
        pub fn push(&self, reply: Reply) {
            self.script.borrow_mut().replies.push_back(Ok(reply));
        }

        pub fn push_io_error(&self) {
            let err = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
            self.script.borrow_mut().replies.push_back(Err(ClientError::Io(err)));
        }

        pub fn sent(&self) -> Vec<String> {
            self.script.borrow().sent.clone()
        }

        pub fn connects(&self) -> usize {
            self.script.borrow().connects
        }

        fn open(&self) -> ClientResult<Box<dyn Transport>> {
            let mut script = self.script.borrow_mut();
            if script.refuse_connect {
                return Err(ClientError::Io(std::io::ErrorKind::ConnectionRefused.into()));
            }
            script.connects += 1;
            Ok(Box::new(ScriptedTransport {
                script: self.script.clone(),
            }))
        }
    }

    impl Connector for ScriptedConnector {
        fn connect_direct(
            &self,
            _node: &NodeAddr,
            _params: &ConnectParams<'_>,
        ) -> ClientResult<Box<dyn Transport>> {
            self.open()
        }

        fn connect_cluster(
            &self,
            _nodes: &[NodeAddr],
            _params: &ConnectParams<'_>,
        ) -> ClientResult<Box<dyn Transport>> {
            self.open()
        }
    }

    struct ScriptedTransport {
        script: Rc<RefCell<Script>>,
    }

    impl Transport for ScriptedTransport {
        fn execute(&mut self, command: &Command) -> ClientResult<Reply> {
            let mut script = self.script.borrow_mut();
            script.sent.push(command.args().join(" "));
            script
                .replies
                .pop_front()
                .unwrap_or_else(|| Ok(Reply::Status("OK".to_string())))
        }
    }

    fn opened(config: EndpointConfig) -> (ConnectionManager<ScriptedConnector>, ScriptedConnector) {
        let connector = ScriptedConnector::default();
        let mut manager = ConnectionManager::with_connector(connector.clone());
        manager.open(config).expect("open");
        (manager, connector)
    }

    #[test]
    fn single_node_login_authenticates_then_selects() {
        let (manager, connector) = opened(EndpointConfig::new("h:1").with_password("pw").with_table(3));
        assert_eq!(manager.state(), SessionState::Open);
        assert_eq!(connector.sent(), ["AUTH pw", "SELECT 3"]);
    }

    #[test]
    fn login_without_password_skips_auth() {
        let (_manager, connector) = opened(EndpointConfig::new("h:1"));
        assert_eq!(connector.sent(), ["SELECT 0"]);
    }

    #[test]
    fn cluster_login_sends_nothing() {
        let (manager, connector) = opened(EndpointConfig::new("a:1,b:2").with_password("pw"));
        assert!(connector.sent().is_empty());
        assert!(manager.is_cluster());
        assert!(!manager.supports_pattern_scan());
    }

    #[test]
    fn failed_select_leaves_manager_closed() {
        let connector = ScriptedConnector::default();
        connector.push(Reply::Error("ERR DB index is out of range".into()));
        let mut manager = ConnectionManager::with_connector(connector.clone());
        let err = manager.open(EndpointConfig::new("h:1").with_table(99)).unwrap_err();
        assert!(matches!(err, StoreError::Server { .. }));
        assert_eq!(manager.state(), SessionState::Closed);
    }

    #[test]
    fn malformed_port_fails_before_connecting() {
        let connector = ScriptedConnector::default();
        let mut manager = ConnectionManager::with_connector(connector.clone());
        let err = manager.open(EndpointConfig::new("h:port")).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        assert_eq!(connector.connects(), 0);
        assert_eq!(manager.state(), SessionState::Closed);
    }

    #[test]
    fn execute_before_open_is_not_open() {
        let mut manager = ConnectionManager::with_connector(ScriptedConnector::default());
        let err = manager.execute(&Command::get("k"), ReplyKind::Bulk).unwrap_err();
        assert!(matches!(err, StoreError::NotOpen));
    }

    #[test]
    fn error_reply_drops_session_and_next_call_relogs() {
        let (mut manager, connector) = opened(EndpointConfig::new("h:1"));
        connector.push(Reply::Error("WRONGTYPE".into()));
        let err = manager.execute(&Command::get("k"), ReplyKind::Bulk).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(manager.state(), SessionState::Failed);

        connector.push(Reply::Status("OK".into())); // SELECT on relogin
        connector.push(Reply::Bulk(b"v".to_vec()));
        let payload = manager.execute(&Command::get("k"), ReplyKind::Bulk).unwrap();
        assert_eq!(payload, Payload::Text("v".into()));
        assert_eq!(connector.connects(), 2);
        assert_eq!(manager.state(), SessionState::Open);
        assert_eq!(connector.sent(), ["SELECT 0", "GET k", "SELECT 0", "GET k"]);
    }

    #[test]
    fn kind_mismatch_drops_session() {
        let (mut manager, connector) = opened(EndpointConfig::new("h:1"));
        connector.push(Reply::Status("OK".into()));
        let err = manager.execute(&Command::exists("k"), ReplyKind::Integer).unwrap_err();
        assert!(matches!(err, StoreError::UnexpectedReply { actual: "status", .. }));
        assert_eq!(manager.state(), SessionState::Failed);
    }

    #[test]
    fn io_error_drops_session() {
        let (mut manager, connector) = opened(EndpointConfig::new("h:1"));
        connector.push_io_error();
        let err = manager.execute(&Command::lpop("q"), ReplyKind::Bulk).unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
        assert_eq!(manager.state(), SessionState::Failed);
    }

    #[test]
    fn nil_and_zero_keep_session() {
        let (mut manager, connector) = opened(EndpointConfig::new("h:1"));
        connector.push(Reply::Nil);
        connector.push(Reply::Integer(0));
        connector.push(Reply::Integer(-1));
        assert!(matches!(
            manager.execute(&Command::get("k"), ReplyKind::Bulk),
            Err(StoreError::Missing { .. })
        ));
        assert!(matches!(
            manager.execute(&Command::del("k"), ReplyKind::Integer),
            Err(StoreError::Rejected { .. })
        ));
        assert!(matches!(
            manager.execute(&Command::del("k"), ReplyKind::Integer),
            Err(StoreError::Rejected { .. })
        ));
        assert_eq!(manager.state(), SessionState::Open);
        assert_eq!(connector.connects(), 1);
    }

    #[test]
    fn relogin_failure_stays_failed_and_retries() {
        let (mut manager, connector) = opened(EndpointConfig::new("h:1"));
        connector.push_io_error();
        assert!(manager.execute(&Command::get("k"), ReplyKind::Bulk).is_err());

        connector.script.borrow_mut().refuse_connect = true;
        assert!(matches!(
            manager.execute(&Command::get("k"), ReplyKind::Bulk),
            Err(StoreError::Connection(_))
        ));
        assert_eq!(manager.state(), SessionState::Failed);

        connector.script.borrow_mut().refuse_connect = false;
        connector.push(Reply::Status("OK".into()));
        connector.push(Reply::Integer(1));
        assert!(manager.execute(&Command::exists("k"), ReplyKind::Integer).is_ok());
        assert_eq!(manager.state(), SessionState::Open);
    }

    #[test]
    fn destroy_flushes_and_stays_open() {
        let (mut manager, connector) = opened(EndpointConfig::new("h:1"));
        manager.destroy().unwrap();
        assert_eq!(connector.sent().last().map(String::as_str), Some("FLUSHDB"));
        assert_eq!(manager.state(), SessionState::Open);
    }

    #[test]
    fn close_is_idempotent() {
        let (mut manager, _connector) = opened(EndpointConfig::new("h:1"));
        manager.close();
        manager.close();
        assert_eq!(manager.state(), SessionState::Closed);
        assert!(manager.config().is_none());
    }

    #[test]
    fn clone_shares_config_but_not_session() {
        let (manager, connector) = opened(EndpointConfig::new("h:1"));
        let mut copy = manager.clone();
        assert_eq!(copy.state(), SessionState::Failed);
        connector.push(Reply::Status("OK".into()));
        connector.push(Reply::Integer(1));
        assert!(copy.execute(&Command::exists("k"), ReplyKind::Integer).is_ok());
        assert_eq!(connector.connects(), 2);
        assert_eq!(manager.state(), SessionState::Open);
    }
}
