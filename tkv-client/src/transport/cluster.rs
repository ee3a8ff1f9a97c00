//! Cluster transport: slot routing, topology refresh and redirections are
//! delegated to the `redis` cluster client.
//!
//! The sync router opens its node connections without a connect timeout, so
//! the whole login runs on a helper thread and is abandoned once the
//! configured timeout passes. The timeout also becomes the router's socket
//! read/write timeout, which it applies to every node connection it opens.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use redis::cluster::{ClusterClientBuilder, ClusterConnection};
use redis::{RedisError, RedisResult, Value};
use tracing::{debug, warn};

use crate::command::Command;
use crate::config::NodeAddr;
use crate::error::{ClientError, ClientResult};
use crate::reply::Reply;
use crate::transport::{ConnectParams, Transport};

pub struct ClusterTransport {
    connection: ClusterConnection,
}

impl ClusterTransport {
    pub fn connect(nodes: &[NodeAddr], params: &ConnectParams<'_>) -> ClientResult<Self> {
        let urls: Vec<String> = nodes.iter().map(NodeAddr::redis_url).collect();
        let mut builder = ClusterClientBuilder::new(urls);
        if let Some(username) = params.username {
            builder = builder.username(username.to_owned());
        }
        if let Some(password) = params.password {
            builder = builder.password(password.to_owned());
        }

        let client = builder.build()?;
        let timeout = router_timeout(params);
        let connection = bounded(timeout, move || {
            let connection = client.get_connection()?;
            connection.set_read_timeout(timeout)?;
            connection.set_write_timeout(timeout)?;
            Ok(connection)
        })?;
        debug!(nodes = nodes.len(), ?timeout, "connected to store cluster");
        Ok(ClusterTransport { connection })
    }
}

impl Transport for ClusterTransport {
    fn execute(&mut self, command: &Command) -> ClientResult<Reply> {
        let mut cmd = redis::cmd(command.verb());
        for arg in &command.args()[1..] {
            cmd.arg(arg.as_str());
        }

        match cmd.query::<Value>(&mut self.connection) {
            Ok(value) => Ok(from_value(value)),
            Err(err) => classify_error(err),
        }
    }
}

/// Zero means no timeout; the router rejects a zero `Duration`.
fn router_timeout(params: &ConnectParams<'_>) -> Option<Duration> {
    Some(params.timeout).filter(|timeout| !timeout.is_zero())
}

/// Runs `login` and gives up after `timeout`. A login that outlives the
/// deadline finishes on its own thread and its connection is dropped there.
fn bounded<T, F>(timeout: Option<Duration>, login: F) -> ClientResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> RedisResult<T> + Send + 'static,
{
    let Some(timeout) = timeout else {
        return Ok(login()?);
    };

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("tkv-cluster-login".into())
        .spawn(move || {
            let _ = tx.send(login());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => Ok(result?),
        Err(RecvTimeoutError::Timeout) => {
            warn!(?timeout, "cluster login timed out");
            Err(ClientError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "cluster login timed out",
            )))
        }
        Err(RecvTimeoutError::Disconnected) => Err(ClientError::Io(io::Error::new(
            io::ErrorKind::Other,
            "cluster login aborted",
        ))),
    }
}

/// Transport failures end the session; everything else the router reports
/// (server errors, exhausted redirections) is an error reply.
fn classify_error(err: RedisError) -> ClientResult<Reply> {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        Err(ClientError::Cluster(err))
    } else {
        Ok(Reply::Error(err.to_string()))
    }
}

fn from_value(value: Value) -> Reply {
    match value {
        Value::Nil => Reply::Nil,
        Value::Int(n) => Reply::Integer(n),
        Value::Data(data) => Reply::Bulk(data),
        Value::Bulk(items) => Reply::Array(items.into_iter().map(from_value).collect()),
        Value::Status(text) => Reply::Status(text),
        Value::Okay => Reply::Status("OK".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ErrorKind;

    #[test]
    fn maps_router_values_onto_replies() {
        assert_eq!(from_value(Value::Okay), Reply::Status("OK".into()));
        assert_eq!(from_value(Value::Int(-2)), Reply::Integer(-2));
        assert_eq!(from_value(Value::Nil), Reply::Nil);
        assert_eq!(
            from_value(Value::Bulk(vec![Value::Data(b"k".to_vec()), Value::Nil])),
            Reply::Array(vec![Reply::Bulk(b"k".to_vec()), Reply::Nil])
        );
    }

    #[test]
    fn zero_timeout_leaves_router_unbounded() {
        let params = ConnectParams {
            username: None,
            password: None,
            timeout: Duration::ZERO,
        };
        assert_eq!(router_timeout(&params), None);

        let params = ConnectParams {
            timeout: Duration::from_millis(250),
            ..params
        };
        assert_eq!(router_timeout(&params), Some(Duration::from_millis(250)));
    }

    #[test]
    fn slow_login_is_cut_off_at_the_timeout() {
        let result = bounded(Some(Duration::from_millis(20)), || {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        match result {
            Err(ClientError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn login_result_passes_through_the_deadline() {
        assert_eq!(bounded(Some(Duration::from_secs(5)), || Ok(7)).unwrap(), 7);
        assert_eq!(bounded(None, || Ok(8)).unwrap(), 8);

        let refused = bounded(Some(Duration::from_secs(5)), || -> RedisResult<()> {
            Err(io::Error::from(io::ErrorKind::ConnectionRefused).into())
        });
        assert!(matches!(refused, Err(ClientError::Cluster(_))));
    }

    #[test]
    fn io_failures_end_the_session() {
        let err = RedisError::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(matches!(classify_error(err), Err(ClientError::Cluster(_))));
    }

    #[test]
    fn server_errors_become_error_replies() {
        let err = RedisError::from((ErrorKind::TypeError, "WRONGTYPE"));
        match classify_error(err) {
            Ok(Reply::Error(text)) => assert!(text.contains("WRONGTYPE")),
            other => panic!("expected error reply, got {other:?}"),
        }

        let err = RedisError::from((ErrorKind::ResponseError, "ERR unknown command"));
        assert!(matches!(classify_error(err), Ok(Reply::Error(_))));
    }
}
