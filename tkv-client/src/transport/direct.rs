//! Direct single-node transport: one TCP stream speaking RESP2.

use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::command::Command;
use crate::config::NodeAddr;
use crate::error::{ClientError, ClientResult};
use crate::reply::Reply;
use crate::resp::{encode_command, read_reply};
use crate::transport::Transport;

/// Single TCP connection with reusable buffers.
///
/// The buffers live on the connection to avoid per-call allocations.
pub struct DirectTransport {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl DirectTransport {
    /// Connects with `timeout` bounding the connect and every later read/write.
    pub fn connect(node: &NodeAddr, timeout: Duration) -> ClientResult<Self> {
        let stream = connect_stream(node, timeout)?;
        if !timeout.is_zero() {
            stream.set_read_timeout(Some(timeout))?;
            stream.set_write_timeout(Some(timeout))?;
        }
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        debug!(node = %node, "connected to store");

        Ok(DirectTransport {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        })
    }
}

impl Transport for DirectTransport {
    fn execute(&mut self, command: &Command) -> ClientResult<Reply> {
        self.write_buf.clear();
        encode_command(&command.byte_args(), &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_reply(&mut self.reader, &mut self.line_buf)
    }
}

fn connect_stream(node: &NodeAddr, timeout: Duration) -> ClientResult<TcpStream> {
    let addrs: Vec<SocketAddr> = (node.host.as_str(), node.port)
        .to_socket_addrs()
        .map_err(|_| ClientError::InvalidAddress(node.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(ClientError::InvalidAddress(node.to_string()));
    }

    // Try each resolved address in turn; report the last failure.
    let mut last_err = None;
    for addr in addrs {
        let attempt = if timeout.is_zero() {
            TcpStream::connect(addr)
        } else {
            TcpStream::connect_timeout(&addr, timeout)
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err
        .map(ClientError::Io)
        .unwrap_or_else(|| ClientError::InvalidAddress(node.to_string())))
}
