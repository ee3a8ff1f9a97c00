//! # Store Client
//!
//! Purpose: Expose the typed operation surface over the connection manager.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `StoreClient` hides commands, codec and reconnects.
//! 2. **Boolean Surface**: Operations report success as `bool` or `Option`;
//!    the failure itself is kept in `last_error` for diagnostics.
//! 3. **Per-Key Batches**: Batches issue one command per key, attempt every
//!    key, and succeed only if all keys did.
//! 4. **Exclusive Use**: Every call takes `&mut self`; share a client across
//!    threads only behind a mutex.

use crate::codec::{self, Storable, TypedValue, ValueKind};
use crate::command::Command;
use crate::config::EndpointConfig;
use crate::error::{StoreError, StoreResult};
use crate::manager::{ConnectionManager, SessionState};
use crate::reply::ReplyKind;
use crate::transport::{Connector, TcpConnector};

/// Typed client for a single store node or a cluster.
///
/// ```no_run
/// use tkv_client::{EndpointConfig, StoreClient};
///
/// let mut client = StoreClient::new();
/// if client.open(EndpointConfig::new("127.0.0.1:6379")) {
///     client.set("visits", 41u32);
///     let visits: Option<u32> = client.get_as("visits");
///     client.queue_push_back("jobs", "resize:42");
/// }
/// ```
pub struct StoreClient<C: Connector = TcpConnector> {
    manager: ConnectionManager<C>,
    last_error: Option<StoreError>,
}

impl StoreClient<TcpConnector> {
    pub fn new() -> Self {
        Self::with_connector(TcpConnector)
    }
}

impl Default for StoreClient<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> StoreClient<C> {
    /// Creates a client that builds its transports with `connector`.
    pub fn with_connector(connector: C) -> Self {
        StoreClient {
            manager: ConnectionManager::with_connector(connector),
            last_error: None,
        }
    }

    /// Logs in with `config`, replacing any previous session.
    pub fn open(&mut self, config: EndpointConfig) -> bool {
        let result = self.manager.open(config);
        self.settle(result).is_some()
    }

    pub fn close(&mut self) {
        self.manager.close();
    }

    /// Removes every key in the selected table.
    pub fn destroy(&mut self) -> bool {
        let result = self.manager.destroy();
        self.settle(result).is_some()
    }

    pub fn exists(&mut self, key: &str) -> bool {
        self.apply(Command::exists(key), ReplyKind::Integer)
    }

    /// Returns the keys matching `pattern`, possibly none.
    ///
    /// Always `None` in cluster mode, without contacting the store.
    pub fn search(&mut self, pattern: &str) -> Option<Vec<String>> {
        let result = if self.manager.supports_pattern_scan() {
            self.manager
                .execute(&Command::keys(pattern), ReplyKind::Array)
                .map(|payload| payload.into_list().unwrap_or_default())
        } else {
            Err(StoreError::Unsupported("pattern search"))
        };
        self.settle(result)
    }

    /// True when the key existed and was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.apply(Command::del(key), ReplyKind::Integer)
    }

    pub fn delete_many<I, S>(&mut self, keys: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.apply_each(keys, Command::del)
    }

    /// True when the key exists and no longer has a time-to-live, including
    /// keys that never had one.
    pub fn persist(&mut self, key: &str) -> bool {
        let result = self.persist_key(key);
        self.settle(result).is_some()
    }

    pub fn persist_many<I, S>(&mut self, keys: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut total = 0;
        let mut failed = 0;
        for key in keys {
            total += 1;
            if self.persist_key(key.as_ref()).is_err() {
                failed += 1;
            }
        }
        self.finish_batch(failed, total)
    }

    /// True when the key exists and now expires in `seconds`.
    pub fn expire(&mut self, key: &str, seconds: i64) -> bool {
        self.apply(Command::expire(key, seconds), ReplyKind::Integer)
    }

    pub fn expire_many<I, S>(&mut self, keys: I, seconds: i64) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.apply_each(keys, |key| Command::expire(key, seconds))
    }

    pub fn set(&mut self, key: &str, value: impl Into<TypedValue>) -> bool {
        self.apply(Command::set(key, &value.into()), ReplyKind::Status)
    }

    /// Reads the key and decodes it as `kind`. `None` when the key is
    /// missing, the text does not decode, or the store is unreachable.
    pub fn get(&mut self, key: &str, kind: ValueKind) -> Option<TypedValue> {
        let result = self.fetch(Command::get(key), kind);
        self.settle(result)
    }

    pub fn get_as<T: Storable>(&mut self, key: &str) -> Option<T> {
        self.get(key, T::KIND).and_then(T::from_value)
    }

    pub fn queue_push_back(&mut self, queue: &str, value: impl Into<TypedValue>) -> bool {
        self.apply(Command::rpush(queue, &value.into()), ReplyKind::Integer)
    }

    /// Pushes every value in order. Keeps going after a failed push.
    pub fn queue_push_all<'a, I>(&mut self, queue: &str, values: I) -> bool
    where
        I: IntoIterator<Item = &'a TypedValue>,
    {
        let batch = codec::encode_all(values);
        let total = batch.items.len() + batch.failures;
        let mut failed = batch.failures;
        for text in batch.items {
            let result = self
                .manager
                .execute(&Command::rpush_text(queue, text), ReplyKind::Integer);
            if result.is_err() {
                failed += 1;
            }
        }
        self.finish_batch(failed, total)
    }

    /// Pops the oldest element. `None` when the queue is empty or absent.
    ///
    /// The element is removed before it is decoded. If it does not decode as
    /// `kind`, it is gone from the queue and its text is kept in
    /// [`StoreError::Codec`] via [`last_error`](Self::last_error).
    pub fn queue_pop_front(&mut self, queue: &str, kind: ValueKind) -> Option<TypedValue> {
        let result = self.fetch(Command::lpop(queue), kind);
        self.settle(result)
    }

    pub fn queue_pop_front_as<T: Storable>(&mut self, queue: &str) -> Option<T> {
        self.queue_pop_front(queue, T::KIND).and_then(T::from_value)
    }

    /// Deletes the queue. False when there was nothing to delete.
    pub fn queue_clear(&mut self, queue: &str) -> bool {
        self.apply(Command::del(queue), ReplyKind::Integer)
    }

    /// Failure of the most recent operation, if it failed.
    pub fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.manager.state()
    }

    pub fn is_cluster(&self) -> bool {
        self.manager.is_cluster()
    }

    pub fn config(&self) -> Option<&EndpointConfig> {
        self.manager.config()
    }

    fn apply(&mut self, command: Command, expected: ReplyKind) -> bool {
        let result = self.manager.execute(&command, expected);
        self.settle(result).is_some()
    }

    fn fetch(&mut self, command: Command, kind: ValueKind) -> StoreResult<TypedValue> {
        let text = self
            .manager
            .execute(&command, ReplyKind::Bulk)?
            .into_text()
            .unwrap_or_default();
        Ok(codec::decode(&text, kind)?)
    }

    // PERSIST answers 0 for a key without a TTL; that key is still persistent.
    fn persist_key(&mut self, key: &str) -> StoreResult<()> {
        match self.manager.execute(&Command::persist(key), ReplyKind::Integer) {
            Ok(_) => Ok(()),
            Err(StoreError::Rejected { .. }) => self
                .manager
                .execute(&Command::exists(key), ReplyKind::Integer)
                .map(|_| ()),
            Err(err) => Err(err),
        }
    }

    fn apply_each<I, S, F>(&mut self, keys: I, build: F) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Command,
    {
        let mut total = 0;
        let mut failed = 0;
        for key in keys {
            total += 1;
            if self
                .manager
                .execute(&build(key.as_ref()), ReplyKind::Integer)
                .is_err()
            {
                failed += 1;
            }
        }
        self.finish_batch(failed, total)
    }

    fn finish_batch(&mut self, failed: usize, total: usize) -> bool {
        let result = if failed == 0 {
            Ok(())
        } else {
            Err(StoreError::PartialBatch { failed, total })
        };
        self.settle(result).is_some()
    }

    fn settle<T>(&mut self, result: StoreResult<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(err) => {
                self.last_error = Some(err);
                None
            }
        }
    }
}

impl<C: Connector + Clone> Clone for StoreClient<C> {
    /// An independent handle on the same endpoint. It opens its own session on
    /// first use.
    fn clone(&self) -> Self {
        StoreClient {
            manager: self.manager.clone(),
            last_error: None,
        }
    }
}

impl<C: Connector> Drop for StoreClient<C> {
    fn drop(&mut self) {
        self.manager.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::manager::tests::ScriptedConnector;
    use crate::reply::Reply;

    fn opened(address: &str) -> (StoreClient<ScriptedConnector>, ScriptedConnector) {
        let connector = ScriptedConnector::default();
        let mut client = StoreClient::with_connector(connector.clone());
        assert!(client.open(EndpointConfig::new(address)));
        (client, connector)
    }

    #[test]
    fn operations_fail_before_open() {
        let mut client = StoreClient::with_connector(ScriptedConnector::default());
        assert!(!client.exists("k"));
        assert!(matches!(client.last_error(), Some(StoreError::NotOpen)));
        assert!(client.get("k", ValueKind::Str).is_none());
    }

    #[test]
    fn typed_get_decodes_or_reports_codec_error() {
        let (mut client, connector) = opened("h:1");
        connector.push(Reply::Bulk(b"-12".to_vec()));
        assert_eq!(client.get_as::<i16>("n"), Some(-12));

        connector.push(Reply::Bulk(b"12.5".to_vec()));
        assert_eq!(client.get_as::<i16>("n"), None);
        assert!(matches!(client.last_error(), Some(StoreError::Codec(_))));
        assert_eq!(client.state(), SessionState::Open);
    }

    #[test]
    fn undecodable_pop_keeps_raw_text() {
        let (mut client, connector) = opened("h:1");
        connector.push(Reply::Bulk(b"not-a-number".to_vec()));
        assert_eq!(client.queue_pop_front_as::<u32>("q"), None);
        match client.last_error() {
            Some(StoreError::Codec(CodecError::Invalid { kind, text })) => {
                assert_eq!(*kind, ValueKind::U32);
                assert_eq!(text, "not-a-number");
            }
            other => panic!("expected codec error, got {other:?}"),
        }
        assert_eq!(connector.sent().last().map(String::as_str), Some("LPOP q"));
    }

    #[test]
    fn batch_attempts_every_key() {
        let (mut client, connector) = opened("h:1");
        connector.push(Reply::Integer(0));
        connector.push(Reply::Integer(1));
        connector.push(Reply::Integer(1));
        assert!(!client.delete_many(["a", "b", "c"]));
        assert!(matches!(
            client.last_error(),
            Some(StoreError::PartialBatch { failed: 1, total: 3 })
        ));
        assert_eq!(connector.sent()[1..], ["DEL a", "DEL b", "DEL c"]);
    }

    #[test]
    fn persist_falls_back_to_exists() {
        let (mut client, connector) = opened("h:1");
        connector.push(Reply::Integer(0));
        connector.push(Reply::Integer(1));
        assert!(client.persist("plain"));
        connector.push(Reply::Integer(0));
        connector.push(Reply::Integer(0));
        assert!(!client.persist("missing"));
        assert_eq!(
            connector.sent()[1..],
            ["PERSIST plain", "EXISTS plain", "PERSIST missing", "EXISTS missing"]
        );
    }

    #[test]
    fn empty_batch_succeeds() {
        let (mut client, connector) = opened("h:1");
        assert!(client.expire_many(Vec::<String>::new(), 10));
        assert_eq!(connector.sent(), ["SELECT 0"]);
    }

    #[test]
    fn search_in_cluster_mode_sends_nothing() {
        let (mut client, connector) = opened("a:1,b:2");
        assert!(client.search("*").is_none());
        assert!(matches!(client.last_error(), Some(StoreError::Unsupported(_))));
        assert!(connector.sent().is_empty());
    }

    #[test]
    fn search_returns_matches_in_order() {
        let (mut client, connector) = opened("h:1");
        connector.push(Reply::Array(vec![
            Reply::Bulk(b"k2".to_vec()),
            Reply::Bulk(b"k1".to_vec()),
        ]));
        assert_eq!(client.search("k*"), Some(vec!["k2".to_string(), "k1".to_string()]));
        connector.push(Reply::Array(Vec::new()));
        assert_eq!(client.search("none*"), Some(Vec::new()));
    }

    #[test]
    fn queue_push_all_encodes_in_order() {
        let (mut client, connector) = opened("h:1");
        let values = [TypedValue::U8(1), TypedValue::Bool(true), TypedValue::from("x")];
        connector.push(Reply::Integer(1));
        connector.push(Reply::Integer(2));
        connector.push(Reply::Integer(3));
        assert!(client.queue_push_all("q", &values));
        assert_eq!(connector.sent()[1..], ["RPUSH q 1", "RPUSH q true", "RPUSH q x"]);
    }

    #[test]
    fn last_error_clears_on_success() {
        let (mut client, connector) = opened("h:1");
        connector.push(Reply::Integer(0));
        assert!(!client.exists("k"));
        assert!(matches!(client.last_error(), Some(StoreError::Rejected { .. })));
        connector.push(Reply::Integer(1));
        assert!(client.exists("k"));
        assert!(client.last_error().is_none());
    }
}
