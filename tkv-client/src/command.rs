//! # Command Builder
//!
//! One `Command` per store round trip. Multi-key operations are issued as
//! repeated single-key commands so each one routes to exactly one shard.

use std::fmt;

use crate::codec::{self, TypedValue};

/// Ordered, non-empty argument list; the first argument is the verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<String>,
    // Operands at or after this index are hidden in diagnostics.
    secret_from: Option<usize>,
}

impl Command {
    fn new(verb: &str) -> Self {
        Command {
            args: vec![verb.to_owned()],
            secret_from: None,
        }
    }

    fn arg(mut self, operand: impl Into<String>) -> Self {
        self.args.push(operand.into());
        self
    }

    pub fn get(key: &str) -> Self {
        Command::new("GET").arg(key)
    }

    pub fn set(key: &str, value: &TypedValue) -> Self {
        Command::new("SET").arg(key).arg(codec::encode(value))
    }

    pub fn exists(key: &str) -> Self {
        Command::new("EXISTS").arg(key)
    }

    pub fn keys(pattern: &str) -> Self {
        Command::new("KEYS").arg(pattern)
    }

    pub fn del(key: &str) -> Self {
        Command::new("DEL").arg(key)
    }

    pub fn persist(key: &str) -> Self {
        Command::new("PERSIST").arg(key)
    }

    pub fn expire(key: &str, seconds: i64) -> Self {
        Command::new("EXPIRE")
            .arg(key)
            .arg(codec::encode(&TypedValue::I64(seconds)))
    }

    pub fn rpush(queue: &str, value: &TypedValue) -> Self {
        Command::new("RPUSH").arg(queue).arg(codec::encode(value))
    }

    /// Same as `rpush` for a value already in canonical text.
    pub fn rpush_text(queue: &str, text: String) -> Self {
        Command::new("RPUSH").arg(queue).arg(text)
    }

    pub fn lpop(queue: &str) -> Self {
        Command::new("LPOP").arg(queue)
    }

    pub fn auth(password: &str) -> Self {
        let mut command = Command::new("AUTH").arg(password);
        command.secret_from = Some(1);
        command
    }

    pub fn select(table: u16) -> Self {
        Command::new("SELECT").arg(codec::encode(&TypedValue::U16(table)))
    }

    pub fn flushdb() -> Self {
        Command::new("FLUSHDB")
    }

    /// Command name.
    pub fn verb(&self) -> &str {
        &self.args[0]
    }

    /// All arguments, verb first.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Arguments as byte slices for RESP framing.
    pub fn byte_args(&self) -> Vec<&[u8]> {
        self.args.iter().map(|arg| arg.as_bytes()).collect()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())?;
        for (idx, arg) in self.args.iter().enumerate().skip(1) {
            match self.secret_from {
                Some(from) if idx >= from => f.write_str(" \"******\"")?,
                _ => write!(f, " \"{}\"", arg)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_single_key_commands() {
        assert_eq!(Command::get("k").args(), ["GET", "k"]);
        assert_eq!(Command::exists("k").args(), ["EXISTS", "k"]);
        assert_eq!(Command::del("k").args(), ["DEL", "k"]);
        assert_eq!(Command::persist("k").args(), ["PERSIST", "k"]);
        assert_eq!(Command::lpop("q").args(), ["LPOP", "q"]);
        assert_eq!(Command::keys("k*").args(), ["KEYS", "k*"]);
        assert_eq!(Command::flushdb().args(), ["FLUSHDB"]);
    }

    #[test]
    fn renders_operands_through_codec() {
        assert_eq!(Command::expire("k", 3600).args(), ["EXPIRE", "k", "3600"]);
        assert_eq!(Command::select(5).args(), ["SELECT", "5"]);
        assert_eq!(
            Command::set("k", &TypedValue::Bool(true)).args(),
            ["SET", "k", "true"]
        );
        assert_eq!(
            Command::rpush("q", &TypedValue::F64(-2.25)).args(),
            ["RPUSH", "q", "-2.25"]
        );
    }

    #[test]
    fn display_quotes_operands_and_masks_password() {
        let set = Command::set("a b", &TypedValue::from("v"));
        assert_eq!(set.to_string(), "SET \"a b\" \"v\"");
        let auth = Command::auth("hunter2");
        assert_eq!(auth.to_string(), "AUTH \"******\"");
        assert_eq!(auth.args()[1], "hunter2");
    }

    #[test]
    fn byte_args_match_text() {
        let cmd = Command::get("key");
        assert_eq!(cmd.byte_args(), vec![&b"GET"[..], &b"key"[..]]);
    }
}
