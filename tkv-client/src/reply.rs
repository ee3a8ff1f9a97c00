//! # Reply Classification
//!
//! Every command family expects one reply kind. `classify` maps the actual
//! reply onto one of three outcomes:
//!
//! - `Success`: the command took effect; the payload is copied out.
//! - `Miss`: a well-formed answer that reports nothing done (nil, integer 0,
//!   non-OK status). The session stays up.
//! - `Fault`: an error reply or a kind mismatch. The session is torn down.
//!
//! Integer replies succeed only when strictly positive, on both transports.

use std::fmt;

/// Reply from the store, shared by both transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// +OK style responses.
    Status(String),
    /// :123 responses.
    Integer(i64),
    /// $... bulk strings.
    Bulk(Vec<u8>),
    /// *... arrays.
    Array(Vec<Reply>),
    /// Null bulk or null array.
    Nil,
    /// -ERR ... responses.
    Error(String),
}

impl Reply {
    /// Short name of the reply kind for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Reply::Status(_) => "status",
            Reply::Integer(_) => "integer",
            Reply::Bulk(_) => "bulk",
            Reply::Array(_) => "array",
            Reply::Nil => "nil",
            Reply::Error(_) => "error",
        }
    }
}

/// Reply kind a command family expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Status,
    Integer,
    Bulk,
    Array,
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyKind::Status => "status",
            ReplyKind::Integer => "integer",
            ReplyKind::Bulk => "bulk",
            ReplyKind::Array => "array",
        };
        f.write_str(name)
    }
}

/// Data carried out of a successful reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Status and integer replies carry nothing the caller needs.
    Done,
    Text(String),
    List(Vec<String>),
}

impl Payload {
    pub fn into_text(self) -> Option<String> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<String>> {
        match self {
            Payload::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Why a reply counts as a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The store sent an error reply.
    Server(String),
    /// The reply kind (or an array element) did not match.
    Mismatch { actual: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Payload),
    Miss,
    Fault(Fault),
}

/// Classifies `reply` against the kind the command expects.
pub fn classify(reply: Reply, expected: ReplyKind) -> Outcome {
    match (expected, reply) {
        (_, Reply::Error(message)) => Outcome::Fault(Fault::Server(message)),
        (_, Reply::Nil) => Outcome::Miss,
        (ReplyKind::Status, Reply::Status(text)) => {
            if text.eq_ignore_ascii_case("ok") {
                Outcome::Success(Payload::Done)
            } else {
                Outcome::Miss
            }
        }
        (ReplyKind::Integer, Reply::Integer(value)) => {
            if value > 0 {
                Outcome::Success(Payload::Done)
            } else {
                Outcome::Miss
            }
        }
        (ReplyKind::Bulk, Reply::Bulk(data)) => {
            Outcome::Success(Payload::Text(String::from_utf8_lossy(&data).into_owned()))
        }
        (ReplyKind::Array, Reply::Array(items)) => {
            let mut texts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Reply::Bulk(data) => texts.push(String::from_utf8_lossy(&data).into_owned()),
                    Reply::Status(text) => texts.push(text),
                    other => {
                        return Outcome::Fault(Fault::Mismatch {
                            actual: other.kind_name(),
                        })
                    }
                }
            }
            Outcome::Success(Payload::List(texts))
        }
        (_, other) => Outcome::Fault(Fault::Mismatch {
            actual: other.kind_name(),
        }),
    }
}
