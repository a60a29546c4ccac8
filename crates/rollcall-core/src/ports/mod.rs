//! Ports - 抽象化レイヤー
//!
//! 外部システム（ユーザー DB、Telegram Bot API）への境界を trait として定義し、
//! エンジン本体は実装の詳細を知らない。実装は `impls` にある。

pub mod candidate_source;
pub mod clock;
pub mod id_generator;
pub mod transport;

pub use self::candidate_source::{CandidateSource, SourceError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::transport::{ProbeAck, ProbeResult, ProbeTransport, TransportError};
