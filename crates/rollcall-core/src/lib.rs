//! rollcall-core
//!
//! Bulk reachability audit: probe every candidate user once through a
//! rate-limited transport, classify the answers, and stream progress.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, filter, job, outcome, aggregate, decision, report）
//! - **ports**: 抽象化レイヤー（ProbeTransport, CandidateSource, Clock, IdGenerator）
//! - **queue**: ジョブ状態・リトライ方針・インメモリキュー
//! - **throttle**: 送信レート制御
//! - **classify**: トランスポートの結果 → Outcome
//! - **aggregator**: 集計
//! - **app**: 組み立てと実行（ProberBuilder, Prober, worker loop, progress）
//! - **impls**: port の実装（Telegram, JSON ファイル, インメモリ）

pub mod aggregator;
pub mod app;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod throttle;

pub use app::{BuildError, Prober, ProberBuilder, ProgressStream, RunCompletion, RunHandle};
pub use config::ProberConfig;
pub use domain::{
    Aggregate, CandidateFilter, CandidateId, Outcome, ProgressSnapshot, RunId, RunReport,
    RunState, RunSummary, TerminalKind,
};
pub use error::{ConfigError, QueueError, RunError};
