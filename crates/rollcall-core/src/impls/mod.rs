//! Impls - port の実装
//!
//! - **TelegramTransport**: Bot API 経由の到達確認（本番用）
//! - **InMemoryCandidateSource**: 固定リスト（テスト・デモ用）
//! - **JsonFileCandidateSource**: ユーザー DB の JSON エクスポート

pub mod candidates;
pub mod telegram;

pub use self::candidates::{CandidateRecord, InMemoryCandidateSource, JsonFileCandidateSource};
pub use self::telegram::{TelegramSettings, TelegramTransport};
