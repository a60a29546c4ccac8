//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて run の実行を組み立てます。
//!
//! # 主要コンポーネント
//! - **ProberBuilder**: エンジンの構築とワイヤリング
//! - **Prober**: run の起動、coordinator による監督
//! - **WorkerLoop**: lease→throttle→probe→classify→complete/reschedule
//! - **OutageGuard**: 連続した Unavailable で run を打ち切る
//! - **ProgressStream / RunCompletion**: run の呼び出し側ハンドル

pub mod builder;
mod outage;
pub mod progress;
pub mod runtime;
mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ProberBuilder};
pub use self::progress::{ProgressStream, RunCompletion, RunHandle};
pub use self::runtime::Prober;
