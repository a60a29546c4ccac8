//! ProberBuilder - エンジンの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 必須の port が無い、設定が不正なら build() で失敗

use std::sync::Arc;

use super::runtime::Prober;
use crate::config::ProberConfig;
use crate::domain::{Decider, DefaultDecider};
use crate::error::ConfigError;
use crate::ports::{CandidateSource, IdGenerator, ProbeTransport, SystemClock, UlidGenerator};
use crate::throttle::Throttle;

/// ProberBuilder は Prober を構築
///
/// # 使用例
/// ```ignore
/// let prober = ProberBuilder::new()
///     .transport(TelegramTransport::new(settings)?)
///     .candidate_source(JsonFileCandidateSource::new("users.json"))
///     .config(ProberConfig::from_env()?)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - transport / candidate_source は必須
/// - build() 時に ProberConfig::validate() を通す
pub struct ProberBuilder {
    transport: Option<Arc<dyn ProbeTransport>>,
    source: Option<Arc<dyn CandidateSource>>,
    decider: Option<Arc<dyn Decider>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    config: ProberConfig,
}

/// BuildError はエンジン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no probe transport configured; call .transport(..) before build()")]
    MissingTransport,

    #[error("no candidate source configured; call .candidate_source(..) before build()")]
    MissingCandidateSource,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl ProberBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            source: None,
            decider: None,
            id_generator: None,
            config: ProberConfig::default(),
        }
    }

    pub fn transport(mut self, transport: impl ProbeTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn ProbeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn candidate_source(mut self, source: impl CandidateSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn config(mut self, config: ProberConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the retry decision. Defaults to [`DefaultDecider`] over
    /// `config.retry`.
    pub fn decider(mut self, decider: impl Decider + 'static) -> Self {
        self.decider = Some(Arc::new(decider));
        self
    }

    /// Defaults to ULIDs stamped by the system clock.
    pub fn id_generator(mut self, id_generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Arc::new(id_generator));
        self
    }

    pub fn build(self) -> Result<Prober, BuildError> {
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        let source = self.source.ok_or(BuildError::MissingCandidateSource)?;
        self.config.validate()?;

        let decider = self
            .decider
            .unwrap_or_else(|| Arc::new(DefaultDecider::new(self.config.retry.clone())));
        let id_generator = self
            .id_generator
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));

        Ok(Prober {
            transport,
            source,
            decider,
            id_generator,
            throttle: Arc::new(Throttle::new(&self.config.throttle)),
            config: self.config,
        })
    }
}

impl Default for ProberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CandidateFilter, CandidateId};
    use crate::ports::{ProbeAck, ProbeResult, SourceError};
    use async_trait::async_trait;

    struct AlwaysAlive;

    #[async_trait]
    impl ProbeTransport for AlwaysAlive {
        async fn probe(&self, _id: CandidateId) -> ProbeResult {
            Ok(ProbeAck)
        }
    }

    struct NoCandidates;

    #[async_trait]
    impl CandidateSource for NoCandidates {
        async fn list_candidates(
            &self,
            _filter: CandidateFilter,
        ) -> Result<Vec<CandidateId>, SourceError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_build_success() {
        let prober = ProberBuilder::new()
            .transport(AlwaysAlive)
            .candidate_source(NoCandidates)
            .build();
        assert!(prober.is_ok());
    }

    #[test]
    fn test_build_missing_transport() {
        let prober = ProberBuilder::new().candidate_source(NoCandidates).build();
        assert!(matches!(prober, Err(BuildError::MissingTransport)));
    }

    #[test]
    fn test_build_missing_candidate_source() {
        let prober = ProberBuilder::new().transport(AlwaysAlive).build();
        assert!(matches!(prober, Err(BuildError::MissingCandidateSource)));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let prober = ProberBuilder::new()
            .transport(AlwaysAlive)
            .candidate_source(NoCandidates)
            .config(ProberConfig {
                workers: 0,
                ..ProberConfig::default()
            })
            .build();
        assert!(matches!(
            prober,
            Err(BuildError::InvalidConfig(ConfigError::TooSmall { field: "workers", .. }))
        ));
    }
}
