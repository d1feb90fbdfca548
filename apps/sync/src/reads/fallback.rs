//! Ordered fallback reads with provenance
//!
//! Read paths try a chain of strategies (full joined query, simplified query,
//! placeholder) and keep the first non-empty answer, tagged with the source
//! that produced it.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// Which strategy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Primary,
    Simplified,
    Placeholder,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Primary => "primary",
            DataSource::Simplified => "simplified",
            DataSource::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchMeta {
    pub source: DataSource,
}

/// Data plus the strategy it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fetched<T> {
    pub data: T,
    pub meta: FetchMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Empty,
    Failed(String),
}

/// One strategy that did not produce data
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub source: DataSource,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome<T> {
    Success { data: T, source: DataSource },
    Exhausted { attempts: Vec<Attempt> },
}

/// Emptiness check for strategy results
pub trait ReadResult {
    fn is_empty_result(&self) -> bool;
}

impl<T> ReadResult for Vec<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl<T> ReadResult for Option<T> {
    fn is_empty_result(&self) -> bool {
        self.is_none()
    }
}

/// One way of reading `T` for key `K`
#[async_trait]
pub trait ReadStrategy<K, T>: Send + Sync
where
    K: Sync,
{
    fn source(&self) -> DataSource;

    async fn run(&self, key: &K) -> SyncResult<T>;
}

/// Adapts an async closure over an owned key into a [`ReadStrategy`]
pub struct FnStrategy<K, F> {
    source: DataSource,
    f: F,
    _key: PhantomData<fn(K)>,
}

impl<K, F> FnStrategy<K, F> {
    pub fn new(source: DataSource, f: F) -> Self {
        Self {
            source,
            f,
            _key: PhantomData,
        }
    }
}

#[async_trait]
impl<K, T, F, Fut> ReadStrategy<K, T> for FnStrategy<K, F>
where
    K: Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut + Send + Sync,
    Fut: Future<Output = SyncResult<T>> + Send + 'static,
{
    fn source(&self) -> DataSource {
        self.source
    }

    async fn run(&self, key: &K) -> SyncResult<T> {
        (self.f)(key.clone()).await
    }
}

/// First-success combinator over an ordered strategy list
pub struct FallbackQueryReconciler<K, T> {
    entity: String,
    strategies: Vec<Box<dyn ReadStrategy<K, T>>>,
}

impl<K, T> FallbackQueryReconciler<K, T>
where
    K: fmt::Debug + Sync,
    T: ReadResult + Default + Send,
{
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl ReadStrategy<K, T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Sources in the order they are tried
    pub fn sources(&self) -> Vec<DataSource> {
        self.strategies.iter().map(|s| s.source()).collect()
    }

    /// Try each strategy in order until one returns non-empty data
    pub async fn fetch(&self, key: &K) -> FallbackOutcome<T> {
        self.fetch_from(key, |_| true).await
    }

    async fn fetch_from(
        &self,
        key: &K,
        include: impl Fn(DataSource) -> bool,
    ) -> FallbackOutcome<T> {
        let mut attempts = Vec::new();

        for strategy in self.strategies.iter().filter(|s| include(s.source())) {
            let source = strategy.source();
            match strategy.run(key).await {
                Ok(data) if !data.is_empty_result() => {
                    debug!(
                        entity = %self.entity,
                        key = ?key,
                        source = %source,
                        fallbacks = attempts.len(),
                        "Read served"
                    );
                    return FallbackOutcome::Success { data, source };
                }
                Ok(_) => {
                    debug!(
                        entity = %self.entity,
                        key = ?key,
                        source = %source,
                        "Read strategy returned nothing"
                    );
                    attempts.push(Attempt {
                        source,
                        outcome: AttemptOutcome::Empty,
                    });
                }
                Err(e) => {
                    warn!(
                        entity = %self.entity,
                        key = ?key,
                        source = %source,
                        error = %e,
                        "Read strategy failed, falling back"
                    );
                    attempts.push(Attempt {
                        source,
                        outcome: AttemptOutcome::Failed(e.to_string()),
                    });
                }
            }
        }

        FallbackOutcome::Exhausted { attempts }
    }

    /// Single-entity read; placeholder strategies are skipped
    ///
    /// # Errors
    /// - `SyncError::NotFound` - at least one strategy answered with nothing
    /// - `SyncError::SourceExhausted` - every strategy failed
    pub async fn fetch_one(&self, key: &K) -> SyncResult<Fetched<T>> {
        match self
            .fetch_from(key, |source| source != DataSource::Placeholder)
            .await
        {
            FallbackOutcome::Success { data, source } => Ok(Fetched {
                data,
                meta: FetchMeta { source },
            }),
            FallbackOutcome::Exhausted { attempts } => Err(self.exhausted_error(key, &attempts)),
        }
    }

    /// List read
    ///
    /// When every strategy answered empty the result is an empty list tagged
    /// with the last strategy that answered.
    ///
    /// # Errors
    /// `SyncError::SourceExhausted` when every strategy failed.
    pub async fn fetch_list(&self, key: &K) -> SyncResult<Fetched<T>> {
        match self.fetch(key).await {
            FallbackOutcome::Success { data, source } => Ok(Fetched {
                data,
                meta: FetchMeta { source },
            }),
            FallbackOutcome::Exhausted { attempts } => {
                match attempts
                    .iter()
                    .rev()
                    .find(|a| a.outcome == AttemptOutcome::Empty)
                {
                    Some(answered) => Ok(Fetched {
                        data: T::default(),
                        meta: FetchMeta {
                            source: answered.source,
                        },
                    }),
                    None => Err(self.exhausted_error(key, &attempts)),
                }
            }
        }
    }

    fn exhausted_error(&self, key: &K, attempts: &[Attempt]) -> SyncError {
        if attempts.iter().any(|a| a.outcome == AttemptOutcome::Empty) {
            SyncError::NotFound(format!("{} {:?}", self.entity, key))
        } else {
            SyncError::SourceExhausted {
                entity: self.entity.clone(),
                attempts: attempts.len(),
            }
        }
    }
}
