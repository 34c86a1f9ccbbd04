//! Connection lifecycle management.
//!
//! [`ConnectionManager`] owns the single live backend handle of an application. It is an
//! ordinary value: construct it once at startup, pass it (or a reference to it) to the
//! collection factories, and close it at shutdown.
//!
//! # State machine
//!
//! ```text
//!  Disconnected --connect()--> Connecting --first success--> Connected
//!        ^                          |                             |
//!        +------retries exhausted---+                             |
//!        +---------------------------close()----------------------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docbind::{config::ConnectionConfig, connection::ConnectionManager, memory::InMemoryConnector};
//!
//! let manager = ConnectionManager::new(InMemoryConnector::new());
//! manager.connect(&ConnectionConfig::new("memory://app")).await?;
//! assert!(manager.connection_status());
//! manager.close(false).await?;
//! ```

use mea::mutex::Mutex as AsyncMutex;
use parking_lot::{Mutex, RwLock};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{debug, info, warn};

use crate::{
    backend::{StoreBackend, StoreConnector},
    config::ConnectionConfig,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Lifecycle state reported by [`ConnectionManager::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle: never connected, closed, or the last connect gave up.
    Disconnected,
    /// A connect call is running its attempts.
    Connecting,
    /// A handle is available.
    Connected,
}

/// Owns the live backend handle and the retry policy used to obtain it.
///
/// Concurrent `connect` calls are serialized: the first one to obtain a handle wins
/// and the others return that handle without opening a new connection.
pub struct ConnectionManager<C: StoreConnector> {
    connector: C,
    handle: RwLock<Option<Arc<C::Backend>>>,
    connecting: AtomicBool,
    failures: Mutex<Vec<String>>,
    connect_lock: AsyncMutex<()>,
}

impl<C: StoreConnector> ConnectionManager<C> {
    /// Creates a disconnected manager that will use `connector` to open connections.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            handle: RwLock::new(None),
            connecting: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
            connect_lock: AsyncMutex::new(()),
        }
    }

    /// Returns the connector used for new connections.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connects to the store, retrying with a fixed delay.
    ///
    /// Attempts run one at a time until a handle is obtained or
    /// [`ConnectionConfig::effective_attempts`] is exhausted. After every failed attempt
    /// the failure is recorded and the call sleeps for
    /// [`ConnectionConfig::retry_wait`] unless the wait is zero.
    ///
    /// Calling `connect` while connected returns the existing handle.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Connection`] wrapping the last failure when every
    ///   attempt failed.
    /// - [`DocumentStoreError::ConnectionUnavailable`] when no attempt reported a failure
    ///   and no handle was obtained.
    pub async fn connect(&self, config: &ConnectionConfig) -> DocumentStoreResult<Arc<C::Backend>> {
        let _guard = self.connect_lock.lock().await;

        let existing = self.handle.read().clone();
        if let Some(handle) = existing {
            debug!("connect called while connected, reusing the existing handle");
            return Ok(handle);
        }

        let _connecting = ConnectingGuard::enter(&self.connecting);

        self.run_attempts(config).await
    }

    async fn run_attempts(&self, config: &ConnectionConfig) -> DocumentStoreResult<Arc<C::Backend>> {
        let options = config.transport_options();
        let max_attempts = config.effective_attempts();
        let retry_wait = config.retry_wait();

        let mut attempt: u32 = 0;
        let mut last_error = None;
        let mut handle = None;

        self.failures.lock().clear();

        while attempt < max_attempts && handle.is_none() {
            match self.connector.connect(&config.uri, &options).await {
                Ok(backend) => handle = Some(Arc::new(backend)),
                Err(err) => {
                    attempt += 1;
                    warn!(attempt, max_attempts, error = %err, "database connection attempt failed");
                    self.failures.lock().push(err.to_string());
                    last_error = Some(err);

                    if let Some(wait) = retry_wait {
                        info!(attempt, wait_seconds = wait.as_secs(), "retrying database connection");
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        match (handle, last_error) {
            (Some(handle), _) => {
                *self.handle.write() = Some(handle.clone());
                info!(failed_attempts = attempt, "database connection established");
                Ok(handle)
            }
            (None, Some(err)) => Err(DocumentStoreError::Connection {
                attempts: attempt,
                source: Box::new(err),
            }),
            (None, None) => Err(DocumentStoreError::ConnectionUnavailable),
        }
    }

    /// Closes the connection and clears the handle.
    ///
    /// Does nothing when no handle exists, so calling it twice is safe. When the backend
    /// fails to close, the handle is kept so the caller can retry.
    pub async fn close(&self, force: bool) -> DocumentStoreResult<()> {
        let handle = self.handle.read().clone();

        let Some(backend) = handle else {
            debug!("close called without an open connection");
            return Ok(());
        };

        backend.close(force).await?;

        let mut slot = self.handle.write();
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &backend)) {
            *slot = None;
        }
        drop(slot);

        info!(force, "database connection closed");

        Ok(())
    }

    /// Returns `true` when a handle exists and the backend reports it is connected.
    pub fn connection_status(&self) -> bool {
        self.handle
            .read()
            .as_ref()
            .is_some_and(|backend| backend.is_connected())
    }

    /// Returns the active handle.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::NotInitialized`] until `connect` has succeeded, and again
    /// after `close`.
    pub fn handle(&self) -> DocumentStoreResult<Arc<C::Backend>> {
        self.handle
            .read()
            .clone()
            .ok_or(DocumentStoreError::NotInitialized)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        if self.connecting.load(Ordering::SeqCst) {
            ConnectionState::Connecting
        } else if self.handle.read().is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Failures recorded by the most recent `connect` that ran attempts, oldest first.
    pub fn failed_attempts(&self) -> Vec<String> {
        self.failures.lock().clone()
    }
}

/// Keeps [`ConnectionManager::state`] at `Connecting` for as long as it lives.
///
/// Clearing the flag on drop covers a `connect` future dropped mid-attempt, e.g. by an
/// outer timeout.
struct ConnectingGuard<'a>(&'a AtomicBool);

impl<'a> ConnectingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bson::{Document as BsonDocument, oid::ObjectId};
    use futures::StreamExt;
    use std::{sync::atomic::AtomicU32, time::Duration};
    use tokio::time::{Instant, timeout};

    use super::*;
    use crate::{
        config::TransportOptions,
        index::IndexSpec,
        query::{DocumentCursor, SearchQuery},
    };

    #[derive(Debug, Default)]
    struct StubBackend {
        closed: AtomicBool,
        unreachable: AtomicBool,
        refuse_close: AtomicBool,
    }

    #[async_trait]
    impl StoreBackend for StubBackend {
        async fn insert_document(&self, _: &str, _: BsonDocument) -> DocumentStoreResult<ObjectId> {
            Ok(ObjectId::new())
        }

        async fn upsert_document(&self, _: &str, _: &ObjectId, _: BsonDocument) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn get_document(&self, _: &str, _: &ObjectId) -> DocumentStoreResult<Option<BsonDocument>> {
            Ok(None)
        }

        async fn create_indexes(&self, _: &str, _: Vec<IndexSpec>) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn search(&self, _: &str, _: SearchQuery) -> DocumentStoreResult<DocumentCursor> {
            Ok(futures::stream::empty().boxed())
        }

        fn is_connected(&self) -> bool {
            !self.closed.load(Ordering::SeqCst) && !self.unreachable.load(Ordering::SeqCst)
        }

        async fn close(&self, _force: bool) -> DocumentStoreResult<()> {
            if self.refuse_close.load(Ordering::SeqCst) {
                return Err(DocumentStoreError::Backend("shutdown refused".to_string()));
            }

            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails the first `failures` attempts, then connects.
    struct ScriptedConnector {
        failures: u32,
        calls: AtomicU32,
    }

    impl ScriptedConnector {
        fn failing(failures: u32) -> Self {
            Self { failures, calls: AtomicU32::new(0) }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StoreConnector for ScriptedConnector {
        type Backend = StubBackend;

        async fn connect(&self, _uri: &str, _options: &TransportOptions) -> DocumentStoreResult<StubBackend> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            if call <= self.failures {
                return Err(DocumentStoreError::Initialization(format!("refused #{call}")));
            }

            Ok(StubBackend::default())
        }
    }

    fn config(wait: u64, attempts: i64) -> ConnectionConfig {
        ConnectionConfig::builder("stub://db")
            .retry_wait_seconds(wait)
            .retry_max_attempts(attempts)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures_without_sleeping() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(2));
        let started = Instant::now();

        manager.connect(&config(0, 3)).await.unwrap();

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(manager.failed_attempts(), vec![
            "Initialization error: refused #1".to_string(),
            "Initialization error: refused #2".to_string(),
        ]);
        assert_eq!(manager.connector().calls(), 3);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.connection_status());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(0));

        manager.connect(&config(0, 10)).await.unwrap();

        assert_eq!(manager.connector().calls(), 1);
        assert!(manager.failed_attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_wrap_the_last_failure() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(u32::MAX));
        let started = Instant::now();

        let err = manager.connect(&config(2, 3)).await.unwrap_err();

        match err {
            DocumentStoreError::Connection { attempts, source } => {
                assert_eq!(attempts, 3);
                assert_eq!(source.to_string(), "Initialization error: refused #3");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.connection_status());
        assert!(matches!(manager.handle(), Err(DocumentStoreError::NotInitialized)));
    }

    #[tokio::test(start_paused = true)]
    async fn non_positive_attempts_still_try_once() {
        for attempts in [0, -3] {
            let manager = ConnectionManager::new(ScriptedConnector::failing(u32::MAX));

            let err = manager.connect(&config(0, attempts)).await.unwrap_err();

            assert!(matches!(err, DocumentStoreError::Connection { attempts: 1, .. }));
            assert_eq!(manager.connector().calls(), 1);
        }
    }

    #[tokio::test]
    async fn connect_while_connected_reuses_the_handle() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(0));

        let first = manager.connect(&config(0, 1)).await.unwrap();
        let second = manager.connect(&config(0, 1)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.connector().calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_handle() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(0));
        let config = config(0, 1);

        let (first, second) = tokio::join!(manager.connect(&config), manager.connect(&config));

        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(manager.connector().calls(), 1);
    }

    #[tokio::test]
    async fn handle_requires_a_connection() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(0));

        assert!(matches!(manager.handle(), Err(DocumentStoreError::NotInitialized)));
        assert!(!manager.connection_status());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_allows_reconnect() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(0));
        let first = manager.connect(&config(0, 1)).await.unwrap();

        manager.close(false).await.unwrap();
        assert!(!manager.connection_status());
        assert!(!first.is_connected());

        manager.close(true).await.unwrap();
        assert!(!manager.connection_status());
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        let second = manager.connect(&config(0, 1)).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(manager.connection_status());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_connect_returns_to_disconnected() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(u32::MAX));

        let outcome = timeout(Duration::from_secs(1), manager.connect(&config(5, 3))).await;

        assert!(outcome.is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.failed_attempts(), vec!["Initialization error: refused #1".to_string()]);
        assert!(matches!(manager.handle(), Err(DocumentStoreError::NotInitialized)));
    }

    #[tokio::test]
    async fn failed_close_keeps_the_handle() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(0));
        let backend = manager.connect(&config(0, 1)).await.unwrap();
        backend.refuse_close.store(true, Ordering::SeqCst);

        let err = manager.close(false).await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::Backend(_)));
        assert!(Arc::ptr_eq(&manager.handle().unwrap(), &backend));
        assert_eq!(manager.state(), ConnectionState::Connected);

        backend.refuse_close.store(false, Ordering::SeqCst);
        manager.close(false).await.unwrap();
        assert!(matches!(manager.handle(), Err(DocumentStoreError::NotInitialized)));
    }

    #[tokio::test]
    async fn status_follows_the_backend_report() {
        let manager = ConnectionManager::new(ScriptedConnector::failing(0));
        let backend = manager.connect(&config(0, 1)).await.unwrap();
        assert!(manager.connection_status());

        backend.unreachable.store(true, Ordering::SeqCst);
        assert!(!manager.connection_status());
        assert!(manager.handle().is_ok());

        backend.unreachable.store(false, Ordering::SeqCst);
        assert!(manager.connection_status());
    }
}
