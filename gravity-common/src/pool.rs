//! Lazily connected pooled handle shared by the database and cache clients.
//!
//! A [`PooledResource`] is either [`ConnectionState::Disconnected`] or
//! [`ConnectionState::Connected`]. Any operation from `Disconnected` opens the
//! handle first; `disconnect` releases it and the resource may be reconnected
//! any number of times afterwards.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Lifecycle state of a [`PooledResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle exists
    Disconnected,
    /// A pooled handle is open
    Connected,
}

/// Opens, probes and releases pooled handles to a backing store.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Pooled handle produced by [`Connector::open`].
    type Handle: Send + Sync + 'static;

    /// Short name of the backing store, used in log fields.
    fn name(&self) -> &'static str;

    /// Create a new pooled handle.
    async fn open(&self) -> Result<Self::Handle>;

    /// Minimal round trip confirming reachability.
    async fn ping(&self, handle: &Self::Handle) -> Result<()>;

    /// Release the handle's pooled connections.
    async fn close(&self, handle: &Self::Handle);
}

/// A pooled handle created on first use.
///
/// The write side of the internal lock is the only path that creates a
/// handle, and it re-checks the slot after acquiring, so concurrent first
/// operations open exactly one pool.
pub struct PooledResource<C: Connector> {
    connector: C,
    handle: RwLock<Option<Arc<C::Handle>>>,
}

impl<C: Connector> PooledResource<C> {
    /// Create a disconnected resource.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            handle: RwLock::new(None),
        }
    }

    /// The connector backing this resource.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Open the handle if absent. No-op when already connected.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if the handle cannot be created.
    pub async fn connect(&self) -> Result<()> {
        self.handle().await.map(|_| ())
    }

    /// Current handle, connecting first if necessary.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if the handle cannot be created.
    pub async fn handle(&self) -> Result<Arc<C::Handle>> {
        if let Some(handle) = self.handle.read().await.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let mut slot = self.handle.write().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(self.connector.open().await?);
        debug!(store = self.connector.name(), "Pooled handle opened");
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Release the handle and return to `Disconnected`. Idempotent.
    pub async fn disconnect(&self) {
        let taken = self.handle.write().await.take();
        if let Some(handle) = taken {
            self.connector.close(&handle).await;
            debug!(store = self.connector.name(), "Pooled handle closed");
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        if self.handle.read().await.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Whether a handle is currently open.
    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Connect if needed and ping the store.
    ///
    /// Never fails: every error is logged and reported as `false`.
    pub async fn health_check(&self) -> bool {
        let handle = match self.handle().await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(store = self.connector.name(), error = %e, "Health check could not connect");
                return false;
            }
        };

        match self.connector.ping(&handle).await {
            Ok(()) => true,
            Err(e) => {
                warn!(store = self.connector.name(), error = %e, "Health check ping failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GravityError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingConnector {
        opened: AtomicUsize,
        closed: AtomicUsize,
        fail_open: bool,
        fail_ping: bool,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        type Handle = usize;

        fn name(&self) -> &'static str {
            "counting"
        }

        async fn open(&self) -> Result<usize> {
            if self.fail_open {
                return Err(GravityError::unavailable("store unreachable"));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(self.opened.fetch_add(1, Ordering::SeqCst))
        }

        async fn ping(&self, _handle: &usize) -> Result<()> {
            if self.fail_ping {
                return Err(GravityError::external("ping failed"));
            }
            Ok(())
        }

        async fn close(&self, _handle: &usize) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_starts_disconnected_and_connects_lazily() {
        let resource = PooledResource::new(CountingConnector::default());
        assert_eq!(resource.state().await, ConnectionState::Disconnected);

        resource.handle().await.unwrap();
        assert_eq!(resource.state().await, ConnectionState::Connected);
        assert_eq!(resource.connector().opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let resource = PooledResource::new(CountingConnector::default());
        resource.connect().await.unwrap();
        resource.connect().await.unwrap();
        assert_eq!(resource.connector().opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_opens_once() {
        let resource = Arc::new(PooledResource::new(CountingConnector::default()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let resource = Arc::clone(&resource);
                tokio::spawn(async move { resource.handle().await.map(|h| *h) })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 0);
        }
        assert_eq!(resource.connector().opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disconnect_and_reconnect() {
        let resource = PooledResource::new(CountingConnector::default());
        resource.connect().await.unwrap();

        resource.disconnect().await;
        resource.disconnect().await;
        assert_eq!(resource.state().await, ConnectionState::Disconnected);
        assert_eq!(resource.connector().closed.load(Ordering::SeqCst), 1);

        assert_eq!(*resource.handle().await.unwrap(), 1);
        assert!(resource.is_connected().await);
    }

    #[tokio::test]
    async fn test_health_check_swallows_failures() {
        let unreachable = PooledResource::new(CountingConnector {
            fail_open: true,
            ..Default::default()
        });
        assert!(!unreachable.health_check().await);
        assert!(!unreachable.is_connected().await);

        let flaky = PooledResource::new(CountingConnector {
            fail_ping: true,
            ..Default::default()
        });
        assert!(!flaky.health_check().await);

        let healthy = PooledResource::new(CountingConnector::default());
        assert!(healthy.health_check().await);
    }
}
