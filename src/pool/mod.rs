//! Bounded connection pool.
//!
//! Idle connections wait in a `crossbeam-channel` queue. A pool opens at most
//! `max_size` connections; once they are all leased, [`ConnectionSource::open`]
//! blocks on the queue until one is released or the acquisition timeout
//! expires.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::backend::{Connection, ConnectionSource};
use crate::error::{QuarryError, Result};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

type Factory = Box<dyn Fn() -> Result<Box<dyn Connection>> + Send + Sync>;

pub struct ConnectionPool {
    name: String,
    factory: Factory,
    max_size: usize,
    timeout: Duration,
    idle_tx: Sender<Box<dyn Connection>>,
    idle_rx: Receiver<Box<dyn Connection>>,
    opened: AtomicUsize,
}

impl ConnectionPool {
    /// Create a pool; `factory` opens one new connection.
    pub fn new<F>(name: impl Into<String>, max_size: usize, timeout: Duration, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Connection>> + Send + Sync + 'static,
    {
        let max_size = max_size.max(1);
        let (idle_tx, idle_rx) = bounded(max_size);
        Self {
            name: name.into(),
            factory: Box::new(factory),
            max_size,
            timeout,
            idle_tx,
            idle_rx,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Connections currently open, leased or idle.
    pub fn size(&self) -> usize {
        self.opened.load(Ordering::Acquire)
    }

    pub fn idle(&self) -> usize {
        self.idle_rx.len()
    }

    fn try_grow(&self) -> Option<Result<Box<dyn Connection>>> {
        let mut current = self.opened.load(Ordering::Acquire);
        while current < self.max_size {
            match self.opened.compare_exchange(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let opened = (self.factory)();
                    match &opened {
                        Ok(_) => log::debug!(
                            "{}: opened connection {}/{}",
                            self.name,
                            current + 1,
                            self.max_size
                        ),
                        Err(_) => {
                            self.opened.fetch_sub(1, Ordering::AcqRel);
                        }
                    }
                    return Some(opened);
                }
                Err(actual) => current = actual,
            }
        }
        None
    }
}

impl ConnectionSource for ConnectionPool {
    fn open(&self) -> Result<Box<dyn Connection>> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::acquire_connection_span().entered();

        let start = Instant::now();
        let conn = match self.idle_rx.try_recv() {
            Ok(conn) => conn,
            Err(_) => match self.try_grow() {
                Some(opened) => opened?,
                None => self.idle_rx.recv_timeout(self.timeout).map_err(|_| {
                    QuarryError::Connection(format!(
                        "{}: no connection available within {:?} ({} in use)",
                        self.name, self.timeout, self.max_size
                    ))
                })?,
            },
        };

        #[cfg(feature = "metrics")]
        METRICS.observe_wait(start.elapsed());
        log::trace!("{}: connection acquired in {:?}", self.name, start.elapsed());

        Ok(conn)
    }

    fn release(&self, conn: Box<dyn Connection>) {
        if let Err(err) = self.idle_tx.try_send(conn) {
            log::warn!("{}: idle queue full, closing surplus connection", self.name);
            self.discard(err.into_inner());
        }
    }

    fn discard(&self, conn: Box<dyn Connection>) {
        self.opened.fetch_sub(1, Ordering::AcqRel);
        if let Err(err) = conn.close() {
            log::warn!("{}: error while closing connection: {err}", self.name);
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .field("size", &self.size())
            .field("idle", &self.idle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ExecResult;
    use crate::row::Row;
    use crate::value::Value;
    use std::sync::Arc;

    struct NullConnection;

    impl Connection for NullConnection {
        fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }
        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<ExecResult> {
            Ok(ExecResult::default())
        }
        fn begin(&self) -> Result<()> {
            Ok(())
        }
        fn commit(&self) -> Result<()> {
            Ok(())
        }
        fn rollback(&self) -> Result<()> {
            Ok(())
        }
        fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn pool(max_size: usize, opened: Arc<AtomicUsize>) -> ConnectionPool {
        ConnectionPool::new("test", max_size, Duration::from_millis(50), move || {
            opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullConnection) as Box<dyn Connection>)
        })
    }

    #[test]
    fn test_reuses_released_connections() {
        let opened = Arc::new(AtomicUsize::new(0));
        let pool = pool(2, Arc::clone(&opened));
        let conn = pool.open().unwrap();
        pool.release(conn);
        let conn = pool.open().unwrap();
        pool.release(conn);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_times_out_when_exhausted() {
        let opened = Arc::new(AtomicUsize::new(0));
        let pool = pool(1, opened);
        let held = pool.open().unwrap();
        let err = pool.open().err().unwrap();
        assert_eq!(err.code(), crate::error::codes::CONNECTION);
        pool.release(held);
        assert!(pool.open().is_ok());
    }

    #[test]
    fn test_discard_frees_a_slot() {
        let opened = Arc::new(AtomicUsize::new(0));
        let pool = pool(1, Arc::clone(&opened));
        let conn = pool.open().unwrap();
        pool.discard(conn);
        assert_eq!(pool.size(), 0);
        let _conn = pool.open().unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }
}
