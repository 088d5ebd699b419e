//! Router behind a reader-writer lock, for sharing across threads.
//!
//! Writers are serialized by the lock and each operation commits atomically, so
//! readers only ever see fully applied operations.

use super::core::Router;
use crate::exchange::Exchange;
use crate::twap_market::TwapMarket;
use crate::types::Address;
use parking_lot::RwLock;
use std::sync::Arc;

use super::results::RouterError;

#[derive(Debug)]
pub struct SharedRouter<E> {
    inner: Arc<RwLock<Router<E>>>,
}

impl<E> Clone for SharedRouter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Exchange + Clone> SharedRouter<E> {
    pub fn new(router: Router<E>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(router)),
        }
    }

    pub fn read<T>(&self, f: impl FnOnce(&Router<E>) -> T) -> T {
        f(&self.inner.read())
    }

    pub fn write<T>(&self, f: impl FnOnce(&mut Router<E>) -> T) -> T {
        f(&mut self.inner.write())
    }

    pub fn twap_market(&self, twap_market: &Address) -> Result<TwapMarket, RouterError> {
        self.read(|router| router.twap_market(twap_market))
    }

    pub fn realized_twap(&self, twap_market: &Address) -> Result<Option<u64>, RouterError> {
        self.read(|router| router.realized_twap(twap_market))
    }
}
