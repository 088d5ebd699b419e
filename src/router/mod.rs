// 8.0: the order-routing wrapper. sequences every market operation around an oracle
// update: load the record, forward to the exchange, re-sample, update, persist.
// deterministic, all-or-nothing, no external I/O.

mod core;
mod expiry;
mod lifecycle;
mod orders;
mod results;
mod shared;

pub use self::core::Router;
pub use results::{CloseOutcome, ErrorCode, ErrorKind, RoutedOrder, RouterError};
pub use shared::SharedRouter;
