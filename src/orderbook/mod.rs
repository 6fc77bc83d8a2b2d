//! Per-symbol order book: validation, matching, iceberg/STP/TIF policy, and
//! depth/trade read surfaces.

pub mod book;
pub mod error;
pub mod price_level;
pub mod snapshot;
pub mod trade;
pub mod types;

pub use book::{CancelResult, OrderBook, SubmitResult};
pub use error::{OrderBookError, RejectReason};
pub use snapshot::{DepthRow, OrderBookSnapshot};
pub use trade::{OrderEvent, Trade};
pub use types::{
    CancelRequest, Order, OrderId, OrderKind, OrderStatus, SelfTradePrevention,
    SubmitOrderRequest, Side, TimeInForce,
};
