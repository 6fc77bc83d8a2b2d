//! Stable reason strings and the order book's own error type.
//!
//! `RejectReason` is the single source of truth for every stable string a
//! caller might see — validation failures, matching-policy outcomes (FOK,
//! STP, TIF), and cancel failures all share this enum so a façade can
//! serialize `reason.as_str()` verbatim instead of hand-copying string
//! literals at each call site.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SymbolMismatch,
    MissingUserId,
    InvalidQuantity,
    QuantityNotLotMultiple,
    QuantityBelowMinimum,
    InvalidLimitPrice,
    PriceNotTickMultiple,
    MarketOrderCannotHavePrice,
    InvalidMinQuantity,
    MinQuantityNotLotMultiple,
    IcebergRequiresLimitOrder,
    InvalidIcebergDisplayQuantity,
    InsufficientLiquidityForFok,
    SelfTradePreventionCancelNewest,
    SelfTradePreventionCancelOldest,
    SelfTradePreventionCancelBoth,
    MarketOrderUnfilledRemainder,
    TimeInForceUnfilledRemainder,
    OrderNotFound,
    UserMismatch,
    OrderSymbolNotFound,
    CanceledByUser,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::SymbolMismatch => "symbol_mismatch",
            RejectReason::MissingUserId => "missing_user_id",
            RejectReason::InvalidQuantity => "invalid_quantity",
            RejectReason::QuantityNotLotMultiple => "quantity_not_lot_multiple",
            RejectReason::QuantityBelowMinimum => "quantity_below_minimum",
            RejectReason::InvalidLimitPrice => "invalid_limit_price",
            RejectReason::PriceNotTickMultiple => "price_not_tick_multiple",
            RejectReason::MarketOrderCannotHavePrice => "market_order_cannot_have_price",
            RejectReason::InvalidMinQuantity => "invalid_min_quantity",
            RejectReason::MinQuantityNotLotMultiple => "min_quantity_not_lot_multiple",
            RejectReason::IcebergRequiresLimitOrder => "iceberg_requires_limit_order",
            RejectReason::InvalidIcebergDisplayQuantity => "invalid_iceberg_display_quantity",
            RejectReason::InsufficientLiquidityForFok => "insufficient_liquidity_for_fok",
            RejectReason::SelfTradePreventionCancelNewest => {
                "self_trade_prevention_cancel_newest"
            }
            RejectReason::SelfTradePreventionCancelOldest => {
                "self_trade_prevention_cancel_oldest"
            }
            RejectReason::SelfTradePreventionCancelBoth => "self_trade_prevention_cancel_both",
            RejectReason::MarketOrderUnfilledRemainder => "market_order_unfilled_remainder",
            RejectReason::TimeInForceUnfilledRemainder => "time_in_force_unfilled_remainder",
            RejectReason::OrderNotFound => "order_not_found",
            RejectReason::UserMismatch => "user_mismatch",
            RejectReason::OrderSymbolNotFound => "order_symbol_not_found",
            RejectReason::CanceledByUser => "canceled_by_user",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from order book operations that are programming errors rather
/// than data-driven rejections (those are carried as [`RejectReason`] on the
/// order itself).
#[derive(Debug)]
#[non_exhaustive]
pub enum OrderBookError {
    /// The order id referenced by a read-path operation does not exist.
    OrderNotFound(String),
    /// A symbol was requested that this book/engine does not serve.
    UnknownSymbol(String),
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::OrderNotFound(id) => write!(f, "order not found: {id}"),
            OrderBookError::UnknownSymbol(symbol) => write!(f, "unknown symbol: {symbol}"),
        }
    }
}

impl std::error::Error for OrderBookError {}
