pub mod executor;

pub use executor::{OrderExecutor, OrderGateway, OrderOutcome, OrderStatus, TradeGuards};
