pub mod entry;
pub mod fees;
pub mod gates;
pub mod kelly;
pub mod matcher;
pub mod price;
pub mod survival;

pub use entry::{EntryDecision, EntryModel, EntryRequest, GameState, Recommendation};
pub use price::Price;
