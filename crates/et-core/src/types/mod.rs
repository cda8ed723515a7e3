//! Core data types: enums, instrument/order structs and market-data structs.

pub mod enums;
pub mod market_data;
pub mod trading;

pub use enums::*;
pub use market_data::*;
pub use trading::*;
