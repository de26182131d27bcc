//! Modules: enabled actors that act on a Safe under their own policy.

pub mod daily_limit;

pub use daily_limit::{window_start, AssetLimit, DailyLimitModule, Spend, DAY};
