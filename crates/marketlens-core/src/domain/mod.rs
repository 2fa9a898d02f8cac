//! # Domain Models
//!
//! Canonical value types shared by adapters, the router and reports.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Quote`] | Price snapshot with derived change figures |
//! | [`FundamentalsReport`] | Company info, statements, ratios, ESG |
//! | [`NewsItem`] | One article, ordered newest first in collections |
//! | [`Symbol`] | Validated, uppercased ticker |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! All models validate at construction and are immutable afterwards; none of
//! them are persisted.

mod models;
mod symbol;
mod timestamp;

pub use models::{arrange_news, FundamentalsReport, NewsItem, Quote, StatementTable};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
