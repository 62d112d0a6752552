//! Common types used across the application.

pub mod id;
pub mod money;
pub mod pagination;

pub use id::*;
pub use money::{AMOUNT_LIMIT, BASE_AMOUNT_SCALE, CurrencyCode, CurrencyCodeError, convert_amount};
pub use pagination::{PageMeta, PageRequest, PageResponse};
