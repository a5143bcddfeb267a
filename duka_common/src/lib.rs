mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, RWF_CURRENCY_CODE};
pub use secret::Secret;
