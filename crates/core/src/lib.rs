pub mod money;
pub mod period;
pub mod record;

pub use money::{Money, ParseMoneyError};
pub use period::DateRange;
pub use record::{DateOrigin, ParsedRecord};
