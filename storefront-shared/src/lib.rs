pub mod ids;
pub mod money;
pub mod pii;

pub use ids::{OrderId, ProductRef, UserId};
pub use money::Money;
pub use pii::Masked;
