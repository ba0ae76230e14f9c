pub mod models;
pub mod lifecycle;
pub mod checkout;
pub mod payment;
pub mod history;

pub use models::{Order, OrderLine};
pub use lifecycle::{BadgeTone, LifecycleError, OrderStatus, StatusBadge};
pub use checkout::{CheckoutError, CheckoutOrchestrator};
pub use payment::{Abandonment, PaymentAttempt, PaymentDispatcher, PaymentError, PaymentOutcome, PaymentReceipt};
pub use history::{HistoryError, OrderHistory};
