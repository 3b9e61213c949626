pub mod order;
pub mod promocode;
pub mod user;

pub use order::{
    AppliedPromocode, AttemptOutcome, LineItem, Order, OrderStatus, OrderType, PaymentAttempt,
    PaymentMethod,
};
pub use promocode::Promocode;
pub use user::UserProfile;
