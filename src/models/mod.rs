pub mod subscriber;
pub mod tier;

pub use subscriber::Subscriber;
pub use tier::PlanTier;
