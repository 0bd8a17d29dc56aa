pub mod accounts;
pub mod gateway;
pub mod rate_limiter;

pub use accounts::{AccountService, IssuedKey};
pub use gateway::{GatewayResponse, GatewayService};
pub use rate_limiter::RateLimiter;
