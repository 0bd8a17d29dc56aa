pub mod api_keys;
pub mod webhook_signature;
