pub mod charset;
pub mod concurrency;
pub mod decimal;
pub mod expression;
pub mod overflow;
pub mod server;
pub mod session;
pub mod value;
