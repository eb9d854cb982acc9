pub mod bot;
pub mod signal;
pub mod trade_result;
pub mod user;

pub use bot::{Bot, SizingMode};
pub use signal::{Side, Signal};
pub use trade_result::TradeResult;
pub use user::{AccountStatus, Exchange, ExchangeCredentials, User};
