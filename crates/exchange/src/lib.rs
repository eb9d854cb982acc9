pub mod coinbase;
pub mod gateway;
pub mod registry;

pub use coinbase::CoinbaseGateway;
pub use gateway::{AssetBalance, ExchangeGateway, GatewayError, OrderReceipt};
pub use registry::{GatewayProvider, HttpGatewayRegistry};

#[cfg(any(test, feature = "mocks"))]
pub use gateway::MockExchangeGateway;
