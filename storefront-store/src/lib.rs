pub mod app_config;
pub mod http_gateway;
pub mod wallet;

pub use app_config::Config;
pub use http_gateway::HttpCartGateway;
pub use wallet::{ConsoleRedirectOpener, HttpWalletGateway};
