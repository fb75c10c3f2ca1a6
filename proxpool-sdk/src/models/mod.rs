pub mod protocols;
pub mod proxy;

pub use protocols::Protocols;
pub use proxy::Proxy;
