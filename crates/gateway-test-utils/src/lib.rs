// gateway-test-utils: in-memory bus and mock model backend for integration
// tests, mirroring the role `rt-test-utils::MockWsServer`/`MockWsClient`
// play for the remote-forwarding suite.

pub mod mock_backend;
pub mod mock_bus;

pub use mock_backend::MockModelBackend;
pub use mock_bus::InMemoryBus;
