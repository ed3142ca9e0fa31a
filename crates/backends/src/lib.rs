//! # Relay Backends
//!
//! 不依赖任何服务商协议的通用后端适配器：
//!
//! - [`CommandBackend`] 调用本地命令行客户端，提示词经stdin传入
//! - [`MockBackend`] 固定延迟与结果的模拟后端
//! - [`BackendFactory`] 根据配置构建后端注册表

pub mod backend_factory;
pub mod command;
pub mod mock;

pub use backend_factory::BackendFactory;
pub use command::CommandBackend;
pub use mock::MockBackend;
