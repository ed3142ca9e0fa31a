//! 配置管理
//!
//! 配置在启动时由 [`AppConfig::load`] 构造一次，随后作为显式参数传给分发引擎、
//! 事件存储和后端工厂。
//!
//! # 配置来源
//!
//! 1. `--config` 指定的 TOML 文件，或默认路径 `config/relay.toml`、`relay.toml`
//! 2. 内置默认值（所有配置段都实现了 `Default`）
//! 3. `RELAY_` 前缀的环境变量，层级用 `__` 分隔
//!
//! ```rust,no_run
//! use relay_core::config::AppConfig;
//!
//! let config = AppConfig::load(Some("config/relay.toml")).unwrap();
//! let plan = config.dispatch.plan_for(config.enabled_backend_ids());
//! println!("{:?}", plan);
//! ```

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::{ConfigValidator, ValidationUtils};
