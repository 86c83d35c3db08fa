//! CodeSage Core - 核心类型和抽象
//!
//! 提供项目的基础类型、错误处理、配置加载等核心功能。

pub mod config;
pub mod config_loader;
pub mod error;
pub mod message;

pub use crate::config::*;
pub use crate::config_loader::*;
pub use crate::error::*;
pub use crate::message::*;
