//! # SynthRad Core
//!
//! 合成影像报告系统的核心模块，提供病例数据结构、错误定义和通用工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{Result, SynthError};
pub use models::*;
