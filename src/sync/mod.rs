//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存的维护任务：按上下文失效与预热。

pub mod invalidation;
pub mod warmup;
