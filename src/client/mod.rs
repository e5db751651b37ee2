//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存客户端：旁路缓存执行器与同键合并。

pub mod aside;
pub mod single_flight;

pub use aside::CacheAside;
pub use single_flight::SingleFlight;
