//! ports - 抽象 trait 层
//!
//! 驱动与外部消息客户端之间的接口，以及压测框架侧的驱动接口

mod callback;
mod client;
mod driver;

pub use callback::*;
pub use client::*;
pub use driver::*;
