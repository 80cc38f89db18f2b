//! common - 驱动通用类型

pub mod properties;
pub mod types;
pub mod utils;

pub use properties::*;
pub use types::*;
pub use utils::*;
