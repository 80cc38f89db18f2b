//! 通用工具函数

use uuid::Uuid;

/// 生成新的 UUID v7（时间有序）
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// 是否为合法的 topic / 订阅名称（非空且不含空白）
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(char::is_whitespace)
}
