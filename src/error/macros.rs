//! # 错误处理宏

/// 确保条件成立，否则把给定错误转换为 `ProxyError` 返回
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err(::core::convert::Into::<$crate::error::ProxyError>::into($err));
        }
    };
}
