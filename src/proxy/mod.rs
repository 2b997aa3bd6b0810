//! # 代理服务模块
//!
//! 基于 Pingora 的拦截代理：为每个请求注入密钥池中的凭证后转发

pub mod context;
pub mod injector;
pub mod pingora_proxy;
pub mod service;
pub mod upstream;

pub use context::ProxyContext;
pub use injector::CredentialInjector;
pub use pingora_proxy::PingoraProxyServer;
pub use service::KeyInjectionProxy;
pub use upstream::{UpstreamTarget, parse_upstream_url, resolve_upstream};
