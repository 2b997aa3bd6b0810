//! # Pingora 凭证注入代理服务
//!
//! 对每个经过代理的请求选择一次密钥，写入凭证请求头后转发到上游。

use async_trait::async_trait;
use axum::http::{Method, Uri, header};
use pingora_core::upstreams::peer::{HttpPeer, Peer};
use pingora_core::{Error, ErrorType};
use pingora_http::RequestHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Duration;

use super::context::ProxyContext;
use super::injector::CredentialInjector;
use super::upstream::{UpstreamTarget, origin_path, parse_upstream_url, resolve_upstream};
use crate::config::ProxyConfig;
use crate::error::Result;
use crate::{ldebug, lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 凭证注入代理
pub struct KeyInjectionProxy {
    injector: CredentialInjector,
    fixed_upstream: Option<UpstreamTarget>,
    default_scheme: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl KeyInjectionProxy {
    /// 创建代理服务，固定上游地址在这里解析一次
    pub fn new(injector: CredentialInjector, config: &ProxyConfig) -> Result<Self> {
        let fixed_upstream = config
            .upstream
            .as_deref()
            .map(|raw| parse_upstream_url(raw, &config.default_scheme))
            .transpose()?;

        Ok(Self {
            injector,
            fixed_upstream,
            default_scheme: config.default_scheme.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
        })
    }

    /// 根据下游请求头确定上游
    fn resolve_for(&self, request: &RequestHeader) -> Result<UpstreamTarget> {
        let host = request
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok());
        resolve_upstream(
            self.fixed_upstream.as_ref(),
            &request.uri,
            host,
            &self.default_scheme,
        )
    }

    /// 接收下游请求：确定上游并为本次请求选择一次凭证
    ///
    /// `CONNECT` 返回 405，无法确定上游返回 400，两种情况都不会消耗密钥。
    /// 选择密钥失败时请求照常放行。
    pub async fn admit_request(
        &self,
        request: &RequestHeader,
        ctx: &mut ProxyContext,
    ) -> pingora_core::Result<()> {
        let method = &request.method;
        linfo!(
            &ctx.request_id,
            LogStage::RequestStart,
            LogComponent::Proxy,
            "request_received",
            "收到代理请求",
            method = %method,
            uri = %request.uri
        );

        // TLS 隧道由前置的拦截引擎负责
        if *method == Method::CONNECT {
            lwarn!(
                &ctx.request_id,
                LogStage::RequestStart,
                LogComponent::Interceptor,
                "connect_rejected",
                "不支持 CONNECT 隧道，请求未注入凭证即被拒绝",
                uri = %request.uri
            );
            return Err(Error::explain(
                ErrorType::HTTPStatus(405),
                "CONNECT tunnelling is not supported by this proxy",
            ));
        }

        ctx.path_and_query = origin_path(&request.uri).to_string();
        match self.resolve_for(request) {
            Ok(target) => ctx.upstream = Some(target),
            Err(e) => {
                lwarn!(
                    &ctx.request_id,
                    LogStage::RequestStart,
                    LogComponent::Upstream,
                    "upstream_unresolved",
                    "无法确定上游地址",
                    error = %e
                );
                return Err(Error::explain(
                    ErrorType::HTTPStatus(400),
                    "unable to determine upstream for request",
                ));
            }
        }

        ctx.credential = self.injector.acquire_credential(&ctx.request_id).await;
        Ok(())
    }

    /// 改写发往上游的请求：origin-form 路径、`Host` 头、凭证
    pub fn prepare_upstream_request(
        &self,
        upstream_request: &mut RequestHeader,
        ctx: &ProxyContext,
    ) -> pingora_core::Result<()> {
        if let Some(target) = &ctx.upstream {
            let path = target.upstream_path(&ctx.path_and_query);
            let uri: Uri = path.parse().map_err(|e| {
                Error::because(ErrorType::InvalidHTTPHeader, "重写上游请求路径失败", e)
            })?;
            upstream_request.set_uri(uri);
            upstream_request.insert_header(header::HOST, target.host_header.as_str())?;
        }

        let injected = self
            .injector
            .apply(upstream_request, ctx.credential.as_deref())?;
        ldebug!(
            &ctx.request_id,
            LogStage::UpstreamRequest,
            LogComponent::Interceptor,
            "upstream_request_prepared",
            "上游请求已准备",
            credential_injected = injected
        );
        Ok(())
    }
}

#[async_trait]
impl ProxyHttp for KeyInjectionProxy {
    type CTX = ProxyContext;

    fn new_ctx(&self) -> Self::CTX {
        ProxyContext::default()
    }

    async fn request_filter(
        &self,
        session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> pingora_core::Result<bool> {
        self.admit_request(session.req_header(), ctx).await?;
        Ok(false)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> pingora_core::Result<Box<HttpPeer>> {
        let Some(target) = ctx.upstream.as_ref() else {
            return Err(Error::explain(
                ErrorType::HTTPStatus(400),
                "unable to determine upstream for request",
            ));
        };

        let socket_addr = tokio::net::lookup_host(target.addr.as_str())
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| {
                lerror!(
                    &ctx.request_id,
                    LogStage::UpstreamRequest,
                    LogComponent::Upstream,
                    "dns_failed",
                    "上游地址解析失败",
                    addr = %target.addr
                );
                Error::explain(ErrorType::HTTPStatus(502), "upstream address could not be resolved")
            })?;

        let mut peer = HttpPeer::new(socket_addr, target.tls, target.sni.clone());
        if let Some(options) = peer.get_mut_peer_options() {
            options.connection_timeout = Some(self.connect_timeout);
            options.total_connection_timeout = Some(self.connect_timeout + Duration::from_secs(5));
            options.read_timeout = Some(self.read_timeout);
            options.write_timeout = Some(self.read_timeout);
        }

        ldebug!(
            &ctx.request_id,
            LogStage::UpstreamRequest,
            LogComponent::Upstream,
            "upstream_selected",
            "已选择上游",
            addr = %target.addr,
            tls = target.tls
        );
        Ok(Box::new(peer))
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> pingora_core::Result<()> {
        self.prepare_upstream_request(upstream_request, ctx)
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX) {
        let duration_ms = ctx.start_time.elapsed().as_millis();
        let status = session
            .response_written()
            .map_or(0, |response| response.status.as_u16());

        if let Some(error) = e {
            lerror!(
                &ctx.request_id,
                LogStage::Response,
                LogComponent::Proxy,
                "request_failed",
                "代理请求失败",
                status = status,
                duration_ms = duration_ms,
                credential_injected = ctx.has_credential(),
                error = %error
            );
        } else {
            linfo!(
                &ctx.request_id,
                LogStage::Response,
                LogComponent::Proxy,
                "request_completed",
                "代理请求完成",
                status = status,
                duration_ms = duration_ms,
                credential_injected = ctx.has_credential()
            );
        }
    }
}
