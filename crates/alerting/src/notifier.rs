use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use pipeline_core::{Notification, Notifier, PipelineError, PipelineResult};

/// 通过 HTTP 调用外部消息服务
///
/// 请求体为 `{corp_id, appid, device_id, message}`，只关心成功或失败，不解析响应内容。
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, notification: &Notification) -> PipelineResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|e| PipelineError::Dispatch(format!("请求消息服务失败: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(
                "通知已送达: device_id={}, status={}",
                notification.device_id,
                status.as_u16()
            );
            Ok(())
        } else {
            Err(PipelineError::Dispatch(format!(
                "消息服务返回错误状态: {}",
                status.as_u16()
            )))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// 未配置消息服务地址时使用，只写日志
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, notification: &Notification) -> PipelineResult<()> {
        info!(
            corp_id = %notification.corp_id,
            app_id = %notification.app_id,
            device_id = %notification.device_id,
            "告警通知: {}",
            notification.message
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
