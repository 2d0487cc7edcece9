//! Outbox 调度器（OutboxDispatcher）
//!
//! 周期性地把 Outbox 中的待投递记录按提交顺序发布到总线：
//! - 发布确认后才标记已发送；标记失败则下一轮重发（至少一次）；
//! - 发布失败（含超时）的记录保持待投递，同一聚合的后续记录本轮不再发布，
//!   以保持同一聚合内的顺序；
//! - 同一时刻至多一轮在执行，重叠的调用直接跳过。
//!
use super::bus::EventBus;
use crate::error::{DomainError, DomainResult};
use crate::persist::OutboxStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 单轮调度结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub fetched: usize,
    pub sent: usize,
    pub failed: usize,
    /// 因同一聚合的前序记录失败而推迟的记录数
    pub deferred: usize,
    /// 与正在执行的一轮重叠而被跳过
    pub overlapped: bool,
}

pub struct OutboxDispatcher {
    outbox: Arc<dyn OutboxStore>,
    bus: Arc<dyn EventBus>,
    batch_size: usize,
    publish_timeout: Duration,
    running: Mutex<()>,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        bus: Arc<dyn EventBus>,
        batch_size: usize,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            outbox,
            bus,
            batch_size: batch_size.max(1),
            publish_timeout,
            running: Mutex::new(()),
        }
    }

    /// 执行一轮调度
    pub async fn dispatch_once(&self) -> DomainResult<DispatchReport> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("outbox dispatch already in flight, skipping tick");
            return Ok(DispatchReport {
                overlapped: true,
                ..Default::default()
            });
        };

        let records = self.outbox.fetch_pending(self.batch_size).await?;
        let mut report = DispatchReport {
            fetched: records.len(),
            ..Default::default()
        };
        let mut blocked: HashSet<(String, String)> = HashSet::new();

        for record in records {
            let key = (
                record.event.aggregate_type().to_string(),
                record.event.aggregate_id().to_string(),
            );
            if blocked.contains(&key) {
                report.deferred += 1;
                continue;
            }

            let published = match tokio::time::timeout(
                self.publish_timeout,
                self.bus.publish(&record.event),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DomainError::Timeout {
                    operation: format!("publish {}", record.event.event_type()),
                    elapsed_ms: self.publish_timeout.as_millis(),
                }),
            };

            match published {
                Ok(()) => {
                    if let Err(err) = self.outbox.mark_sent(&record.id).await {
                        // 已发布但未标记：下一轮会重复发布，由消费者幂等吸收
                        warn!(
                            outbox_id = %record.id,
                            error = %err,
                            "failed to mark outbox record sent"
                        );
                    }
                    report.sent += 1;
                }
                Err(err) => {
                    warn!(
                        outbox_id = %record.id,
                        event_type = %record.event.event_type(),
                        attempts = record.attempts + 1,
                        error = %err,
                        "outbox publish failed, will retry"
                    );
                    let reason = err.to_string();
                    if let Err(mark_err) = self.outbox.mark_failed(&record.id, &reason).await {
                        warn!(
                            outbox_id = %record.id,
                            error = %mark_err,
                            "failed to record outbox failure"
                        );
                    }
                    blocked.insert(key);
                    report.failed += 1;
                }
            }
        }

        if report.fetched > 0 {
            info!(
                fetched = report.fetched,
                sent = report.sent,
                failed = report.failed,
                deferred = report.deferred,
                "outbox dispatch finished"
            );
        }
        Ok(report)
    }
}
