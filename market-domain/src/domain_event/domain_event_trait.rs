use crate::error::DomainResult;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// 领域事件载荷需要满足的通用能力边界
pub trait DomainEvent: Clone + PartialEq + fmt::Debug + Send + Sync {
    /// 事件类型（即总线上的主题名，如 `AuctionCreated`）
    fn event_type(&self) -> &'static str;

    /// 事件所属聚合的标识
    fn aggregate_id(&self) -> String;

    /// 序列化为线上载荷（扁平快照）
    fn to_payload(&self) -> DomainResult<serde_json::Value>;
}

/// 集成事件：跨服务传输的线上契约，字段级稳定
pub trait IntegrationEvent:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 事件类型标签，同时决定主题与队列命名
    const EVENT_TYPE: &'static str;

    /// 事件所属聚合的标识
    fn aggregate_id(&self) -> String;
}
