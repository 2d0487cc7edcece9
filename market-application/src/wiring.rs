//! 两个服务的事件引擎装配
//!
//! 拍卖服务：Outbox 调度 + `Fault<AuctionCreated>` 消费（消费组 `auction`），
//! 修复失败且重试耗尽的故障交给同一个记录器；
//! 搜索服务：只消费拍卖事件（消费组 `search`），没有 Outbox。
//!
use crate::repair::auction_created_fault_consumer;
use crate::search::SearchProjector;
use crate::{AUCTION_CONSUMER_GROUP, SEARCH_CONSUMER_GROUP};
use market_domain::error::DomainResult;
use market_domain::eventing::{
    EventBus, EventEngine, EventEngineConfig, EventHandler, FaultRecorder,
};
use market_domain::persist::{AuctionRepository, OutboxStore};
use std::sync::Arc;

pub fn auction_service_engine(
    bus: Arc<dyn EventBus>,
    repository: Arc<dyn AuctionRepository>,
    outbox: Arc<dyn OutboxStore>,
    recorder: Arc<dyn FaultRecorder>,
    config: EventEngineConfig,
) -> DomainResult<EventEngine> {
    let fault_consumer: Arc<dyn EventHandler> =
        Arc::new(auction_created_fault_consumer(repository, recorder.clone()));

    Ok(EventEngine::builder()
        .event_bus(bus)
        .outbox(outbox)
        .fault_recorder(recorder)
        .event_handlers(vec![fault_consumer])?
        .config(EventEngineConfig {
            consumer_group: AUCTION_CONSUMER_GROUP.to_string(),
            ..config
        })
        .build())
}

pub fn search_service_engine(
    bus: Arc<dyn EventBus>,
    projector: Arc<SearchProjector>,
    config: EventEngineConfig,
) -> DomainResult<EventEngine> {
    Ok(EventEngine::builder()
        .event_bus(bus)
        .event_handlers(vec![projector as Arc<dyn EventHandler>])?
        .config(EventEngineConfig {
            consumer_group: SEARCH_CONSUMER_GROUP.to_string(),
            ..config
        })
        .build())
}
