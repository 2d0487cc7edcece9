//! 故障修复规则
//!
//! 拍卖服务消费自身 `AuctionCreated` 的故障事件：命中规则的载荷经 Outbox
//! 作为新事件重新发布，其余记录待人工处理。
//!
use market_domain::auction::Auction;
use market_domain::aggregate::Aggregate;
use market_domain::contracts::{AuctionCreated, ExceptionInfo};
use market_domain::eventing::{FaultConsumer, FaultRecorder, OutboxRepublisher, RepairRule};
use market_domain::persist::AuctionRepository;
use std::sync::Arc;

/// 被下游拒绝的型号值替换为可接受的值
#[derive(Debug, Clone)]
pub struct ForbiddenValueRule {
    exception_type: String,
    forbidden: String,
    replacement: String,
}

impl ForbiddenValueRule {
    pub fn new(
        exception_type: impl Into<String>,
        forbidden: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            exception_type: exception_type.into(),
            forbidden: forbidden.into(),
            replacement: replacement.into(),
        }
    }
}

impl Default for ForbiddenValueRule {
    fn default() -> Self {
        Self::new("InvalidArgument", "Foo", "FooBar")
    }
}

impl RepairRule<AuctionCreated> for ForbiddenValueRule {
    fn name(&self) -> &str {
        "forbidden-model-value"
    }

    fn repair(
        &self,
        exception: &ExceptionInfo,
        message: &AuctionCreated,
    ) -> Option<AuctionCreated> {
        if exception.exception_type != self.exception_type || message.model != self.forbidden {
            return None;
        }
        Some(AuctionCreated {
            model: self.replacement.clone(),
            ..message.clone()
        })
    }
}

/// 拍卖服务侧的 `Fault<AuctionCreated>` 消费者
pub fn auction_created_fault_consumer(
    repository: Arc<dyn AuctionRepository>,
    recorder: Arc<dyn FaultRecorder>,
) -> FaultConsumer<AuctionCreated> {
    FaultConsumer::builder()
        .name("auction-created-fault")
        .aggregate_type(Auction::TYPE)
        .rules(vec![
            Arc::new(ForbiddenValueRule::default()) as Arc<dyn RepairRule<AuctionCreated>>
        ])
        .republisher(Arc::new(OutboxRepublisher::new(repository)))
        .recorder(recorder)
        .build()
}
