use anyhow::Result as AnyResult;
use chrono::{Duration as ChronoDuration, Utc};
use market_application::dto::{CreateAuction, UpdateAuction};
use market_application::search::{InMemorySearchStore, Reconciler, SearchProjector};
use market_application::wiring::{auction_service_engine, search_service_engine};
use market_application::{AppContext, AppError, AuctionService};
use market_domain::eventing::{
    EngineHandle, EventBus, EventEngineConfig, FaultLog, InMemoryEventBus, RetryPolicy,
};
use market_domain::persist::{InMemoryAuctionStore, OutboxStore};
use market_domain::read_model::SearchStore;
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> EventEngineConfig {
    EventEngineConfig {
        deliver_interval: Duration::from_millis(20),
        retry: RetryPolicy::interval(2, Duration::from_millis(10)),
        ..Default::default()
    }
}

fn input(model: &str) -> CreateAuction {
    CreateAuction {
        make: "Ford".into(),
        model: model.into(),
        color: "White".into(),
        mileage: 50_000,
        year: 2020,
        image_url: "https://cdn/car.png".into(),
        reserve_price: 20_000,
        auction_end: Utc::now() + ChronoDuration::days(10),
    }
}

struct Marketplace {
    bus: Arc<InMemoryEventBus>,
    primary: InMemoryAuctionStore,
    service: Arc<AuctionService>,
    search: InMemorySearchStore,
    projector: Arc<SearchProjector>,
    faults: FaultLog,
    handles: Vec<EngineHandle>,
}

impl Marketplace {
    async fn start() -> AnyResult<Self> {
        init_tracing();
        let bus = Arc::new(InMemoryEventBus::new());
        let primary = InMemoryAuctionStore::new();
        let service = Arc::new(AuctionService::new(Arc::new(primary.clone())));
        let search = InMemorySearchStore::new();
        let projector =
            Arc::new(SearchProjector::new(Arc::new(search.clone())).rejecting_model("Foo"));
        let faults = FaultLog::new();

        let search_engine =
            Arc::new(search_service_engine(bus.clone(), projector.clone(), config())?);
        let auction_engine = Arc::new(auction_service_engine(
            bus.clone(),
            Arc::new(primary.clone()),
            Arc::new(primary.clone()),
            Arc::new(faults.clone()),
            config(),
        )?);
        let handles = vec![search_engine.start().await?, auction_engine.start().await?];

        Ok(Self {
            bus,
            primary,
            service,
            search,
            projector,
            faults,
            handles,
        })
    }

    async fn wait_for<F>(&self, limit: Duration, mut done: F)
    where
        F: FnMut(&InMemorySearchStore) -> bool,
    {
        // 使用 timeout + 轮询条件，减少固定 sleep 带来的不确定性
        let _ = tokio::time::timeout(limit, async {
            while !done(&self.search) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
    }

    async fn stop(self) {
        for handle in self.handles {
            handle.shutdown();
            handle.join().await;
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn create_publishes_auction_created() -> AnyResult<()> {
    let market = Marketplace::start().await?;
    let dto = market.service.create(&AppContext::user("bob"), input("GT")).await?;

    market
        .wait_for(Duration::from_secs(2), |s| s.items().iter().any(|i| i.id == dto.id))
        .await;

    let created = market.bus.published_of("AuctionCreated");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].aggregate_id(), dto.id.to_string());
    assert_eq!(market.search.get(&dto.id).await?.map(|i| i.model), Some("GT".to_string()));
    market.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn forbidden_model_is_repaired_end_to_end() -> AnyResult<()> {
    let market = Marketplace::start().await?;
    let dto = market.service.create(&AppContext::user("bob"), input("Foo")).await?;

    market
        .wait_for(Duration::from_secs(3), |s| {
            s.items().iter().any(|i| i.id == dto.id && i.model == "FooBar")
        })
        .await;

    let item = market.search.get(&dto.id).await?.expect("projected");
    assert_eq!(item.model, "FooBar");
    assert_eq!(item.seller, "bob");

    // 原始事件 + 修复后的新事件；两者 ID 不同
    let created = market.bus.published_of("AuctionCreated");
    assert_eq!(created.len(), 2);
    assert_ne!(created[0].event_id(), created[1].event_id());
    assert_eq!(created[1].actor_type(), Some("system"));

    let faults = market.bus.published_of("Fault<AuctionCreated>");
    assert_eq!(faults.len(), 1);
    assert_eq!(created[1].causation_id(), Some(faults[0].event_id()));
    assert!(market.faults.entries().is_empty());
    market.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn update_and_delete_propagate_and_tombstone() -> AnyResult<()> {
    let market = Marketplace::start().await?;
    let bob = AppContext::user("bob");
    let dto = market.service.create(&bob, input("GT")).await?;
    market
        .wait_for(Duration::from_secs(2), |s| s.items().iter().any(|i| i.id == dto.id))
        .await;
    let patch = UpdateAuction {
        model: Some("Mustang".into()),
        ..Default::default()
    };
    market.service.update(&bob, &dto.id, patch).await?;

    market
        .wait_for(Duration::from_secs(2), |s| s.items().iter().any(|i| i.model == "Mustang"))
        .await;
    assert_eq!(market.search.get(&dto.id).await?.map(|i| i.make), Some("Ford".to_string()));

    let err = market.service.delete(&AppContext::user("alice"), &dto.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    market.service.delete(&bob, &dto.id).await?;
    market.wait_for(Duration::from_secs(2), |s| s.items().is_empty()).await;
    assert!(market.search.is_tombstoned(&dto.id).await?);
    assert_eq!(market.bus.published_of("AuctionDeleted").len(), 1);
    market.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unrepairable_fault_is_recorded_when_republish_keeps_failing() -> AnyResult<()> {
    let market = Marketplace::start().await?;
    let dto = market.service.create(&AppContext::user("bob"), input("Foo")).await?;
    // 创建已提交；之后主存储不可用，修复后的事件无法写入 Outbox
    market.primary.fail_commits(true);

    let _ = tokio::time::timeout(Duration::from_secs(3), async {
        while market.faults.entries().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    let entries = market.faults.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event_type, "AuctionCreated");
    assert_eq!(entries[0].aggregate_id, dto.id.to_string());
    assert_eq!(entries[0].consumer_group, "search");
    assert_eq!(entries[0].payload["model"], "Foo");
    let first = entries[0].exceptions.first().map(|e| e.exception_type.as_str());
    let last = entries[0].exceptions.last().map(|e| e.exception_type.as_str());
    assert_eq!(first, Some("InvalidArgument"));
    assert_eq!(last, Some("Database"));

    assert_eq!(market.bus.published_of("Fault<AuctionCreated>").len(), 1);
    assert!(market.bus.published_of("Fault<Fault<AuctionCreated>>").is_empty());
    assert_eq!(market.bus.queue_depth("auction-fault-auction-created"), 0);
    assert_eq!(market.search.count().await?, 0);
    market.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn retried_create_with_same_key_publishes_once() -> AnyResult<()> {
    let market = Marketplace::start().await?;
    let ctx = AppContext::user("bob").with_idempotency_key(ulid::Ulid::new().to_string());

    let first = market.service.create(&ctx, input("GT")).await?;
    let second = market.service.create(&ctx, input("GT")).await?;
    assert_eq!(first.id, second.id);

    market
        .wait_for(Duration::from_secs(2), |s| s.items().iter().any(|i| i.id == first.id))
        .await;
    assert_eq!(market.bus.published_of("AuctionCreated").len(), 1);
    assert_eq!(market.search.count().await?, 1);
    market.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_write_publishes_nothing() -> AnyResult<()> {
    let market = Marketplace::start().await?;
    market.primary.fail_commits(true);

    let err = market.service.create(&AppContext::user("bob"), input("GT")).await.unwrap_err();
    assert!(matches!(err, AppError::Infra(_)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(market.bus.published().is_empty());
    assert_eq!(market.primary.pending_count().await?, 0);
    assert_eq!(market.search.count().await?, 0);
    market.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_delivery_is_absorbed() -> AnyResult<()> {
    let market = Marketplace::start().await?;
    let dto = market.service.create(&AppContext::user("bob"), input("GT")).await?;
    market
        .wait_for(Duration::from_secs(2), |s| s.items().iter().any(|i| i.id == dto.id))
        .await;
    let before = market.search.get(&dto.id).await?;

    // 模拟标记失败后的重复发布
    let created = market.bus.published_of("AuctionCreated");
    market.bus.publish(&created[0]).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(market.search.count().await?, 1);
    assert_eq!(market.search.get(&dto.id).await?, before);
    assert!(market.projector.candidates().is_empty());
    market.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn search_catches_up_on_missed_auctions() -> AnyResult<()> {
    init_tracing();
    // 搜索服务尚未上线：拍卖事件发布时没有搜索队列
    let bus = Arc::new(InMemoryEventBus::new());
    let primary = InMemoryAuctionStore::new();
    let service = Arc::new(AuctionService::new(Arc::new(primary.clone())));
    let faults = FaultLog::new();
    let auction_engine = Arc::new(auction_service_engine(
        bus.clone(),
        Arc::new(primary.clone()),
        Arc::new(primary.clone()),
        Arc::new(faults),
        config(),
    )?);
    let handle = auction_engine.start().await?;

    let bob = AppContext::user("bob");
    service.create(&bob, input("GT")).await?;
    service.create(&bob, input("Mustang")).await?;
    let _ = tokio::time::timeout(Duration::from_secs(2), async {
        while primary.pending_count().await.unwrap_or(1) > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    let search = InMemorySearchStore::new();
    let projector = Arc::new(SearchProjector::new(Arc::new(search.clone())));
    let reconciler = Reconciler::new(service.clone(), Arc::new(search.clone()), projector);
    assert_eq!(reconciler.catch_up().await?, 2);
    assert_eq!(search.count().await?, 2);

    handle.shutdown();
    handle.join().await;
    Ok(())
}
