//! 单进程演示：拍卖服务与搜索服务共用一个内存总线。
//!
//! 搜索投影器拒绝型号 "Foo"；重试耗尽后故障事件回到拍卖服务，
//! 被修复为 "FooBar" 并经 Outbox 重新发布，最终出现在搜索库中。
//!
//! 运行：`RUST_LOG=debug cargo run -p market-demo`
//!
use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use market_application::dto::CreateAuction;
use market_application::search::{InMemorySearchStore, Reconciler, SearchProjector};
use market_application::wiring::{auction_service_engine, search_service_engine};
use market_application::{AppContext, AuctionService};
use market_domain::eventing::{EventEngineConfig, FaultLog, InMemoryEventBus, RetryPolicy};
use market_domain::persist::InMemoryAuctionStore;
use market_domain::read_model::SearchStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EventEngineConfig {
        deliver_interval: Duration::from_millis(500),
        retry: RetryPolicy::interval(2, Duration::from_millis(200)),
        ..Default::default()
    };

    let bus = Arc::new(InMemoryEventBus::new());
    let primary = InMemoryAuctionStore::new();
    let auctions = Arc::new(AuctionService::new(Arc::new(primary.clone())));
    let search = InMemorySearchStore::new();
    let projector = Arc::new(SearchProjector::new(Arc::new(search.clone())).rejecting_model("Foo"));
    let faults = FaultLog::new();

    // 搜索服务上线前先补齐已有拍卖
    let reconciler = Reconciler::new(auctions.clone(), Arc::new(search.clone()), projector.clone());
    reconciler.catch_up().await.context("initial catch-up")?;

    let search_engine = Arc::new(search_service_engine(
        bus.clone(),
        projector.clone(),
        config.clone(),
    )?);
    let auction_engine = Arc::new(auction_service_engine(
        bus.clone(),
        Arc::new(primary.clone()),
        Arc::new(primary.clone()),
        Arc::new(faults.clone()),
        config,
    )?);
    let search_handle = search_engine.start().await?;
    let auction_handle = auction_engine.start().await?;

    let bob = AppContext::user("bob");
    let car = CreateAuction {
        make: "Ford".into(),
        model: "Foo".into(),
        color: "Red".into(),
        mileage: 12_000,
        year: 2021,
        image_url: "https://cdn.example.com/ford-foo.png".into(),
        reserve_price: 25_000,
        auction_end: Utc::now() + ChronoDuration::days(7),
    };
    let created = auctions.create(&bob, car).await?;
    info!(auction_id = %created.id, model = %created.model, "auction listed");

    let repaired = async {
        loop {
            match search.get(&created.id).await {
                Ok(Some(item)) if item.model == "FooBar" => return item,
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    };

    tokio::select! {
        item = repaired => {
            info!(
                auction_id = %item.id,
                model = %item.model,
                seller = %item.seller,
                "search item repaired"
            );
        }
        _ = tokio::time::sleep(Duration::from_secs(15)) => {
            warn!("search item was not repaired in time");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted");
        }
    }

    for event in bus.published() {
        info!(event_id = %event.event_id(), event_type = %event.event_type(), "published");
    }
    for fault in faults.entries() {
        warn!(aggregate_id = %fault.aggregate_id, attempts = fault.attempts, "unrepaired fault");
    }

    search_handle.shutdown();
    auction_handle.shutdown();
    search_handle.join().await;
    auction_handle.join().await;
    Ok(())
}
