//! 拍卖服务写路径
//!
//! 每次变更：加载聚合 → 执行命令 → apply → 在同一 `UnitOfWork` 中写入聚合并追加事件
//! → 原子提交。授权失败、校验失败同步返回，不产生任何事件。
//!
use crate::context::AppContext;
use crate::dto::{AuctionDto, CreateAuction, UpdateAuction};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use market_domain::aggregate::Aggregate;
use market_domain::auction::{Auction, AuctionCommand, Item};
use market_domain::contracts::AuctionSnapshot;
use market_domain::entity::Entity;
use market_domain::eventing::EventPublisher;
use market_domain::persist::{AuctionRepository, UnitOfWork};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

pub struct AuctionService {
    repository: Arc<dyn AuctionRepository>,
    /// 幂等键 → 已创建（或正在创建）的拍卖
    created_by_key: DashMap<String, Arc<OnceCell<Uuid>>>,
}

impl AuctionService {
    pub fn new(repository: Arc<dyn AuctionRepository>) -> Self {
        Self {
            repository,
            created_by_key: DashMap::new(),
        }
    }

    /// 创建拍卖；携带幂等键的并发重复请求共享同一次创建
    pub async fn create(&self, ctx: &AppContext, input: CreateAuction) -> AppResult<AuctionDto> {
        let seller = ctx
            .actor()
            .ok_or_else(|| AppError::Authorization("an authenticated seller is required".into()))?
            .to_string();

        let Some(key) = ctx.idempotency_key.as_deref() else {
            return self.create_new(ctx, seller, input).await;
        };

        // 先占位再提交：同键请求等待同一个 OnceCell
        let slot = self.created_by_key.entry(key.to_string()).or_default().clone();
        let mut created = None;
        let created_ref = &mut created;
        let id = *slot
            .get_or_try_init(move || async move {
                let dto = self.create_new(ctx, seller, input).await?;
                let id = dto.id;
                *created_ref = Some(dto);
                Ok::<_, AppError>(id)
            })
            .await?;

        match created {
            Some(dto) => Ok(dto),
            None => {
                debug!(idempotency_key = %key, auction_id = %id, "duplicate create request");
                self.get(&id).await
            }
        }
    }

    async fn create_new(
        &self,
        ctx: &AppContext,
        seller: String,
        input: CreateAuction,
    ) -> AppResult<AuctionDto> {
        let mut auction = Auction::new(Uuid::new_v4());
        let events = auction.execute(AuctionCommand::Create {
            item: Item {
                make: input.make,
                model: input.model,
                color: input.color,
                mileage: input.mileage,
                year: input.year,
                image_url: input.image_url,
            },
            reserve_price: input.reserve_price,
            auction_end: input.auction_end,
            seller,
        })?;
        for event in &events {
            auction.apply(event);
        }

        let mut uow = UnitOfWork::new();
        uow.save(auction.clone());
        EventPublisher::new(&mut uow, &ctx.biz).domain_events(&auction, &events)?;
        self.repository.commit(uow).await?;

        info!(auction_id = %auction.id(), seller = %auction.seller(), "auction created");
        Ok(AuctionDto::from(&auction))
    }

    pub async fn update(
        &self,
        ctx: &AppContext,
        id: &Uuid,
        input: UpdateAuction,
    ) -> AppResult<AuctionDto> {
        let actor = Self::actor(ctx)?;
        let mut auction = self.load(id).await?;
        let events = auction.execute(AuctionCommand::Update {
            actor,
            patch: input.into(),
        })?;
        for event in &events {
            auction.apply(event);
        }

        let mut uow = UnitOfWork::new();
        uow.save(auction.clone());
        EventPublisher::new(&mut uow, &ctx.biz).domain_events(&auction, &events)?;
        self.repository.commit(uow).await?;

        info!(auction_id = %id, version = auction.version(), "auction updated");
        Ok(AuctionDto::from(&auction))
    }

    pub async fn delete(&self, ctx: &AppContext, id: &Uuid) -> AppResult<()> {
        let actor = Self::actor(ctx)?;
        let mut auction = self.load(id).await?;
        let events = auction.execute(AuctionCommand::Delete { actor })?;
        for event in &events {
            auction.apply(event);
        }

        let mut uow = UnitOfWork::new();
        uow.remove(*id);
        EventPublisher::new(&mut uow, &ctx.biz).domain_events(&auction, &events)?;
        self.repository.commit(uow).await?;

        info!(auction_id = %id, "auction deleted");
        Ok(())
    }

    pub async fn get(&self, id: &Uuid) -> AppResult<AuctionDto> {
        Ok(AuctionDto::from(&self.load(id).await?))
    }

    /// 增量快照（搜索服务对账使用），按 `updated_at` 升序
    pub async fn list_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<AuctionSnapshot>> {
        let auctions = self.repository.list_updated_since(since).await?;
        Ok(auctions.iter().map(Auction::snapshot).collect())
    }

    async fn load(&self, id: &Uuid) -> AppResult<Auction> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| AppError::AuctionNotFound(id.to_string()))
    }

    fn actor(ctx: &AppContext) -> AppResult<String> {
        ctx.actor()
            .map(str::to_string)
            .ok_or_else(|| AppError::Authorization("an authenticated actor is required".into()))
    }
}
