use chrono::{DateTime, Utc};
use market_domain::auction::{Auction, AuctionStatus, ItemPatch};
use market_domain::entity::Entity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 数据传输对象（DTO）
///
/// - 作为应用层的输出载体，面向接口/外部系统序列化友好；
/// - 与领域模型解耦，避免将领域对象直接暴露到接口层。
pub trait Dto: Serialize + Send + Sync + 'static {}

/// 创建拍卖的输入；卖家取自调用上下文
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuction {
    pub make: String,
    pub model: String,
    pub color: String,
    pub mileage: i32,
    pub year: i32,
    pub image_url: String,
    pub reserve_price: i32,
    pub auction_end: DateTime<Utc>,
}

/// 局部更新：缺省字段保持原值
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuction {
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub mileage: Option<i32>,
    pub year: Option<i32>,
}

impl From<UpdateAuction> for ItemPatch {
    fn from(u: UpdateAuction) -> Self {
        Self {
            make: u.make,
            model: u.model,
            color: u.color,
            mileage: u.mileage,
            year: u.year,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionDto {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub auction_end: DateTime<Utc>,
    pub seller: String,
    pub winner: Option<String>,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub mileage: i32,
    pub image_url: String,
    pub status: AuctionStatus,
    pub reserve_price: i32,
    pub sold_amount: Option<i32>,
    pub current_high_bid: Option<i32>,
}

impl Dto for AuctionDto {}

impl From<&Auction> for AuctionDto {
    fn from(a: &Auction) -> Self {
        let item = a.item();
        Self {
            id: *a.id(),
            created_at: a.created_at(),
            updated_at: a.updated_at(),
            auction_end: a.auction_end(),
            seller: a.seller().to_string(),
            winner: a.winner().map(str::to_string),
            make: item.make.clone(),
            model: item.model.clone(),
            year: item.year,
            color: item.color.clone(),
            mileage: item.mileage,
            image_url: item.image_url.clone(),
            status: a.status(),
            reserve_price: a.reserve_price(),
            sold_amount: a.sold_amount(),
            current_high_bid: a.current_high_bid(),
        }
    }
}
