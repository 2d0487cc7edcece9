use crate::contracts::{AuctionCreated, AuctionStatus, AuctionUpdated};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 搜索文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
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

impl From<&AuctionCreated> for SearchItem {
    fn from(e: &AuctionCreated) -> Self {
        Self {
            id: e.id,
            created_at: e.created_at,
            updated_at: e.updated_at,
            auction_end: e.auction_end,
            seller: e.seller.clone(),
            winner: e.winner.clone(),
            make: e.make.clone(),
            model: e.model.clone(),
            year: e.year,
            color: e.color.clone(),
            mileage: e.mileage,
            image_url: e.image_url.clone(),
            status: e.status,
            reserve_price: e.reserve_price,
            sold_amount: e.sold_amount,
            current_high_bid: e.current_high_bid,
        }
    }
}

impl SearchItem {
    /// 应用更新事件中的物品字段
    pub fn apply_update(&mut self, e: &AuctionUpdated) {
        self.make = e.make.clone();
        self.model = e.model.clone();
        self.color = e.color.clone();
        self.mileage = e.mileage;
        self.year = e.year;
        self.updated_at = self.updated_at.max(e.updated_at);
    }
}
