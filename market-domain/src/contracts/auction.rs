use crate::domain_event::IntegrationEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 拍卖状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    #[default]
    Live,
    Finished,
    ReserveNotMet,
}

/// 拍卖已创建：包含创建时刻的完整扁平快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionCreated {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub color: String,
    pub mileage: i32,
    pub year: i32,
    pub image_url: String,
    pub auction_end: DateTime<Utc>,
    pub seller: String,
    pub reserve_price: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: AuctionStatus,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub sold_amount: Option<i32>,
    #[serde(default)]
    pub current_high_bid: Option<i32>,
}

/// 批量同步接口返回的快照与创建事件同形
pub type AuctionSnapshot = AuctionCreated;

impl IntegrationEvent for AuctionCreated {
    const EVENT_TYPE: &'static str = "AuctionCreated";

    fn aggregate_id(&self) -> String {
        self.id.to_string()
    }
}

/// 拍卖已更新：物品的可变字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionUpdated {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub color: String,
    pub mileage: i32,
    pub year: i32,
    pub updated_at: DateTime<Utc>,
}

impl IntegrationEvent for AuctionUpdated {
    const EVENT_TYPE: &'static str = "AuctionUpdated";

    fn aggregate_id(&self) -> String {
        self.id.to_string()
    }
}

/// 拍卖已删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionDeleted {
    pub id: Uuid,
}

impl IntegrationEvent for AuctionDeleted {
    const EVENT_TYPE: &'static str = "AuctionDeleted";

    fn aggregate_id(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_uses_camel_case_wire_names() {
        let created = AuctionCreated {
            id: Uuid::new_v4(),
            make: "Ford".into(),
            model: "GT".into(),
            color: "White".into(),
            mileage: 50_000,
            year: 2020,
            image_url: "https://cdn/gt.png".into(),
            auction_end: Utc::now(),
            seller: "bob".into(),
            reserve_price: 20_000,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            status: AuctionStatus::Live,
            winner: None,
            sold_amount: None,
            current_high_bid: None,
        };

        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["imageUrl"], "https://cdn/gt.png");
        assert_eq!(json["reservePrice"], 20_000);
        assert!(json.get("auctionEnd").is_some());
        assert_eq!(json["status"], "Live");
    }

    #[test]
    fn created_tolerates_missing_bidding_fields() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "make": "Ford", "model": "GT", "color": "White",
            "mileage": 1, "year": 2020, "imageUrl": "x",
            "auctionEnd": Utc::now(), "seller": "bob", "reservePrice": 0,
            "createdAt": Utc::now(), "updatedAt": Utc::now()
        });

        let created: AuctionCreated = serde_json::from_value(json).unwrap();
        assert_eq!(created.status, AuctionStatus::Live);
        assert_eq!(created.winner, None);
    }
}
