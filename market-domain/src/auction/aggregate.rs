use super::item::{Item, ItemPatch};
use crate::aggregate::Aggregate;
use crate::contracts::{AuctionCreated, AuctionDeleted, AuctionStatus, AuctionUpdated};
use crate::domain_event::{DomainEvent, IntegrationEvent};
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 拍卖聚合根
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    id: Uuid,
    version: usize,
    reserve_price: i32,
    seller: String,
    winner: Option<String>,
    sold_amount: Option<i32>,
    current_high_bid: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    auction_end: DateTime<Utc>,
    status: AuctionStatus,
    item: Item,
}

impl Auction {
    pub fn reserve_price(&self) -> i32 {
        self.reserve_price
    }

    pub fn seller(&self) -> &str {
        &self.seller
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn sold_amount(&self) -> Option<i32> {
        self.sold_amount
    }

    pub fn current_high_bid(&self) -> Option<i32> {
        self.current_high_bid
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn auction_end(&self) -> DateTime<Utc> {
        self.auction_end
    }

    pub fn status(&self) -> AuctionStatus {
        self.status
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn is_created(&self) -> bool {
        self.version > 0
    }

    /// 仅卖家本人可以修改或删除
    pub fn ensure_owner(&self, actor: &str) -> DomainResult<()> {
        if self.seller != actor {
            return Err(DomainError::Unauthorized {
                actor: actor.to_string(),
                owner: self.seller.clone(),
            });
        }
        Ok(())
    }

    /// 完整快照（批量同步与创建事件共用）
    pub fn snapshot(&self) -> AuctionCreated {
        AuctionCreated {
            id: self.id,
            make: self.item.make.clone(),
            model: self.item.model.clone(),
            color: self.item.color.clone(),
            mileage: self.item.mileage,
            year: self.item.year,
            image_url: self.item.image_url.clone(),
            auction_end: self.auction_end,
            seller: self.seller.clone(),
            reserve_price: self.reserve_price,
            created_at: self.created_at,
            updated_at: self.updated_at,
            status: self.status,
            winner: self.winner.clone(),
            sold_amount: self.sold_amount,
            current_high_bid: self.current_high_bid,
        }
    }

    // updated_at 单调不减，即使系统时钟回拨
    fn next_timestamp(&self) -> DateTime<Utc> {
        Utc::now().max(self.updated_at)
    }
}

impl Entity for Auction {
    type Id = Uuid;

    fn new(aggregate_id: Self::Id) -> Self {
        Self {
            id: aggregate_id,
            ..Default::default()
        }
    }

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> usize {
        self.version
    }
}

#[derive(Debug, Clone)]
pub enum AuctionCommand {
    Create {
        item: Item,
        reserve_price: i32,
        auction_end: DateTime<Utc>,
        seller: String,
    },
    Update {
        actor: String,
        patch: ItemPatch,
    },
    Delete {
        actor: String,
    },
}

/// 拍卖聚合产生的事件，直接承载对应的线上契约
#[derive(Debug, Clone, PartialEq)]
pub enum AuctionEvent {
    Created(AuctionCreated),
    Updated(AuctionUpdated),
    Deleted(AuctionDeleted),
}

impl DomainEvent for AuctionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => AuctionCreated::EVENT_TYPE,
            Self::Updated(_) => AuctionUpdated::EVENT_TYPE,
            Self::Deleted(_) => AuctionDeleted::EVENT_TYPE,
        }
    }

    fn aggregate_id(&self) -> String {
        match self {
            Self::Created(e) => e.aggregate_id(),
            Self::Updated(e) => e.aggregate_id(),
            Self::Deleted(e) => e.aggregate_id(),
        }
    }

    fn to_payload(&self) -> DomainResult<serde_json::Value> {
        let value = match self {
            Self::Created(e) => serde_json::to_value(e)?,
            Self::Updated(e) => serde_json::to_value(e)?,
            Self::Deleted(e) => serde_json::to_value(e)?,
        };
        Ok(value)
    }
}

impl Aggregate for Auction {
    const TYPE: &'static str = "auction";

    type Command = AuctionCommand;
    type Event = AuctionEvent;
    type Error = DomainError;

    fn execute(&self, command: Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AuctionCommand::Create {
                item,
                reserve_price,
                auction_end,
                seller,
            } => {
                if self.is_created() {
                    return Err(DomainError::InvalidArgument {
                        reason: format!("auction {} already exists", self.id),
                    });
                }
                item.validate()?;
                if reserve_price < 0 {
                    return Err(DomainError::InvalidValue {
                        reason: "reserve price must be >= 0".into(),
                    });
                }
                if seller.trim().is_empty() {
                    return Err(DomainError::InvalidArgument {
                        reason: "seller is required".into(),
                    });
                }

                let now = self.next_timestamp();
                Ok(vec![AuctionEvent::Created(AuctionCreated {
                    id: self.id,
                    make: item.make,
                    model: item.model,
                    color: item.color,
                    mileage: item.mileage,
                    year: item.year,
                    image_url: item.image_url,
                    auction_end,
                    seller,
                    reserve_price,
                    created_at: now,
                    updated_at: now,
                    status: AuctionStatus::Live,
                    winner: None,
                    sold_amount: None,
                    current_high_bid: None,
                })])
            }
            AuctionCommand::Update { actor, patch } => {
                if !self.is_created() {
                    return Err(DomainError::NotFound {
                        reason: format!("auction {}", self.id),
                    });
                }
                self.ensure_owner(&actor)?;

                let item = self.item.patched(patch);
                item.validate()?;

                Ok(vec![AuctionEvent::Updated(AuctionUpdated {
                    id: self.id,
                    make: item.make,
                    model: item.model,
                    color: item.color,
                    mileage: item.mileage,
                    year: item.year,
                    updated_at: self.next_timestamp(),
                })])
            }
            AuctionCommand::Delete { actor } => {
                if !self.is_created() {
                    return Err(DomainError::NotFound {
                        reason: format!("auction {}", self.id),
                    });
                }
                self.ensure_owner(&actor)?;
                Ok(vec![AuctionEvent::Deleted(AuctionDeleted { id: self.id })])
            }
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AuctionEvent::Created(e) => {
                self.id = e.id;
                self.item = Item {
                    make: e.make.clone(),
                    model: e.model.clone(),
                    color: e.color.clone(),
                    mileage: e.mileage,
                    year: e.year,
                    image_url: e.image_url.clone(),
                };
                self.auction_end = e.auction_end;
                self.seller = e.seller.clone();
                self.reserve_price = e.reserve_price;
                self.created_at = e.created_at;
                self.updated_at = e.updated_at;
                self.status = e.status;
                self.winner = e.winner.clone();
                self.sold_amount = e.sold_amount;
                self.current_high_bid = e.current_high_bid;
            }
            AuctionEvent::Updated(e) => {
                self.item.make = e.make.clone();
                self.item.model = e.model.clone();
                self.item.color = e.color.clone();
                self.item.mileage = e.mileage;
                self.item.year = e.year;
                self.updated_at = self.updated_at.max(e.updated_at);
            }
            AuctionEvent::Deleted(_) => {}
        }
        self.version += 1;
    }
}
