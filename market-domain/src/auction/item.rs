use crate::error::DomainError;
use crate::value_object::ValueObject;
use serde::{Deserialize, Serialize};

/// 拍卖物品（车辆）的描述性属性
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub make: String,
    pub model: String,
    pub color: String,
    pub mileage: i32,
    pub year: i32,
    pub image_url: String,
}

/// 局部更新：缺省字段保持原值
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub mileage: Option<i32>,
    pub year: Option<i32>,
}

impl Item {
    pub fn patched(&self, patch: ItemPatch) -> Self {
        Self {
            make: patch.make.unwrap_or_else(|| self.make.clone()),
            model: patch.model.unwrap_or_else(|| self.model.clone()),
            color: patch.color.unwrap_or_else(|| self.color.clone()),
            mileage: patch.mileage.unwrap_or(self.mileage),
            year: patch.year.unwrap_or(self.year),
            image_url: self.image_url.clone(),
        }
    }
}

impl ValueObject for Item {
    type Error = DomainError;

    fn validate(&self) -> Result<(), Self::Error> {
        let required = [
            ("make", &self.make),
            ("model", &self.model),
            ("color", &self.color),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidValue {
                    reason: format!("{field} must not be empty"),
                });
            }
        }
        if self.mileage < 0 {
            return Err(DomainError::InvalidValue {
                reason: "mileage must be >= 0".into(),
            });
        }
        if self.year <= 0 {
            return Err(DomainError::InvalidValue {
                reason: "year must be > 0".into(),
            });
        }
        Ok(())
    }
}
