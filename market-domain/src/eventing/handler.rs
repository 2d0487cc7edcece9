//! 事件处理器（EventHandler）
//!
//! 定义消费某类/多类事件的处理逻辑与元信息（名称、订阅类型），
//! 以及按事件类型显式注册处理器的 `HandlerRegistry`。
//!
use crate::error::{DomainError, DomainResult};
use crate::persist::SerializedEvent;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandledEventType {
    One(String),
    Many(Vec<String>),
}

impl HandledEventType {
    pub fn event_types(&self) -> Vec<String> {
        match self {
            Self::One(t) => vec![t.clone()],
            Self::Many(ts) => ts.clone(),
        }
    }
}

/// 事件处理器：处理某一类型的事件
///
/// 处理器必须幂等：同一事件可能被投递多次。
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于日志与故障记录）
    fn handler_name(&self) -> &str;
    /// 返回该处理器支持的事件类型
    fn handled_event_type(&self) -> HandledEventType;
    /// 处理事件；返回错误即触发重试，耗尽后进入故障路径
    async fn handle(&self, event: &SerializedEvent) -> DomainResult<()>;
}

/// 事件类型 → 处理器 的显式注册表
///
/// 同一消费组内每个事件类型只允许一个处理器。
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    by_type: BTreeMap<String, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_handlers(handlers: Vec<Arc<dyn EventHandler>>) -> DomainResult<Self> {
        let mut registry = Self::new();
        for handler in handlers {
            registry.register(handler)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, handler: Arc<dyn EventHandler>) -> DomainResult<()> {
        let event_types = handler.handled_event_type().event_types();
        if let Some(dup) = event_types.iter().find(|t| self.by_type.contains_key(*t)) {
            return Err(DomainError::HandlerAlreadyRegistered {
                event_type: dup.clone(),
            });
        }
        for event_type in event_types {
            self.by_type.insert(event_type, handler.clone());
        }
        Ok(())
    }

    pub fn get(&self, event_type: &str) -> Option<Arc<dyn EventHandler>> {
        self.by_type.get(event_type).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn EventHandler>)> {
        self.by_type.iter().map(|(t, h)| (t.as_str(), h))
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
