use market_domain::domain_event::BusinessContext;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用所需的横切信息，例如：
/// - 业务语境（`BusinessContext`）：关联追踪 `correlation_id`、因果链 `causation_id`、
///   执行者类型/ID 等；执行者 ID 即授权校验使用的身份；
/// - 幂等键（`idempotency_key`）：重复提交同一创建请求时返回首次结果，不再产生事件。
///
/// 典型用法：
/// ```rust
/// use market_application::context::AppContext;
///
/// let ctx = AppContext::user("bob").with_idempotency_key("idem-xyz");
/// assert_eq!(ctx.actor(), Some("bob"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    /// 业务语境（链路追踪、审计主体、操作因果）
    pub biz: BusinessContext,
    /// 幂等键（可选）
    pub idempotency_key: Option<String>,
}

impl AppContext {
    /// 以已认证用户身份调用
    pub fn user(username: &str) -> Self {
        Self {
            biz: BusinessContext::builder()
                .actor_type("user".to_string())
                .actor_id(username.to_string())
                .build(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn actor(&self) -> Option<&str> {
        self.biz.actor_id()
    }
}
