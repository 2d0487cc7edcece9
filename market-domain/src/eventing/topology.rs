//! 队列命名
//!
//! 队列名由消费组与事件类型确定性推导（kebab-case），独立部署的同组实例
//! 无需协调即可汇聚到同一逻辑队列，例如 `search-auction-created`、
//! `auction-fault-auction-created`。
//!

pub fn queue_name(consumer_group: &str, event_type: &str) -> String {
    format!("{}-{}", kebab_case(consumer_group), kebab_case(event_type))
}

pub fn kebab_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }

        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary && !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}
