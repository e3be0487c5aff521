//! 奖励附件

use serde::{Deserialize, Serialize};

/// 消息附带的奖励条目
///
/// 作为值对象随消息一起存储（JSONB），没有独立的生命周期。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub reward_id: String,
    pub quantity: i32,
}

impl Attachment {
    pub fn new(kind: impl Into<String>, reward_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            kind: kind.into(),
            reward_id: reward_id.into(),
            quantity,
        }
    }

    /// 校验附件，错误追加到 `errors`
    pub fn validate(&self, errors: &mut Vec<String>) {
        if self.kind.trim().is_empty() {
            errors.push("type must be a non-empty string.".to_string());
        }
        if self.reward_id.trim().is_empty() {
            errors.push("rewardId must be a non-empty string.".to_string());
        }
        if self.quantity <= 0 {
            errors.push("quantity must be greater than 0.".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_attachment() {
        let mut errors = Vec::new();
        Attachment::new("currency", "gems", 100).validate(&mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_invalid_attachment_reports_every_problem() {
        let mut errors = Vec::new();
        Attachment::new(" ", "", 0).validate(&mut errors);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(Attachment::new("item", "sword_01", 1)).unwrap();
        assert_eq!(json["type"], "item");
        assert_eq!(json["rewardId"], "sword_01");
        assert_eq!(json["quantity"], 1);
    }
}
