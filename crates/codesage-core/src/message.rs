//! 对话消息模型

use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// 消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// 获取文本内容
    pub fn text_content(&self) -> &str {
        &self.content
    }
}

/// 调用方提交的历史消息 (角色为任意字符串)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// 只接受 user / assistant 两种角色
    pub fn to_message(&self) -> Option<Message> {
        match self.role.as_str() {
            "user" => Some(Message::user(self.content.clone())),
            "assistant" => Some(Message::assistant(self.content.clone())),
            _ => None,
        }
    }
}

/// 把调用方历史转换为内部消息, 丢弃无法识别的角色
pub fn history_from_turns(turns: &[ChatTurn]) -> Vec<Message> {
    turns
        .iter()
        .filter_map(|turn| {
            let message = turn.to_message();
            if message.is_none() {
                tracing::warn!("Dropping history message with unsupported role: {}", turn.role);
            }
            message
        })
        .collect()
}
