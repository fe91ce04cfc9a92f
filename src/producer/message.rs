use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard message format shared by every producer of the ecosystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub event_type: String,
    pub data: Value,
    pub source: String,
    pub priority: MessagePriority,
    pub message_id: String,
    /// RFC 3339 creation time
    pub timestamp: String,
    pub correlation_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl Message {
    pub fn new(event_type: impl Into<String>, data: Value, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            source: source.into(),
            priority: MessagePriority::Normal,
            message_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            correlation_id: None,
            user_id: None,
            session_id: None,
        }
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Partition key: explicit key, else user id, else session id
    pub fn partition_key<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit
            .or(self.user_id.as_deref())
            .or(self.session_id.as_deref())
    }

    /// Wire form: the message fields plus `producer_timestamp` and `topic`
    pub fn envelope(&self, topic: &str) -> Value {
        let mut fields = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        fields.insert(
            "producer_timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        fields.insert("topic".to_string(), Value::String(topic.to_string()));
        Value::Object(fields)
    }
}
