//! 面向用户的提示消息
//!
//! 队列、处方与通知组件在调用点把成功或失败转换为提示，交给 [`NoticeSink`] 呈现。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// 提示类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// 一条用户可见提示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, message)
    }

    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// 提示接收端
pub trait NoticeSink: Send + Sync {
    fn publish(&self, notice: Notice);
}

/// 把提示写入日志
#[derive(Debug, Default)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn publish(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Error => tracing::warn!(target: "clinic::notice", "{}", notice.message),
            _ => tracing::info!(target: "clinic::notice", "{}", notice.message),
        }
    }
}

/// 内存中的提示记录
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出并清空已记录的提示
    pub fn drain(&self) -> Vec<Notice> {
        let mut notices = self.notices.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *notices)
    }

    pub fn last(&self) -> Option<Notice> {
        let notices = self.notices.lock().unwrap_or_else(|e| e.into_inner());
        notices.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NoticeSink for NoticeLog {
    fn publish(&self, notice: Notice) {
        tracing::debug!("notice published: {:?} {}", notice.kind, notice.message);
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_log_drain() {
        let log = NoticeLog::new();
        log.publish(Notice::success("Asha Rai → Checked In"));
        log.publish(Notice::error("Failed to update status"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().kind, NoticeKind::Error);

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(log.is_empty());
    }
}
