//! 通知未读计数
//!
//! 未读数以外部服务为准，周期拉取后直接覆盖本地值。已读操作先在本地生效，
//! 远端失败不回滚，等待下一次拉取校正。

use crate::refresh::PeriodicTask;
use clinic_core::{ClinicService, NotificationId, NotificationRecord, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// 通知列表过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl NotificationFilter {
    pub fn matches(&self, record: &NotificationRecord) -> bool {
        match self {
            NotificationFilter::All => true,
            NotificationFilter::Unread => !record.is_read,
            NotificationFilter::Read => record.is_read,
        }
    }
}

/// 乐观更新的结果
///
/// 本地状态已经更新；`remote_confirmed` 只说明远端是否确认，失败时本地不回滚。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimisticUpdate {
    pub unread_after: u64,
    pub remote_confirmed: bool,
}

#[derive(Debug, Default)]
struct NotificationState {
    unread: u64,
    records: Vec<NotificationRecord>,
}

/// 通知计数器
pub struct NotificationCounter {
    service: Arc<dyn ClinicService>,
    state: RwLock<NotificationState>,
}

impl std::fmt::Debug for NotificationCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCounter").finish_non_exhaustive()
    }
}

impl NotificationCounter {
    pub fn new(service: Arc<dyn ClinicService>) -> Self {
        Self {
            service,
            state: RwLock::new(NotificationState::default()),
        }
    }

    /// 用外部服务的未读数覆盖本地值
    pub async fn refresh_unread_count(&self) -> Result<u64> {
        match self.service.unread_notification_count().await {
            Ok(count) => {
                self.state.write().await.unread = count;
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("Failed to refresh unread notification count: {}", e);
                Err(e)
            }
        }
    }

    /// 拉取通知列表，失败时保留原列表
    pub async fn load_notifications(&self) -> Result<usize> {
        match self.service.list_notifications().await {
            Ok(records) => {
                let count = records.len();
                self.state.write().await.records = records;
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("Failed to load notifications: {}", e);
                Err(e)
            }
        }
    }

    pub async fn unread_count(&self) -> u64 {
        self.state.read().await.unread
    }

    pub async fn page(&self, filter: NotificationFilter) -> Vec<NotificationRecord> {
        self.state
            .read()
            .await
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// 标记单条已读
    ///
    /// 本地记录已是已读时不再扣减，计数不低于零。
    pub async fn mark_read(&self, id: NotificationId) -> OptimisticUpdate {
        let unread_after = {
            let mut state = self.state.write().await;
            let already_read = match state.records.iter_mut().find(|r| r.notification_id == id) {
                Some(record) => std::mem::replace(&mut record.is_read, true),
                None => false,
            };
            if !already_read {
                state.unread = state.unread.saturating_sub(1);
            }
            state.unread
        };

        let remote_confirmed = match self.service.mark_notification_read(id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to mark notification {} as read: {}", id, e);
                false
            }
        };

        OptimisticUpdate {
            unread_after,
            remote_confirmed,
        }
    }

    /// 全部标记已读
    pub async fn mark_all_read(&self) -> OptimisticUpdate {
        {
            let mut state = self.state.write().await;
            for record in state.records.iter_mut() {
                record.is_read = true;
            }
            state.unread = 0;
        }

        let remote_confirmed = match self.service.mark_all_notifications_read().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to mark all notifications as read: {}", e);
                false
            }
        };

        OptimisticUpdate {
            unread_after: 0,
            remote_confirmed,
        }
    }

    /// 启动未读数的周期刷新
    pub fn start_auto_refresh(self: &Arc<Self>, period: Duration) -> PeriodicTask {
        let counter = Arc::clone(self);
        PeriodicTask::spawn("notification-refresh", period, move || {
            let counter = Arc::clone(&counter);
            async move {
                let _ = counter.refresh_unread_count().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_integration::{InMemoryClinicService, Operation};

    fn record(id: i64, is_read: bool) -> NotificationRecord {
        NotificationRecord {
            notification_id: id,
            kind: Some("Lab".to_string()),
            title: Some(format!("Result {}", id)),
            message: None,
            is_read,
            priority: None,
            created_on: None,
        }
    }

    async fn counter_with(
        records: Vec<NotificationRecord>,
    ) -> (Arc<NotificationCounter>, Arc<InMemoryClinicService>) {
        let service = Arc::new(InMemoryClinicService::new().with_notifications(records));
        let counter = Arc::new(NotificationCounter::new(service.clone()));
        counter.refresh_unread_count().await.unwrap();
        counter.load_notifications().await.unwrap();
        (counter, service)
    }

    #[tokio::test]
    async fn test_refresh_is_last_write_wins() {
        let (counter, service) = counter_with(vec![record(1, false), record(2, false)]).await;
        assert_eq!(counter.unread_count().await, 2);

        service.set_unread_count(Some(9));
        assert_eq!(counter.refresh_unread_count().await.unwrap(), 9);
        assert_eq!(counter.unread_count().await, 9);

        service.fail(Operation::UnreadCount);
        assert!(counter.refresh_unread_count().await.is_err());
        assert_eq!(counter.unread_count().await, 9);
    }

    #[tokio::test]
    async fn test_mark_read_floors_at_zero() {
        let service = Arc::new(InMemoryClinicService::new());
        let counter = NotificationCounter::new(service.clone());

        let update = counter.mark_read(42).await;
        assert_eq!(update.unread_after, 0);
        assert!(!update.remote_confirmed);
        assert_eq!(counter.unread_count().await, 0);
    }

    #[tokio::test]
    async fn test_mark_read_does_not_roll_back_on_failure() {
        let (counter, service) = counter_with(vec![record(1, false), record(2, false)]).await;
        service.fail(Operation::MarkRead);

        let update = counter.mark_read(1).await;
        assert_eq!(update.unread_after, 1);
        assert!(!update.remote_confirmed);
        assert_eq!(counter.unread_count().await, 1);
        assert_eq!(counter.page(NotificationFilter::Read).await.len(), 1);

        // 同一条再次标记不重复扣减
        let again = counter.mark_read(1).await;
        assert_eq!(again.unread_after, 1);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let (counter, service) =
            counter_with(vec![record(1, false), record(2, true), record(3, false)]).await;

        let update = counter.mark_all_read().await;
        assert_eq!(
            update,
            OptimisticUpdate {
                unread_after: 0,
                remote_confirmed: true
            }
        );
        assert!(counter.page(NotificationFilter::Unread).await.is_empty());
        assert!(service.notifications().iter().all(|n| n.is_read));
    }

    #[tokio::test]
    async fn test_page_filters_and_stale_on_failure() {
        let (counter, service) =
            counter_with(vec![record(1, false), record(2, true), record(3, false)]).await;

        assert_eq!(counter.page(NotificationFilter::All).await.len(), 3);
        assert_eq!(counter.page(NotificationFilter::Unread).await.len(), 2);
        assert_eq!(counter.page(NotificationFilter::Read).await.len(), 1);

        service.fail(Operation::ListNotifications);
        assert!(counter.load_notifications().await.is_err());
        assert_eq!(counter.page(NotificationFilter::All).await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_tracks_remote_count() {
        let (counter, service) = counter_with(vec![record(1, false)]).await;
        let task = counter.start_auto_refresh(Duration::from_secs(30));

        service.set_unread_count(Some(4));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(counter.unread_count().await, 4);

        task.stop();
        service.set_unread_count(Some(7));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.unread_count().await, 4);
    }
}
