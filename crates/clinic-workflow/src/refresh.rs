//! 周期刷新任务
//!
//! 队列与通知计数各自按固定间隔刷新。停止只会阻止后续的刷新调度，
//! 已经发出的请求会正常完成。

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// 周期任务句柄，丢弃时自动停止调度
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// 启动周期任务，首次执行立即发生
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                if *stop_rx.borrow() {
                    break;
                }
                tick().await;
            }

            tracing::debug!("Periodic task {} stopped", task_name);
        });

        tracing::info!("Periodic task {} started with period {:?}", name, period);
        Self {
            name,
            stop_tx,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 停止调度后续执行
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// 停止并等待当前这一轮执行结束
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Periodic task {} ended abnormally: {}", self.name, e);
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}
