// ==========================================
// 发票导入系统 - 刷新事件发布
// ==========================================
// 职责: 定义刷新事件发布 trait，替代跨组件的全局回调
// 说明: 发布方只依赖 trait；视图侧通过 RefreshBus 订阅并重新拉取列表
// ==========================================

use crate::domain::types::JobStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// 默认广播缓冲容量
pub const DEFAULT_BUS_CAPACITY: usize = 64;

// ==========================================
// 刷新事件类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshEvent {
    /// 单个文件导入结束
    JobImported {
        job_id: String,
        status: JobStatus,
        /// 写入是否已确认可读
        visible: bool,
    },
    /// 一次多文件选择全部处理结束
    SelectionImported { file_count: usize, failed_files: usize },
    /// 工作记录变更（附件挂载/解除）
    RecordsChanged { record_id: String },
    /// 文件及其记录已级联删除
    FileDeleted { job_id: String },
    /// 工作记录已提交
    Submitted { submitted: usize },
}

impl RefreshEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshEvent::JobImported { .. } => "JobImported",
            RefreshEvent::SelectionImported { .. } => "SelectionImported",
            RefreshEvent::RecordsChanged { .. } => "RecordsChanged",
            RefreshEvent::FileDeleted { .. } => "FileDeleted",
            RefreshEvent::Submitted { .. } => "Submitted",
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 刷新事件发布者
///
/// 发布不会失败：没有订阅者时事件被丢弃。
pub trait RefreshPublisher: Send + Sync {
    /// 发布事件，返回收到事件的订阅者数量
    fn publish(&self, event: RefreshEvent) -> usize;
}

/// 空操作发布者（单元测试等不需要刷新的场景）
#[derive(Debug, Clone, Default)]
pub struct NoOpRefreshPublisher;

impl RefreshPublisher for NoOpRefreshPublisher {
    fn publish(&self, event: RefreshEvent) -> usize {
        tracing::debug!(event_type = event.as_str(), "NoOpRefreshPublisher: 跳过事件发布");
        0
    }
}

// ==========================================
// RefreshBus - 基于 tokio broadcast 的事件总线
// ==========================================
#[derive(Debug, Clone)]
pub struct RefreshBus {
    sender: broadcast::Sender<RefreshEvent>,
}

impl RefreshBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅刷新事件
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl RefreshPublisher for RefreshBus {
    fn publish(&self, event: RefreshEvent) -> usize {
        let event_type = event.as_str();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(event_type, receivers, "刷新事件已发布");
                receivers
            }
            Err(_) => {
                tracing::debug!(event_type, "无订阅者，刷新事件丢弃");
                0
            }
        }
    }
}
