// ==========================================
// 发票导入系统 - 引擎层
// ==========================================
// 职责: 导入之外的业务流程（附件/级联删除/提交）与刷新信号
// ==========================================

pub mod attachment;
pub mod cascade;
pub mod events;
pub mod submission;
pub mod visibility;

pub use attachment::{AttachmentError, AttachmentResult, AttachmentService};
pub use cascade::{CascadeDeleter, CascadeError, CascadeReport, CascadeResult};
pub use events::{NoOpRefreshPublisher, RefreshBus, RefreshEvent, RefreshPublisher};
pub use submission::{SubmissionFailure, SubmissionReport, SubmissionService};
pub use visibility::VisibilityPoller;
