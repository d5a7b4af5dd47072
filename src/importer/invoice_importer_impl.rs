// ==========================================
// 发票导入系统 - 导入管道实现
// ==========================================
// 职责: 整合导入流程，从用户选择的文件到任务终态
// 流程: 过滤 → 上传 → 建任务(PENDING) → PROCESSING → 读取 → 解析
//       → 行校验 → 分批落库 → 终态 → 可见性轮询 → 刷新通知
// 约束: 文件严格串行处理；单个文件失败不影响其余文件
// ==========================================

use crate::config::IntakeConfigReader;
use crate::domain::import::FileImportOutcome;
use crate::domain::invoice::ValidatedRow;
use crate::domain::job::{JobCompletion, UploadJob};
use crate::domain::session::UserContext;
use crate::engine::events::{RefreshEvent, RefreshPublisher};
use crate::engine::visibility::VisibilityPoller;
use crate::importer::batch_importer::BatchImporter;
use crate::importer::error::ImportResult;
use crate::importer::file_ingestor::{filter_selection, AcceptedFile, FileIngestor, SelectedFile};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::invoice_importer_trait::{InvoiceImporter, RawRow, UploadProgressListener};
use crate::importer::row_validator::RowValidator;
use crate::repository::{InvoiceRecordRepository, UploadJobRepository};
use crate::storage::ObjectStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

// ==========================================
// InvoiceImporterImpl - 导入管道实现
// ==========================================
pub struct InvoiceImporterImpl {
    // 数据访问层
    jobs: Arc<dyn UploadJobRepository>,
    records: Arc<dyn InvoiceRecordRepository>,

    // 配置读取器
    config: Arc<dyn IntakeConfigReader>,

    // 导入组件
    ingestor: FileIngestor,
    parser: UniversalFileParser,
    validator: RowValidator,

    // 刷新通知
    publisher: Arc<dyn RefreshPublisher>,
}

impl InvoiceImporterImpl {
    pub fn new(
        jobs: Arc<dyn UploadJobRepository>,
        records: Arc<dyn InvoiceRecordRepository>,
        store: Arc<dyn ObjectStore>,
        config: Arc<dyn IntakeConfigReader>,
        publisher: Arc<dyn RefreshPublisher>,
    ) -> Self {
        Self {
            jobs,
            records,
            config,
            ingestor: FileIngestor::new(store),
            parser: UniversalFileParser,
            validator: RowValidator,
            publisher,
        }
    }

    /// 处理单个文件（不返回错误，失败转为 FileImportOutcome::Failed）
    #[instrument(skip_all, fields(file_name = %accepted.file.name, kind = %accepted.kind))]
    async fn import_one(
        &self,
        ctx: &UserContext,
        accepted: AcceptedFile,
        listener: Option<Arc<dyn UploadProgressListener>>,
        batch_importer: &BatchImporter,
        poller: &VisibilityPoller,
    ) -> FileImportOutcome {
        let file_name = accepted.file.name.clone();

        // 1. 上传
        let source_key = match self.ingestor.upload(ctx, &accepted, listener).await {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "文件上传失败，跳过该文件");
                return FileImportOutcome::Failed {
                    file_name,
                    job_id: None,
                    message: e.to_string(),
                };
            }
        };

        // 2. 建任务（解析任何行之前）
        let mut job = UploadJob::pending(
            &ctx.user_id,
            &ctx.session_id,
            &file_name,
            accepted.kind,
            &source_key,
        );
        if let Err(e) = self.jobs.insert(&job).await {
            error!(error = %e, "创建上传任务失败");
            self.discard_upload(&source_key).await;
            return FileImportOutcome::Failed {
                file_name,
                job_id: None,
                message: e.to_string(),
            };
        }
        let job_id = job.job_id.clone();

        // 3. PROCESSING
        let started_at = Utc::now();
        if let Err(e) = self.jobs.mark_processing(&job_id, started_at).await {
            error!(job_id = %job_id, error = %e, "任务状态更新失败");
            // 任务无法推进：撤销 PENDING 任务与已上传字节
            self.discard_upload(&source_key).await;
            let job_id = match self.jobs.delete(&job_id).await {
                Ok(()) => None,
                Err(delete_err) => {
                    warn!(job_id = %job_id, error = %delete_err, "撤销上传任务失败");
                    Some(job_id)
                }
            };
            return FileImportOutcome::Failed {
                file_name,
                job_id,
                message: e.to_string(),
            };
        }

        // 4. 读取并解析
        let raw_rows = match self.read_rows(&accepted, &source_key).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "文件读取或解析失败");
                let completion = JobCompletion::failed_before_rows(e.to_string());
                if let Err(finalize_err) = self.jobs.finalize(&job_id, &completion).await {
                    error!(job_id = %job_id, error = %finalize_err, "任务终态更新失败");
                }
                self.publisher.publish(RefreshEvent::JobImported {
                    job_id: job_id.clone(),
                    status: completion.status,
                    visible: true,
                });
                return FileImportOutcome::Failed {
                    file_name,
                    job_id: Some(job_id),
                    message: e.to_string(),
                };
            }
        };

        // 5. 行校验（表头为第 1 行）
        let rows: Vec<ValidatedRow> = raw_rows
            .iter()
            .enumerate()
            .map(|(idx, raw)| self.validator.validate(raw, idx + 2))
            .collect();

        // 6. 分批落库 + 终态
        let summary = batch_importer.import(&ctx.user_id, &job_id, rows).await;

        // 7. 等待写入可见后通知刷新
        let expected = summary.persisted;
        let expected_status = summary.status;
        let (jobs, records, polled_job_id) = (&self.jobs, &self.records, job_id.as_str());
        let visible = poller
            .wait_until(|| async move {
                let job_visible = matches!(
                    jobs.find_by_id(polled_job_id).await,
                    Ok(Some(stored)) if stored.status == expected_status
                );
                let rows_visible = matches!(
                    records.count_by_job(polled_job_id).await,
                    Ok(count) if count >= expected
                );
                job_visible && rows_visible
            })
            .await;
        if !visible {
            warn!(job_id = %job_id, "导入结果尚未可见，仍发送刷新通知");
        }

        job = match self.jobs.find_by_id(&job_id).await {
            Ok(Some(stored)) => stored,
            _ => {
                job.status = summary.status;
                job.started_at = Some(started_at);
                job.total_invoices = Some(summary.total as i64);
                job.successful_invoices = Some(summary.successful as i64);
                job.failed_invoices = Some(summary.failed as i64);
                job.error_summary = summary.error_summary.clone();
                job
            }
        };

        self.publisher.publish(RefreshEvent::JobImported {
            job_id: job_id.clone(),
            status: summary.status,
            visible,
        });

        FileImportOutcome::Imported {
            file_name,
            job,
            summary,
        }
    }

    /// 尽力删除已上传的文件字节，失败只记录日志
    async fn discard_upload(&self, source_key: &str) {
        if let Err(e) = self.ingestor.remove(source_key).await {
            warn!(key = %source_key, error = %e, "清理已上传文件失败");
        }
    }

    async fn read_rows(
        &self,
        accepted: &AcceptedFile,
        source_key: &str,
    ) -> ImportResult<Vec<RawRow>> {
        let bytes = self.ingestor.fetch(source_key).await?;
        self.parser.parse(accepted.kind, &bytes)
    }
}

#[async_trait]
impl InvoiceImporter for InvoiceImporterImpl {
    #[instrument(skip_all, fields(user_id = %ctx.user_id, files = files.len()))]
    async fn import_selection(
        &self,
        ctx: &UserContext,
        files: Vec<SelectedFile>,
        listener: Option<Arc<dyn UploadProgressListener>>,
    ) -> ImportResult<Vec<FileImportOutcome>> {
        // 整批过滤：有不支持的文件时什么都不做
        let accepted = filter_selection(files)?;
        if accepted.is_empty() {
            return Ok(Vec::new());
        }

        // 配置在一次选择内只读取一次
        let batch_size = self.config.get_import_batch_size().await?;
        let poller = VisibilityPoller::from_config(self.config.as_ref()).await?;
        let batch_importer = BatchImporter::new(self.records.clone(), self.jobs.clone(), batch_size);

        info!(files = accepted.len(), batch_size, "开始导入所选文件");

        let mut outcomes = Vec::with_capacity(accepted.len());
        for file in accepted {
            let outcome = self
                .import_one(ctx, file, listener.clone(), &batch_importer, &poller)
                .await;
            outcomes.push(outcome);
        }

        let failed_files = outcomes
            .iter()
            .filter(|o| matches!(o, FileImportOutcome::Failed { .. }))
            .count();
        info!(files = outcomes.len(), failed_files, "所选文件处理完成");

        self.publisher.publish(RefreshEvent::SelectionImported {
            file_count: outcomes.len(),
            failed_files,
        });

        Ok(outcomes)
    }
}
