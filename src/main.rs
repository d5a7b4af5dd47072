// ==========================================
// 发票导入系统 - 命令行入口
// ==========================================
// 职责: 解析命令 → 组装 AppState → 调用 API → 输出 JSON
// ==========================================

use anyhow::Context;
use clap::{Parser, Subcommand};
use invoice_intake::app::{get_default_db_path, AppState};
use invoice_intake::config::config_keys;
use invoice_intake::domain::UserContext;
use invoice_intake::importer::UploadProgressListener;
use invoice_intake::logging;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "invoice-intake", version, about = "发票批量导入与审核")]
struct Cli {
    /// 数据库文件路径
    #[arg(long, env = "INVOICE_INTAKE_DB_PATH", global = true)]
    db: Option<String>,

    /// 当前用户
    #[arg(long, env = "INVOICE_INTAKE_USER", default_value = "local-user", global = true)]
    user: String,

    /// 会话标识（未指定时为本次命令新建会话）
    #[arg(long, env = "INVOICE_INTAKE_SESSION", global = true)]
    session_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 导入 CSV/XLSX 发票文件（多个文件按顺序处理）
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// 列出上传文件
    Files {
        /// 仅当前会话
        #[arg(long)]
        current_session: bool,
    },
    /// 查看单个上传文件
    File { job_id: String },
    /// 列出工作记录
    Records {
        /// 按上传任务过滤
        #[arg(long)]
        job: Option<String>,
    },
    /// 工作区汇总
    Summary,
    /// 为记录挂载 PDF
    Attach { record_id: String, file: PathBuf },
    /// 解除记录的 PDF
    Detach { record_id: String },
    /// 获取附件限时链接
    Url { record_id: String },
    /// 提交全部有效工作记录
    Submit,
    /// 列出已提交记录
    Submitted,
    /// 删除上传文件及其全部记录和附件（不可恢复）
    DeleteFile {
        job_id: String,
        /// 确认删除
        #[arg(long)]
        yes: bool,
    },
    /// 配置管理
    Config {
        #[command(subcommand)]
        sub: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// 查看配置（不指定键时列出全部）
    Get { key: Option<String> },
    /// 设置配置
    Set { key: String, value: String },
}

/// 上传进度输出到日志
struct LogProgress;

impl UploadProgressListener for LogProgress {
    fn on_progress(&self, file_name: &str, percent: u8) {
        tracing::info!(file_name, percent, "上传进度");
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("序列化输出失败")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::info!(version = invoice_intake::VERSION, db_path = %db_path, "{}", invoice_intake::APP_NAME);

    let state = AppState::new(db_path).await.map_err(anyhow::Error::msg)?;
    let ctx = match cli.session_id {
        Some(session_id) => UserContext::new(cli.user, session_id),
        None => UserContext::new_session(cli.user),
    };

    // 刷新事件写入日志
    let mut refresh_rx = state.refresh_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = refresh_rx.recv().await {
            tracing::debug!(event = ?event, "刷新事件");
        }
    });

    match cli.command {
        Commands::Import { files } => {
            let response = state
                .upload_api
                .upload_paths(&ctx, &files, Some(Arc::new(LogProgress)))
                .await?;
            print_json(&serde_json::json!({
                "session_id": ctx.session_id,
                "result": response,
            }))?;
        }
        Commands::Files { current_session } => {
            let files = if current_session {
                state.file_api.list_session_files(&ctx).await?
            } else {
                state.file_api.list_files(&ctx).await?
            };
            print_json(&files)?;
        }
        Commands::File { job_id } => {
            print_json(&state.file_api.get_file(&ctx, &job_id).await?)?;
        }
        Commands::Records { job } => {
            let records = match job {
                Some(job_id) => state.invoice_api.list_by_job(&ctx, &job_id).await?,
                None => state.invoice_api.list_working(&ctx).await?,
            };
            print_json(&records)?;
        }
        Commands::Summary => {
            print_json(&state.invoice_api.summary(&ctx).await?)?;
        }
        Commands::Attach { record_id, file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("读取附件失败: {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.display().to_string());
            let document = state
                .invoice_api
                .attach_document(&ctx, &record_id, &file_name, bytes)
                .await?;
            print_json(&document)?;
        }
        Commands::Detach { record_id } => {
            print_json(&state.invoice_api.detach_document(&ctx, &record_id).await?)?;
        }
        Commands::Url { record_id } => {
            println!("{}", state.invoice_api.document_url(&ctx, &record_id).await?);
        }
        Commands::Submit => {
            print_json(&state.invoice_api.submit_all(&ctx).await?)?;
        }
        Commands::Submitted => {
            print_json(&state.invoice_api.list_submitted(&ctx).await?)?;
        }
        Commands::DeleteFile { job_id, yes } => {
            print_json(&state.file_api.delete_file(&ctx, &job_id, yes).await?)?;
        }
        Commands::Config { sub } => match sub {
            ConfigCommands::Get { key: Some(key) } => {
                let value = state.config_manager.get_global_config_value(&key)?;
                print_json(&serde_json::json!({ "key": key, "value": value }))?;
            }
            ConfigCommands::Get { key: None } => {
                let configs = state.config_manager.list_configs()?;
                print_json(&serde_json::json!({
                    "configs": configs,
                    "known_keys": config_keys::ALL,
                }))?;
            }
            ConfigCommands::Set { key, value } => {
                state.config_manager.set_config_value(&key, &value)?;
                print_json(&serde_json::json!({ "key": key, "value": value }))?;
            }
        },
    }

    Ok(())
}
