// ==========================================
// 分批导入引擎 - 命令行入口
// ==========================================
// 子命令: count（统计记录数）/ run（执行或续传导入）/ profiles（列出配置）
// ==========================================

use std::path::PathBuf;

use anyhow::{Context, Result};
use batch_import::app::{get_default_db_path, get_default_upload_dir, AppState};
use batch_import::i18n::{set_locale, t, t_with_args};
use batch_import::repository::{ProfileRepository, SessionRepository};
use clap::{Parser, Subcommand};
use futures::StreamExt;

/// 分批导入引擎命令行
#[derive(Parser, Debug)]
#[command(name = "batch-import")]
#[command(about = "Resumable batch import with a deferred second pass")]
#[command(version)]
struct Cli {
    /// 数据库文件路径
    #[arg(long, env = "BATCH_IMPORT_DB_PATH")]
    db: Option<String>,

    /// 上传目录（未处理数据桶所在目录）
    #[arg(long, env = "BATCH_IMPORT_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// 界面语言（zh-CN / en）
    #[arg(long, default_value = "zh-CN")]
    locale: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 统计输入文件的记录数
    Count {
        /// 输入文件（.csv / .xml）
        file: PathBuf,
        /// 映射配置名
        #[arg(short, long)]
        profile: String,
    },

    /// 执行导入（指定 --session 时续传）
    Run {
        /// 输入文件（.csv / .xml）
        file: PathBuf,
        /// 映射配置名
        #[arg(short, long)]
        profile: String,
        /// 每批记录数
        #[arg(short, long)]
        batch_size: Option<u64>,
        /// 操作用户
        #[arg(short, long, default_value = "admin")]
        user: String,
        /// 续传的会话 ID
        #[arg(long)]
        session: Option<String>,
    },

    /// 列出可见映射配置
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    batch_import::logging::init();

    let cli = Cli::parse();
    set_locale(&cli.locale);

    tracing::info!("{} {}", batch_import::SYSTEM_NAME, batch_import::VERSION);

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    let upload_dir = cli.upload_dir.unwrap_or_else(get_default_upload_dir);
    let state = AppState::new(db_path, upload_dir)
        .await
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    match cli.command {
        Command::Count { file, profile } => {
            let request = state.build_request(&file, &profile, "admin", None)?;
            let total = state.import_service.prepare_import(&request)?.to_string();
            let file_label = file.display().to_string();
            println!(
                "{}",
                t_with_args(
                    "import.total_count",
                    &[("file", file_label.as_str()), ("count", total.as_str())]
                )
            );
        }
        Command::Run {
            file,
            profile,
            batch_size,
            user,
            session,
        } => {
            if !file.exists() {
                let path = file.display().to_string();
                anyhow::bail!(t_with_args("import.file_not_found", &[("path", path.as_str())]));
            }

            let request = state.build_request(&file, &profile, &user, batch_size)?;
            let run = match session {
                Some(session_id) => state.import_service.resume(request, &session_id)?,
                None => {
                    let session = state.session_repo.create_session()?;
                    state.import_service.import(request, session)?
                }
            };
            println!("session: {}", run.session().session_id);

            let mut batches = 0usize;
            let mut stream = Box::pin(run.into_stream());
            while let Some(item) = stream.next().await {
                match item {
                    Ok(progress) => {
                        batches += 1;
                        let position = progress.position.to_string();
                        println!(
                            "{}",
                            t_with_args(
                                "import.progress",
                                &[
                                    ("profile", progress.profile_name.as_str()),
                                    ("position", position.as_str()),
                                ]
                            )
                        );
                    }
                    Err(e) => {
                        let error = e.to_string();
                        eprintln!("{}", t_with_args("import.failed", &[("error", error.as_str())]));
                        return Err(e.into());
                    }
                }
            }
            let batches = batches.to_string();
            println!("{}", t_with_args("import.finished", &[("batches", batches.as_str())]));
        }
        Command::Profiles => {
            println!("{}", t("cli.profiles_header"));
            for profile in state.profile_repo.list_visible()? {
                println!("  {} ({})", profile.name, profile.profile_type);
            }
        }
    }

    Ok(())
}
