use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_core::config::AppConfig;
use relay_core::logging::init_logging;
use relay_core::{BatchMode, EventFilter, EventKind, Task, TaskPriority};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

mod app;

use app::{load_task_specs, Application};

/// 多后端LLM任务分发
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(version = "1.0.0")]
#[command(about = "多后端LLM任务分发引擎")]
#[command(long_about = "按执行计划依次尝试多个LLM后端，带重试、回退和事件审计")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径，未指定时依次查找 config/relay.toml、relay.toml
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 分发单个任务
    Run {
        /// 提示词
        prompt: String,
        /// 系统指令
        #[arg(short, long)]
        system: Option<String>,
        /// 任务优先级 (low, normal, high, critical)
        #[arg(short, long, default_value = "normal")]
        priority: String,
        /// 后端顺序，覆盖配置 (可重复或逗号分隔)
        #[arg(short, long, value_delimiter = ',')]
        backend: Vec<String>,
    },
    /// 批量分发JSON文件中的任务
    Batch {
        /// 任务文件：提示词字符串或任务对象组成的JSON数组
        file: PathBuf,
        /// 执行模式 (sequential, concurrent)，默认取配置
        #[arg(short, long)]
        mode: Option<String>,
    },
    /// 查询事件日志
    Events {
        /// 任务ID
        #[arg(short, long)]
        task: Option<Uuid>,
        /// 事件类型，例如 task_started、backend-invoked
        #[arg(short, long)]
        kind: Option<String>,
        /// 后端标识
        #[arg(short, long)]
        backend: Option<String>,
    },
    /// 清空事件日志
    ClearEvents,
    /// 列出已注册后端并探测可用性
    Backends,
    /// 输出生效的配置 (TOML)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;

    init_logging(&config.logging).context("初始化日志系统失败")?;
    info!("relay 启动, 命令: {:?}", cli.command);

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let app = Application::new(config).await?;

    match cli.command {
        Commands::Run {
            prompt,
            system,
            priority,
            backend,
        } => {
            let priority: TaskPriority = priority
                .parse()
                .with_context(|| format!("无效的任务优先级: {priority}"))?;
            let mut task = Task::new(prompt).with_priority(priority);
            if let Some(system) = system {
                task = task.with_system_prompt(system);
            }

            let result = app.run_task(task, Some(backend)).await?;
            print_json(&result)?;
        }
        Commands::Batch { file, mode } => {
            let mode = match mode {
                Some(mode) => mode
                    .parse::<BatchMode>()
                    .with_context(|| format!("无效的执行模式: {mode}"))?,
                None => app.config().dispatch.default_mode,
            };
            let specs = load_task_specs(&file)?;
            let entries = app.run_batch(specs, mode).await;
            print_json(&entries)?;
        }
        Commands::Events {
            task,
            kind,
            backend,
        } => {
            let kind = kind
                .map(|k| k.parse::<EventKind>())
                .transpose()
                .context("无效的事件类型")?;
            let filter = EventFilter {
                kind,
                task_id: task,
                backend_id: backend,
            };
            let events = app.events(&filter).await?;
            print_json(&events)?;
        }
        Commands::ClearEvents => {
            let report = app.clear_events().await?;
            info!("事件日志已清空");
            print_json(&report)?;
        }
        Commands::Backends => {
            print_json(&app.backends().await)?;
        }
        Commands::Config => {}
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("序列化输出失败")?;
    println!("{output}");
    Ok(())
}
