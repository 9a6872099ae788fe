//! # DS CLI
//!
//! 无界面的 Driver Station：按配置文件连接机器人，把事件以 JSON Lines 输出到 stdout。
//!
//! ```bash
//! # 打印默认配置
//! ds-cli config > ds.toml
//!
//! # 连接 3794 队机器人，以自动模式使能
//! ds-cli run --config ds.toml --team 3794 --mode autonomous --enable
//! ```
//!
//! 日志输出到 stderr，级别由 `RUST_LOG` 控制。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ds_sdk::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// DS CLI - 无界面 Driver Station
#[derive(Parser, Debug)]
#[command(name = "ds-cli")]
#[command(about = "Headless FRC Driver Station", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 连接机器人并输出事件
    Run(RunArgs),

    /// 打印配置（默认配置，或校验并规范化指定文件）
    Config {
        /// 配置文件路径
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// 配置文件路径（TOML）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 团队号
    #[arg(short, long)]
    team: Option<u16>,

    /// 协议（frc2014 / frc2015 / frc2016）
    #[arg(short, long)]
    protocol: Option<ProtocolKind>,

    /// 自定义机器人地址（IP 或主机名）
    #[arg(short, long)]
    address: Option<String>,

    /// 控制模式
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// 建立通信后请求使能
    #[arg(long)]
    enable: bool,

    /// 添加的虚拟摇杆数量（每个 6 轴 / 1 POV / 10 按钮）
    #[arg(long, default_value_t = 0)]
    joysticks: usize,

    /// 状态摘要输出间隔（秒，0 表示不输出）
    #[arg(long, default_value_t = 0)]
    status_interval: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ModeArg {
    Teleoperated,
    Autonomous,
    Test,
}

impl From<ModeArg> for ControlMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Teleoperated => ControlMode::Teleoperated,
            ModeArg::Autonomous => ControlMode::Autonomous,
            ModeArg::Test => ControlMode::Test,
        }
    }
}

/// 主循环周期
const POLL_INTERVAL_MS: u64 = 20;

fn main() -> Result<()> {
    ds_sdk::init_logging_with("ds_cli=info,ds_sdk=info,ds_driver=info,ds_protocol=warn");

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Config { config } => {
            let config = load_config(config.as_ref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        },
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<DsConfig> {
    match path {
        Some(path) => DsConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(DsConfig::default()),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(team) = args.team {
        config.team = team;
    }
    if let Some(protocol) = args.protocol {
        config.protocol = protocol;
    }
    if let Some(address) = args.address {
        config.network.robot_address = Some(address);
    }
    config.validate()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let ds = DriverStation::init(&config).context("Failed to start Driver Station")?;
    info!(
        "Driver Station running (team {}, {}, robot {})",
        config.team,
        config.protocol,
        ds.applied_robot_address()
    );

    for _ in 0..args.joysticks {
        ds.joysticks_add(6, 1, 10)?;
    }
    let status_interval = Duration::from_secs(args.status_interval);
    let mut last_status = Instant::now();

    while running.load(Ordering::SeqCst) {
        while let Some(event) = ds.poll_event() {
            println!("{}", serde_json::to_string(&event)?);

            // 首次连接会复位模式并丢弃之前的使能请求，因此在此之后再设置
            if event == DsEvent::CommsChanged(true)
                && let Some(mode) = args.mode
            {
                ds.set_control_mode(mode.into())?;
            }
            if args.enable
                && (event == DsEvent::CommsChanged(true) || event == DsEvent::CodeChanged(true))
            {
                ds.set_robot_enabled(true)?;
            }
        }

        if !status_interval.is_zero() && last_status.elapsed() >= status_interval {
            last_status = Instant::now();
            let snapshot = ds.snapshot();
            eprintln!(
                "[{}] {:.2} V | {}",
                snapshot.applied_robot_address, snapshot.voltage, snapshot.status_string
            );
            eprintln!("{}", serde_json::to_string(&ds.metrics())?);
        }

        ds_sdk::sleep(POLL_INTERVAL_MS);
    }

    let metrics = ds.metrics();
    ds.close()?;
    eprintln!(
        "Sent {} packets, received {} ({:.1}% loss)",
        metrics.packets_sent,
        metrics.packets_received,
        metrics.packet_loss()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::parse_from([
            "ds-cli",
            "run",
            "--team",
            "3794",
            "--protocol",
            "frc2015",
            "--mode",
            "autonomous",
            "--enable",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.team, Some(3794));
        assert_eq!(args.protocol, Some(ProtocolKind::Frc2015));
        assert!(matches!(args.mode, Some(ModeArg::Autonomous)));
        assert!(args.enable);
        assert_eq!(args.joysticks, 0);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
