// 该文件是 Cheliu （车流） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

mod args;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use cheliu::{
  model::{DarknetModel, ModelArtifacts, VehicleDetector},
  output::RunSummary,
  task::{CancelFlag, OccupancyTask, RunOutcome, process_video},
  upload::UploadStore,
};

fn read_input(args: &args::Args) -> Result<(String, Vec<u8>)> {
  if args.input == "-" {
    let name = args
      .upload_name
      .clone()
      .context("从标准输入读取时需要 --upload-name")?;
    let mut bytes = Vec::new();
    std::io::stdin()
      .read_to_end(&mut bytes)
      .context("无法读取标准输入")?;
    return Ok((name, bytes));
  }

  let path = Path::new(&args.input);
  let name = match &args.upload_name {
    Some(name) => name.clone(),
    None => path
      .file_name()
      .and_then(|name| name.to_str())
      .map(str::to_string)
      .with_context(|| format!("无法确定文件名: {}", args.input))?,
  };
  let bytes = std::fs::read(path).with_context(|| format!("无法读取视频文件: {}", args.input))?;
  Ok((name, bytes))
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入来源: {}", args.input);
  info!("模型目录: {}", args.model_dir.display());
  info!("报表输出: {}", args.output.display());

  // 模型文件缺失且无法下载时直接退出
  let artifacts = ModelArtifacts::ensure(&args.model_dir).context("无法准备模型文件")?;
  let model = DarknetModel::load(&artifacts).context("无法加载模型")?;
  let mut detector = VehicleDetector::new(model);

  let (name, bytes) = read_input(&args)?;
  if bytes.is_empty() {
    bail!("视频内容为空: {}", args.input);
  }
  let store = UploadStore::new(&args.uploads_dir);
  let video_path = store.persist(&name, &bytes).context("无法保存上传文件")?;

  let cancel = CancelFlag::install_ctrlc_handler()?;
  let task = OccupancyTask::default()
    .with_cancel_flag(cancel)
    .with_max_frames(args.max_frames);

  let outcome = process_video(&video_path, &mut detector, task)?;

  match &outcome {
    RunOutcome::NoVehicles { stats } => {
      println!("未检测到车辆 (no vehicles detected)");
      println!("总帧数: {}", stats.frames_processed);
    }
    RunOutcome::Vehicles { report, stats } => {
      println!(
        "{:<28} {:>10} {:>10} {:>16}",
        "Vehicle", "Entry Time", "Exit Time", "Occupancy Time"
      );
      for row in report {
        println!(
          "{:<28} {:>10} {:>10} {:>16.4}",
          row.vehicle.to_string(),
          row.entry,
          row.exit,
          row.occupancy_secs
        );
      }
      println!();
      println!("总帧数: {}", stats.frames_processed);
      println!("跳过帧数: {}", stats.frames_skipped);
      println!("车辆数: {}", report.len());

      report
        .save_csv(&args.output)
        .with_context(|| format!("无法写入报表: {}", args.output.display()))?;
      println!("报表文件: {}", args.output.display());
    }
  }

  if let Some(path) = &args.summary {
    RunSummary::new(&video_path, &outcome)
      .save(path)
      .with_context(|| format!("无法写入摘要: {}", path.display()))?;
    info!("摘要已保存: {}", path.display());
  }

  Ok(())
}
