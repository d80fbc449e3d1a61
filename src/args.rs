// 该文件是 Cheliu （车流） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;

/// 车辆占用时间分析
///
/// 检测阈值、输入尺寸与帧率都是固定值，不提供配置。
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入视频文件，`-` 表示从标准输入读取
  /// 支持格式: *.mp4, *.mov, *.avi, *.mkv
  #[arg(long, value_name = "VIDEO")]
  pub input: String,

  /// 保存到上传目录时使用的文件名（从标准输入读取时必填）
  #[arg(long, value_name = "NAME")]
  pub upload_name: Option<String>,

  /// 上传文件的工作目录
  #[arg(long, default_value = "uploads", value_name = "DIR")]
  pub uploads_dir: PathBuf,

  /// 模型文件目录，缺失的文件会自动下载
  #[arg(long, default_value = "models", value_name = "DIR")]
  pub model_dir: PathBuf,

  /// CSV 报表输出路径
  #[arg(long, default_value = cheliu::output::DEFAULT_REPORT_NAME, value_name = "OUTPUT")]
  pub output: PathBuf,

  /// JSON 摘要输出路径
  #[arg(long, value_name = "FILE")]
  pub summary: Option<PathBuf>,

  /// 最多读取的帧数，跳过的损坏帧也计入
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<u64>,
}
