// 该文件是 Huoyan （火眼） 项目的一部分。
// src/task.rs - 任务循环
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

use std::{
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{frame::Frame, model::Model, output::Render, pipeline::Pipeline};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: Pipeline<M>, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// 帧率统计窗口，每满一秒给出一次帧率
struct FpsWindow {
  start: Instant,
  frames: u32,
}

impl FpsWindow {
  fn new(start: Instant) -> Self {
    Self { start, frames: 0 }
  }

  fn tick(&mut self, now: Instant) -> Option<f64> {
    self.frames += 1;
    let elapsed = now.saturating_duration_since(self.start);
    if elapsed < FPS_WINDOW {
      return None;
    }

    let fps = self.frames as f64 / elapsed.as_secs_f64();
    self.start = now;
    self.frames = 0;
    Some(fps)
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  M: Model<Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: Pipeline<M>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!(
      "输入帧获取成功 ({}x{})，开始检测...",
      frame.width(),
      frame.height()
    );
    let now = Instant::now();
    let result = pipeline.process_frame(&frame)?;
    let elapsed = now.elapsed();
    info!("检测完成，{} 个目标，耗时: {:.2?}", result.len(), elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 逐帧处理：一帧完全处理完之后才拉取下一帧
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  stop: Option<Receiver<()>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 使用外部停止信号代替 Ctrl-C
  pub fn with_stop_signal(mut self, stop: Receiver<()>) -> Self {
    self.stop = Some(stop);
    self
  }

  fn install_ctrlc() -> Result<Receiver<()>, ctrlc::Error> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(rx)
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  M: Model<Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: Pipeline<M>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = match self.stop {
      Some(rx) => rx,
      None => Self::install_ctrlc()?,
    };

    let mut frame_index: usize = 0;
    let mut fps = FpsWindow::new(Instant::now());
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_index);

      let now = Instant::now();
      match pipeline.process_frame(&frame) {
        Ok(result) => {
          let elapsed_a = now.elapsed();
          output.render_result(&frame, &result)?;
          let elapsed_b = now.elapsed();
          info!(
            "检测到 {} 个目标，耗时: {:.2?} / {:.2?}",
            result.len(),
            elapsed_a,
            elapsed_b
          );
        }
        // 单帧失败不影响后续帧
        Err(e) => warn!("第 {} 帧处理失败: {}", frame_index, e),
      }

      if let Some(fps) = fps.tick(Instant::now()) {
        info!("帧率: {} FPS", fps.round());
      }

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}
