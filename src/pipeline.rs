// 该文件是 Huoyan （火眼） 项目的一部分。
// src/pipeline.rs - 单帧检测流水线
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

use thiserror::Error;
use tracing::debug;

use crate::{
  config::{ConfigError, DetectConfig},
  detect::{DecodeError, DetectResult, decode, suppress},
  frame::Frame,
  model::Model,
  normalize::normalize,
};

#[derive(Error, Debug)]
pub enum PipelineError<E> {
  #[error("推理失败: {0}")]
  Inference(E),
  #[error("输出解码失败: {0}")]
  Decode(#[from] DecodeError),
}

/// 归一化 → 推理 → 解码 → NMS
///
/// 每次调用只依赖当前帧，调用之间不保留任何状态。
pub struct Pipeline<M> {
  config: DetectConfig,
  model: M,
}

impl<M: Model> Pipeline<M> {
  pub fn new(config: DetectConfig, model: M) -> Result<Self, ConfigError> {
    Ok(Self {
      config: config.validated()?,
      model,
    })
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn process_frame(&self, frame: &Frame) -> Result<DetectResult, PipelineError<M::Error>> {
    let Some(tensor) = normalize(frame, self.config.input_size) else {
      debug!("帧尚未就绪，跳过推理");
      return Ok(DetectResult::default());
    };

    let raw = self.model.infer(tensor).map_err(PipelineError::Inference)?;
    let candidates = decode(&raw, &self.config)?;
    let kept = suppress(candidates, &self.config);
    debug!("保留 {} 个检测框", kept.len());

    Ok(kept.into())
  }
}
