// 该文件是 Huoyan （火眼） 项目的一部分。
// src/model.rs - 模型
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

use crate::frame::{NormalizedTensor, RawOutputTensor};

/// 推理引擎
///
/// 输入张量的所有权转移给推理调用；同一时刻只有一次推理在执行。
pub trait Model {
  type Error;

  fn infer(&self, input: NormalizedTensor) -> Result<RawOutputTensor, Self::Error>;
}

impl<M: Model + ?Sized> Model for &M {
  type Error = M::Error;

  fn infer(&self, input: NormalizedTensor) -> Result<RawOutputTensor, Self::Error> {
    (**self).infer(input)
  }
}

#[cfg(feature = "model_tract")]
mod tract;
#[cfg(feature = "model_tract")]
pub use self::tract::{TractModel, TractModelBuilder, TractModelError};
