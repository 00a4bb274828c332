//! # BoneAge
//!
//! 手部X光骨龄分析与生长预测工作台的统一入口，重新导出各子模块。

pub use boneage_clinical as clinical;
pub use boneage_core as model;
pub use boneage_integration as integration;
