//! # 骨龄临床计算模块
//!
//! 提供结果页面背后的确定性计算，包括：
//! - 实足年龄：出生日期与检查日期之间的年/月差，以及韩文格式化
//! - 生长预测：预测成年身高、身高区间、辅助因子、合成生长曲线与综合评分
//! - 图表几何：生长曲线在固定视口中的坐标
//! - 结果报告：结果页面与打印报告的视图模型
//! - 分析会话：一次会话内的输入、结果与骨龄调整值

pub mod age;
pub mod chart;
pub mod growth;
pub mod report;
pub mod session;

// 重新导出主要类型
pub use age::{calculate_age, calculate_age_on, format_age_kr, format_date_kr};
pub use chart::{chart_geometry, ChartGeometry, ChartPoint};
pub use growth::{
    growth_curve, growth_factors, osteo_age_score, predicted_adult_height, predicted_range,
    GrowthFactors, GrowthProjection, HeightRange,
};
pub use report::GrowthReport;
pub use session::{AnalysisSession, SessionEvent, SessionPhase, SessionStateMachine};
