//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 截图比对链路（截图 → 遮挡 → 解码 → 建基准 / 比对 → 落盘）中所有失败来源
//! 收敛到单一的 `ScreenshotError` 枚举，调用侧可以按分支匹配，
//! 例如把 `DimensionMismatch` 与普通的像素差异区分开。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 文件系统错误通过 `#[from]` 原样透传，不做重试也不改写。
//! - `MissingElement` 由截图源实现方构造，引擎只负责透传，绝不吞掉。

/// 截图比对统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    /// 截图或基准文件不是合法的 PNG
    #[error("解码错误：{0}")]
    Decode(String),

    /// PNG 编码失败
    #[error("编码错误：{0}")]
    Encode(String),

    /// 基准图与当前截图尺寸不一致。
    ///
    /// 尺寸漂移本身就是回归信号，不做缩放或裁剪。
    #[error(
        "尺寸不一致：基准图 {baseline_width}x{baseline_height}，当前截图 {actual_width}x{actual_height}"
    )]
    DimensionMismatch {
        baseline_width: u32,
        baseline_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// 需要遮挡的元素无法定位
    #[error("找不到元素：{0}")]
    MissingElement(String),

    /// 截图源返回的其他失败
    #[error("截图失败：{0}")]
    Capture(String),

    /// 截图目标的逻辑尺寸不可用（例如宽度为 0）
    #[error("截图目标无效：{0}")]
    InvalidTarget(String),

    /// 调用参数越界（阈值等）
    #[error("参数错误：{0}")]
    InvalidOptions(String),

    /// 标签无法作为文件名使用
    #[error("标签非法：{0}")]
    InvalidTag(String),

    /// 像素数量超过配置上限
    #[error("资源限制：{0}")]
    ResourceLimit(String),

    /// 配置文件读取或校验失败
    #[error("配置错误：{0}")]
    Config(String),

    /// 后台阻塞任务执行失败
    #[error("后台任务失败：{0}")]
    Task(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ScreenshotError> for String {
    /// 兼容以字符串收集失败信息的测试框架。
    fn from(error: ScreenshotError) -> Self {
        error.to_string()
    }
}
