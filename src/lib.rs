//! # 截图比对引擎 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              端到端测试（WebDriver / CDP / Mock）          │
//! │                                                          │
//! │   impl CaptureSource ── 截图 / 元素位置 / 视口尺寸        │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ check_element_screenshot / check_page_screenshot
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            引擎 (Rust)                           │
//! │                                                          │
//! │  ┌─ engine ───── ScreenshotEngine（流程编排 + 耗时日志）   │
//! │  │   ├─ masking     忽略区域解析 + 涂黑                   │
//! │  │   ├─ raster      PNG ↔ RGBA 像素网格                   │
//! │  │   ├─ diff        YIQ 色差 + 抗锯齿排除                 │
//! │  │   └─ storage     baseline / actual / diff 落盘         │
//! │  │                                                       │
//! │  ├─ capture ──── CaptureSource 抽象 + CaptureTarget       │
//! │  ├─ config ───── EngineConfig（JSON 配置）                │
//! │  └─ error ────── ScreenshotError（统一错误类型）          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`engine`] | 对外入口，编排截图、遮挡、建基准与比对 |
//! | [`capture`] | 截图源接口，元素 / 整页两种截图目标 |
//! | [`masking`] | 忽略矩形与元素框的像素换算，涂黑 |
//! | [`diff`] | 逐像素感知色差比对，生成差异图 |
//! | [`raster`] | PNG 解码/编码，RGBA 像素网格 |
//! | [`storage`] | 截图目录布局与基准状态 |
//! | [`config`] | 默认阈值、配色、像素上限、过期产物清理策略 |
//! | [`error`] | 统一错误类型 `ScreenshotError` |

pub mod capture;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod masking;
pub mod options;
pub mod raster;
pub mod storage;

pub use capture::{CaptureSource, CaptureTarget, Point, Size};
pub use config::EngineConfig;
pub use engine::{ComparisonOutcome, ComparisonReport, ScreenshotEngine};
pub use error::ScreenshotError;
pub use masking::Rectangle;
pub use options::ScreenshotOptions;
pub use raster::RasterImage;
pub use storage::{ArtifactKind, ArtifactStore, BaselineState};
