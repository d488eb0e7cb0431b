//! 截图产物存储模块
//!
//! # 设计思路
//!
//! 每个标签最多对应三张图片：
//!
//! ```text
//! <root>/baseline/<tag>.png   基准图，首次运行生成，之后只读
//! <root>/actual/<tag>.png     最近一次失败时的截图
//! <root>/diff/<tag>.png       最近一次失败时的差异图
//! ```
//!
//! 只有本模块接触文件系统。标签的状态只有两种：`NoBaseline` 与 `HasBaseline`，
//! 回到 `NoBaseline` 的唯一途径是外部删除基准文件。
//!
//! # 实现思路
//!
//! - `initialize` 规范化根目录并创建三个子目录，失败在启动阶段就返回。
//! - 标签在拼接路径前校验，保证产物不会写到根目录之外。
//! - 比对通过时默认不清理旧的 actual/diff；由调用方决定是否 `prune_failure_artifacts`。

use std::fs;
use std::path::{Path, PathBuf};

use crate::diff::{self, DiffOptions};
use crate::error::ScreenshotError;
use crate::raster::RasterImage;

/// 产物类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Baseline,
    Actual,
    Diff,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [Self::Actual, Self::Diff, Self::Baseline];

    /// 子目录名
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Actual => "actual",
            Self::Diff => "diff",
        }
    }
}

/// 标签的基准状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineState {
    NoBaseline,
    HasBaseline,
}

/// `compare` 的结果
#[derive(Debug, Clone)]
pub struct StoreComparison {
    /// 真实差异像素数量
    pub diff_pixels: u64,
    /// 失败时写入的 actual 文件
    pub actual_path: Option<PathBuf>,
    /// 失败时写入的 diff 文件
    pub diff_path: Option<PathBuf>,
}

/// 截图产物存储
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// 打开截图根目录，确保三个子目录存在。
    ///
    /// # 参数
    /// * `root` - 截图根目录，末尾的路径分隔符会被去掉
    ///
    /// # 返回
    /// - `Ok(ArtifactStore)` — 目录已就绪
    /// - `Err(ScreenshotError::Io)` — 无法创建目录（权限、磁盘等）
    pub fn initialize(root: impl AsRef<Path>) -> Result<Self, ScreenshotError> {
        let root = normalize_root(root.as_ref());

        for kind in ArtifactKind::ALL {
            let dir = root.join(kind.dir_name());
            fs::create_dir_all(&dir)?;
        }

        log::info!("📂 截图目录已就绪: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 产物文件路径
    pub fn artifact_path(&self, kind: ArtifactKind, tag: &str) -> Result<PathBuf, ScreenshotError> {
        validate_tag(tag)?;
        Ok(self.root.join(kind.dir_name()).join(format!("{tag}.png")))
    }

    pub fn baseline_state(&self, tag: &str) -> Result<BaselineState, ScreenshotError> {
        let path = self.artifact_path(ArtifactKind::Baseline, tag)?;
        if path.is_file() {
            Ok(BaselineState::HasBaseline)
        } else {
            Ok(BaselineState::NoBaseline)
        }
    }

    /// 把（已遮挡的）截图保存为基准图。
    pub fn record(&self, tag: &str, png: &[u8]) -> Result<PathBuf, ScreenshotError> {
        let path = self.artifact_path(ArtifactKind::Baseline, tag)?;
        fs::write(&path, png)?;

        log::info!("💾 已保存基准图: {}", path.display());
        Ok(path)
    }

    /// 读取并解码基准图
    pub fn load_baseline(
        &self,
        tag: &str,
        max_pixels: u64,
    ) -> Result<RasterImage, ScreenshotError> {
        let path = self.artifact_path(ArtifactKind::Baseline, tag)?;
        let bytes = fs::read(&path)?;
        RasterImage::decode_with_limit(&bytes, max_pixels)
    }

    /// 与基准图比对。
    ///
    /// 存在差异时写入 `actual/<tag>.png`（`actual_png` 原样落盘）与 `diff/<tag>.png`；
    /// 没有差异时不写任何文件。
    pub fn compare(
        &self,
        tag: &str,
        actual_png: &[u8],
        actual: &RasterImage,
        options: &DiffOptions,
        max_pixels: u64,
    ) -> Result<StoreComparison, ScreenshotError> {
        let baseline = self.load_baseline(tag, max_pixels)?;
        let outcome = diff::diff(actual, &baseline, options)?;

        if outcome.count == 0 {
            return Ok(StoreComparison {
                diff_pixels: 0,
                actual_path: None,
                diff_path: None,
            });
        }

        let actual_path = self.artifact_path(ArtifactKind::Actual, tag)?;
        let diff_path = self.artifact_path(ArtifactKind::Diff, tag)?;
        fs::write(&actual_path, actual_png)?;
        fs::write(&diff_path, outcome.diff_image.encode()?)?;

        log::warn!(
            "❌ 截图 '{}' 存在 {} 个差异像素，已写入 {} 与 {}",
            tag,
            outcome.count,
            actual_path.display(),
            diff_path.display()
        );

        Ok(StoreComparison {
            diff_pixels: outcome.count,
            actual_path: Some(actual_path),
            diff_path: Some(diff_path),
        })
    }

    /// 删除标签遗留的 actual/diff 文件，返回是否删除了任何文件。
    pub fn prune_failure_artifacts(&self, tag: &str) -> Result<bool, ScreenshotError> {
        let mut removed = false;
        for kind in [ArtifactKind::Actual, ArtifactKind::Diff] {
            let path = self.artifact_path(kind, tag)?;
            match fs::remove_file(&path) {
                Ok(()) => {
                    log::debug!("🧹 已删除过期产物: {}", path.display());
                    removed = true;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }
}

/// 去掉根目录末尾多余的路径分隔符。
fn normalize_root(root: &Path) -> PathBuf {
    let raw = root.to_string_lossy();
    let trimmed = raw.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        // 根目录本身（"/"）不能被裁成空串
        return root.to_path_buf();
    }
    PathBuf::from(trimmed)
}

/// 标签会成为文件名，禁止空串、`.`/`..` 与路径分隔符。
fn validate_tag(tag: &str) -> Result<(), ScreenshotError> {
    if tag.trim().is_empty() {
        return Err(ScreenshotError::InvalidTag("标签不能为空".to_string()));
    }
    if tag == "." || tag == ".." {
        return Err(ScreenshotError::InvalidTag(format!("标签不能是 '{}'", tag)));
    }
    if tag.contains(['/', '\\', '\0']) {
        return Err(ScreenshotError::InvalidTag(format!(
            "标签 '{}' 不能包含路径分隔符",
            tag
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_of(color: [u8; 4]) -> (RasterImage, Vec<u8>) {
        let image = RasterImage::filled(6, 4, color).expect("filled image");
        let png = image.encode().expect("encode should succeed");
        (image, png)
    }

    #[test]
    fn initialize_creates_all_subdirectories() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let root = dir.path().join("screenshots");

        let store = ArtifactStore::initialize(&root).expect("initialize should succeed");

        for kind in ArtifactKind::ALL {
            assert!(store.root().join(kind.dir_name()).is_dir());
        }
    }

    #[test]
    fn initialize_strips_trailing_separators() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let raw = format!("{}/shots//", dir.path().display());

        let store = ArtifactStore::initialize(&raw).expect("initialize should succeed");

        assert_eq!(store.root(), dir.path().join("shots").as_path());
    }

    #[test]
    fn invalid_tags_are_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let store = ArtifactStore::initialize(dir.path()).expect("initialize should succeed");

        for tag in ["", "  ", "..", "a/b", "a\\b"] {
            let result = store.artifact_path(ArtifactKind::Baseline, tag);
            assert!(
                matches!(result, Err(ScreenshotError::InvalidTag(_))),
                "tag {tag:?} should be rejected"
            );
        }
    }

    #[test]
    fn record_moves_tag_to_has_baseline() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let store = ArtifactStore::initialize(dir.path()).expect("initialize should succeed");
        let (_, png) = png_of([1, 2, 3, 255]);

        assert_eq!(store.baseline_state("home").expect("state"), BaselineState::NoBaseline);
        store.record("home", &png).expect("record should succeed");
        assert_eq!(store.baseline_state("home").expect("state"), BaselineState::HasBaseline);

        let stored = fs::read(dir.path().join("baseline/home.png")).expect("baseline exists");
        assert_eq!(stored, png);
    }

    #[test]
    fn compare_without_difference_writes_nothing() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let store = ArtifactStore::initialize(dir.path()).expect("initialize should succeed");
        let (image, png) = png_of([10, 20, 30, 255]);
        store.record("same", &png).expect("record should succeed");

        let result = store
            .compare("same", &png, &image, &DiffOptions::default(), u64::MAX)
            .expect("compare should succeed");

        assert_eq!(result.diff_pixels, 0);
        assert!(!dir.path().join("actual/same.png").exists());
        assert!(!dir.path().join("diff/same.png").exists());
    }

    #[test]
    fn compare_with_difference_writes_actual_and_diff() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let store = ArtifactStore::initialize(dir.path()).expect("initialize should succeed");
        let (_, baseline_png) = png_of([255, 255, 255, 255]);
        let (actual, actual_png) = png_of([0, 0, 0, 255]);
        store.record("changed", &baseline_png).expect("record should succeed");

        let result = store
            .compare("changed", &actual_png, &actual, &DiffOptions::default(), u64::MAX)
            .expect("compare should succeed");

        assert_eq!(result.diff_pixels, 24);
        let actual_path = result.actual_path.expect("actual written");
        let diff_path = result.diff_path.expect("diff written");
        assert_eq!(fs::read(&actual_path).expect("read actual"), actual_png);
        let diff_bytes = fs::read(&diff_path).expect("read diff");
        let diff_image = RasterImage::decode(&diff_bytes).expect("diff is png");
        assert_eq!(diff_image.dimensions(), (6, 4));
    }

    #[test]
    fn compare_reports_missing_baseline_as_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let store = ArtifactStore::initialize(dir.path()).expect("initialize should succeed");
        let (image, png) = png_of([0, 0, 0, 255]);

        let result = store.compare("missing", &png, &image, &DiffOptions::default(), u64::MAX);

        assert!(matches!(result, Err(ScreenshotError::Io(_))));
    }

    #[test]
    fn prune_removes_only_failure_artifacts() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let store = ArtifactStore::initialize(dir.path()).expect("initialize should succeed");
        let (_, png) = png_of([0, 0, 0, 255]);
        store.record("stale", &png).expect("record should succeed");
        fs::write(dir.path().join("actual/stale.png"), &png).expect("seed actual");
        fs::write(dir.path().join("diff/stale.png"), &png).expect("seed diff");

        assert!(store.prune_failure_artifacts("stale").expect("prune should succeed"));
        assert!(!store.prune_failure_artifacts("stale").expect("second prune should succeed"));

        assert!(dir.path().join("baseline/stale.png").exists());
        assert!(!dir.path().join("actual/stale.png").exists());
        assert!(!dir.path().join("diff/stale.png").exists());
    }
}
