//! # 像素差异算法模块
//!
//! ## 设计思路
//!
//! 逐像素比较两张同尺寸图片，使用 YIQ 感知色差而不是 RGB 欧氏距离，
//! 人眼难以察觉的色偏在阈值附近不会被计为差异。
//! 默认排除位于抗锯齿边缘的候选像素，避免亚像素渲染抖动导致测试失败。
//!
//! ## 实现思路
//!
//! 1. 尺寸不一致直接返回 `DimensionMismatch`，不缩放、不裁剪
//! 2. 阈值映射为 YIQ 色差上限：`35215 * threshold²`（35215 为 YIQ 空间最大色差）
//! 3. 超过上限的像素再做 3x3 邻域抗锯齿检测（两张图任一命中即视为抗锯齿）
//! 4. 差异图中真实差异用醒目颜色，其余像素画成淡化灰度背景

use crate::error::ScreenshotError;
use crate::raster::RasterImage;

/// YIQ 空间中两种颜色之间可能的最大色差。
const MAX_YIQ_DELTA: f64 = 35215.0;

const Y_R: f64 = 0.29889531;
const Y_G: f64 = 0.58662247;
const Y_B: f64 = 0.11448223;

const I_R: f64 = 0.59597799;
const I_G: f64 = 0.27417610;
const I_B: f64 = 0.32180189;

const Q_R: f64 = 0.21147017;
const Q_G: f64 = 0.52261711;
const Q_B: f64 = 0.31114694;

const YIQ_Y_WEIGHT: f64 = 0.5053;
const YIQ_I_WEIGHT: f64 = 0.299;
const YIQ_Q_WEIGHT: f64 = 0.1957;

/// 单次比对参数。
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOptions {
    /// 颜色差异阈值（0~1），越大越宽松。
    pub threshold: f64,
    /// 为 `true` 时抗锯齿像素也计入差异。
    pub include_aa: bool,
    /// 背景灰度的淡化系数。
    pub alpha: f64,
    pub diff_color: [u8; 3],
    /// 变暗像素使用的替代颜色。
    pub diff_color_alt: Option<[u8; 3]>,
    /// 抗锯齿像素的高亮颜色，`None` 时画成背景。
    pub aa_color: Option<[u8; 3]>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            include_aa: false,
            alpha: 0.1,
            diff_color: [255, 0, 0],
            diff_color_alt: None,
            aa_color: None,
        }
    }
}

/// 比对结果。
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    /// 真实差异像素数量，0 表示没有可感知的变化。
    pub count: u64,
    /// 差异可视化图，尺寸与输入一致。
    pub diff_image: RasterImage,
}

/// 比较两张图片。
///
/// 差异图的背景取自 `a` 的灰度。
pub fn diff(
    a: &RasterImage,
    b: &RasterImage,
    options: &DiffOptions,
) -> Result<DiffOutcome, ScreenshotError> {
    if a.dimensions() != b.dimensions() {
        return Err(ScreenshotError::DimensionMismatch {
            baseline_width: b.width(),
            baseline_height: b.height(),
            actual_width: a.width(),
            actual_height: a.height(),
        });
    }

    if !(0.0..=1.0).contains(&options.threshold) {
        return Err(ScreenshotError::InvalidOptions(format!(
            "threshold 必须在 0~1 之间，当前为 {}",
            options.threshold
        )));
    }

    let width = a.width();
    let height = a.height();
    let img1 = a.pixels();
    let img2 = b.pixels();
    let mut output = vec![0u8; img1.len()];

    if img1 == img2 {
        for pos in (0..img1.len()).step_by(4) {
            draw_gray_pixel(img1, pos, options.alpha, &mut output);
        }
        return Ok(DiffOutcome {
            count: 0,
            diff_image: RasterImage::new(width, height, output)?,
        });
    }

    let max_delta = MAX_YIQ_DELTA * options.threshold * options.threshold;
    let mut count = 0u64;

    for y in 0..height {
        for x in 0..width {
            let pos = (y as usize * width as usize + x as usize) * 4;
            let delta = color_delta(img1, img2, pos, pos, false);

            if delta.abs() > max_delta {
                let is_aa = !options.include_aa
                    && (is_antialiased(img1, x, y, width, height, img2)
                        || is_antialiased(img2, x, y, width, height, img1));

                if is_aa {
                    match options.aa_color {
                        Some(color) => draw_pixel(&mut output, pos, color),
                        None => draw_gray_pixel(img1, pos, options.alpha, &mut output),
                    }
                } else {
                    let color = match options.diff_color_alt {
                        Some(alt) if delta < 0.0 => alt,
                        _ => options.diff_color,
                    };
                    draw_pixel(&mut output, pos, color);
                    count += 1;
                }
            } else {
                draw_gray_pixel(img1, pos, options.alpha, &mut output);
            }
        }
    }

    Ok(DiffOutcome {
        count,
        diff_image: RasterImage::new(width, height, output)?,
    })
}

/// 检测 `img` 中 `(x1, y1)` 是否位于抗锯齿边缘。
///
/// 3x3 邻域内同色像素过多时不是边缘；否则取亮度变化最大/最小的两个邻居，
/// 只要其中之一在两张图中都处于大片同色区域，就判定为抗锯齿。
fn is_antialiased(img: &[u8], x1: u32, y1: u32, width: u32, height: u32, other: &[u8]) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 as usize * width as usize + x1 as usize) * 4;

    let mut zeroes = if x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2 { 1 } else { 0 };
    let mut min = 0.0f64;
    let mut max = 0.0f64;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0u32, 0u32, 0u32, 0u32);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }

            let neighbor = (y as usize * width as usize + x as usize) * 4;
            let delta = color_delta(img, img, pos, neighbor, true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = x;
                min_y = y;
            } else if delta > max {
                max = delta;
                max_x = x;
                max_y = y;
            }
        }
    }

    // 邻域只有单向亮度变化，不是抗锯齿边缘
    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_x, min_y, width, height)
        && has_many_siblings(other, min_x, min_y, width, height))
        || (has_many_siblings(img, max_x, max_y, width, height)
            && has_many_siblings(other, max_x, max_y, width, height))
}

/// 判断像素是否有至少 3 个完全同色的邻居（图片边缘算作一个）。
fn has_many_siblings(img: &[u8], x1: u32, y1: u32, width: u32, height: u32) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 as usize * width as usize + x1 as usize) * 4;

    let mut zeroes = if x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2 { 1 } else { 0 };

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }

            let pos2 = (y as usize * width as usize + x as usize) * 4;
            if img[pos..pos + 4] == img[pos2..pos2 + 4] {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }

    false
}

/// 两个像素之间的 YIQ 感知色差（半透明像素先与白色背景混合）。
///
/// 返回值带符号：第一个像素更亮时为负。`y_only` 时只返回亮度差。
fn color_delta(img1: &[u8], img2: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    if img1[k..k + 4] == img2[m..m + 4] {
        return 0.0;
    }

    let (r1, g1, b1) = blend_over_white(&img1[k..k + 4]);
    let (r2, g2, b2) = blend_over_white(&img2[m..m + 4]);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;

    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = YIQ_Y_WEIGHT * y * y + YIQ_I_WEIGHT * i * i + YIQ_Q_WEIGHT * q * q;

    if y1 > y2 { -delta } else { delta }
}

fn blend_over_white(rgba: &[u8]) -> (f64, f64, f64) {
    let (r, g, b, a) = (rgba[0] as f64, rgba[1] as f64, rgba[2] as f64, rgba[3]);
    if a == 255 {
        return (r, g, b);
    }
    let alpha = a as f64 / 255.0;
    (blend(r, alpha), blend(g, alpha), blend(b, alpha))
}

fn blend(c: f64, alpha: f64) -> f64 {
    255.0 + (c - 255.0) * alpha
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * Y_R + g * Y_G + b * Y_B
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * I_R - g * I_G - b * I_B
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * Q_R - g * Q_G + b * Q_B
}

fn draw_pixel(output: &mut [u8], pos: usize, color: [u8; 3]) {
    output[pos] = color[0];
    output[pos + 1] = color[1];
    output[pos + 2] = color[2];
    output[pos + 3] = 255;
}

fn draw_gray_pixel(img: &[u8], pos: usize, alpha: f64, output: &mut [u8]) {
    let y = rgb2y(img[pos] as f64, img[pos + 1] as f64, img[pos + 2] as f64);
    let value = blend(y, alpha * img[pos + 3] as f64 / 255.0).clamp(0.0, 255.0) as u8;
    output[pos] = value;
    output[pos + 1] = value;
    output[pos + 2] = value;
    output[pos + 3] = 255;
}
