use std::fmt::{Result as FmtResult, Write};

use typ_core::bitmap::{Bitmap, Color};
use typ_core::language::language_name;
use typ_core::style::{Document, StyleRecord};
use typ_io::Diagnostic;

/// 生成文档概览文本，供 `show` 子命令输出。
pub fn render_overview(document: &Document) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    match &document.source_path {
        Some(path) => writeln!(out, "文档：{}", path.display())?,
        None => writeln!(out, "文档：<未保存>")?,
    }

    let header = &document.header;
    writeln!(
        out,
        "头部：CodePage={} FID={} ProductCode={} MapID={}",
        field(header.code_page),
        field(header.fid),
        field(header.product_code),
        field(header.map_id)
    )?;
    writeln!(
        out,
        "记录：点 {} / 线 {} / 面 {}",
        document.points.len(),
        document.lines.len(),
        document.polygons.len()
    )?;

    if !document.points.is_empty() {
        writeln!(out, "点样式：")?;
        for point in &document.points {
            write_record_line(&mut out, point)?;
            if let Some(sub_type) = &point.sub_type {
                writeln!(out, "      子类型={sub_type}")?;
            }
            write_bitmap_line(&mut out, "日间位图", point.day_bitmap.as_ref())?;
            write_bitmap_line(&mut out, "夜间位图", point.night_bitmap.as_ref())?;
            for color in point.day_colors.iter().chain(&point.night_colors) {
                writeln!(out, "      自定义颜色 {}", describe_color(color))?;
            }
        }
    }

    if !document.lines.is_empty() {
        writeln!(out, "线样式：")?;
        for line in &document.lines {
            write_record_line(&mut out, line)?;
            writeln!(
                out,
                "      线宽={} 边框={} 方向={}",
                line.width,
                line.border_width,
                if line.use_orientation { "是" } else { "否" }
            )?;
            write_bitmap_line(&mut out, "位图", line.day_bitmap.as_ref())?;
            write_bitmap_line(&mut out, "夜间位图", line.night_bitmap.as_ref())?;
        }
    }

    if !document.polygons.is_empty() {
        writeln!(out, "面样式：")?;
        for polygon in &document.polygons {
            write_record_line(&mut out, polygon)?;
            write_bitmap_line(&mut out, "位图", polygon.day_bitmap.as_ref())?;
            write_bitmap_line(&mut out, "夜间位图", polygon.night_bitmap.as_ref())?;
        }
    }

    if !document.draw_order.is_empty() {
        let codes: Vec<&str> = document.draw_order.type_codes().collect();
        writeln!(out, "绘制顺序：{}", codes.join(", "))?;
    }
    Ok(out)
}

/// 汇总解析诊断与位图一致性问题，返回问题条数。
pub fn render_check(
    document: &Document,
    diagnostics: &[Diagnostic],
    out: &mut String,
) -> Result<usize, std::fmt::Error> {
    let mut issues = 0;
    for diagnostic in diagnostics {
        let level = if diagnostic.kind.is_warning() { "警告" } else { "提示" };
        writeln!(out, "{level}: {diagnostic}")?;
        if diagnostic.kind.is_warning() {
            issues += 1;
        }
    }

    let mut bitmaps: Vec<(&str, &str, &Bitmap)> = Vec::new();
    for point in &document.points {
        let pair = point.day_bitmap.iter().chain(&point.night_bitmap);
        bitmaps.extend(pair.map(|bitmap| ("点", point.type_code.as_str(), bitmap)));
    }
    for line in &document.lines {
        let pair = line.day_bitmap.iter().chain(&line.night_bitmap);
        bitmaps.extend(pair.map(|bitmap| ("线", line.type_code.as_str(), bitmap)));
    }
    for polygon in &document.polygons {
        let pair = polygon.day_bitmap.iter().chain(&polygon.night_bitmap);
        bitmaps.extend(pair.map(|bitmap| ("面", polygon.type_code.as_str(), bitmap)));
    }

    for (kind, type_code, bitmap) in bitmaps {
        for issue in bitmap.validate() {
            writeln!(out, "位图问题: {kind} {type_code}: {issue}")?;
            issues += 1;
        }
    }
    Ok(issues)
}

fn write_record_line<R: StyleRecord>(out: &mut String, record: &R) -> FmtResult {
    writeln!(
        out,
        "  - {} {}",
        record.type_code(),
        record.display_label().unwrap_or("<无标签>")
    )?;
    for (code, text) in record.labels() {
        let language = language_name(code).unwrap_or("Unknown");
        writeln!(out, "      [{code} {language}] {text}")?;
    }
    Ok(())
}

fn write_bitmap_line(out: &mut String, title: &str, bitmap: Option<&Bitmap>) -> FmtResult {
    let Some(bitmap) = bitmap else {
        return Ok(());
    };
    let colors: Vec<String> = bitmap.palette.values().map(describe_color).collect();
    writeln!(
        out,
        "      {title} {}x{}，{} 色：{}",
        bitmap.width,
        bitmap.height,
        bitmap.palette.len(),
        colors.join(" ")
    )
}

fn describe_color(color: &Color) -> String {
    match color.rgb() {
        Some((r, g, b)) => format!("rgb({r},{g},{b})"),
        None if color.is_transparent() => "透明".to_string(),
        None => format!("无效({})", color.as_token()),
    }
}

fn field(value: Option<i32>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}
