use std::fmt::{Result as FmtResult, Write};

use typ_core::bitmap::{Bitmap, Color};
use typ_core::language::PRIMARY_LANGUAGE;
use typ_core::style::{Document, DrawOrder, Header, Labels, LineType, PointType, PolygonType};

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// 标签输出时排在最前的语言代码。
    pub primary_language: String,
    /// 非空时是否输出 `[_drawOrder]` 段。
    pub include_draw_order: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            primary_language: PRIMARY_LANGUAGE.to_string(),
            include_draw_order: true,
        }
    }
}

/// 将文档序列化为规范化的 TYP 文本。不做任何一致性校验，按给定内容原样输出。
pub fn write_str(document: &Document, options: &WriteOptions) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    write_header(&mut out, &document.header)?;
    for point in &document.points {
        write_point(&mut out, point, options)?;
    }
    for line in &document.lines {
        write_line(&mut out, line, options)?;
    }
    for polygon in &document.polygons {
        write_polygon(&mut out, polygon, options)?;
    }
    if options.include_draw_order && !document.draw_order.is_empty() {
        write_draw_order(&mut out, &document.draw_order)?;
    }
    Ok(out)
}

fn write_header(out: &mut String, header: &Header) -> FmtResult {
    writeln!(out, "[_id]")?;
    let fields = [
        ("CodePage", header.code_page),
        ("FID", header.fid),
        ("ProductCode", header.product_code),
        ("MapID", header.map_id),
    ];
    for (key, value) in fields {
        // 未设置与 0 都不输出
        if let Some(value) = value.filter(|value| *value != 0) {
            writeln!(out, "{key}={value}")?;
        }
    }
    end_section(out)
}

fn write_point(out: &mut String, point: &PointType, options: &WriteOptions) -> FmtResult {
    writeln!(out, "[_point]")?;
    writeln!(out, "Type={}", point.type_code)?;
    if let Some(sub_type) = &point.sub_type {
        writeln!(out, "SubType={sub_type}")?;
    }
    write_labels(out, &point.labels, &options.primary_language)?;
    if let Some(bitmap) = &point.day_bitmap {
        write_bitmap(out, "DayXpm", bitmap)?;
    }
    if let Some(bitmap) = &point.night_bitmap {
        write_bitmap(out, "NightXpm", bitmap)?;
    }
    for color in &point.day_colors {
        write_custom_color(out, "DayCustomColor", color)?;
    }
    for color in &point.night_colors {
        write_custom_color(out, "NightCustomColor", color)?;
    }
    if let Some(font_style) = &point.font_style {
        writeln!(out, "FontStyle={font_style}")?;
    }
    end_section(out)
}

fn write_line(out: &mut String, line: &LineType, options: &WriteOptions) -> FmtResult {
    writeln!(out, "[_line]")?;
    writeln!(out, "Type={}", line.type_code)?;
    write_labels(out, &line.labels, &options.primary_language)?;
    if line.width > 0 {
        writeln!(out, "LineWidth={}", line.width)?;
    }
    if line.border_width > 0 {
        writeln!(out, "BorderWidth={}", line.border_width)?;
    }
    if let Some(style) = &line.style {
        writeln!(out, "LineStyle={style}")?;
    }
    if line.use_orientation {
        writeln!(out, "UseOrientation=Y")?;
    }
    if let Some(bitmap) = &line.day_bitmap {
        write_bitmap(out, "Xpm", bitmap)?;
    }
    if let Some(bitmap) = &line.night_bitmap {
        write_bitmap(out, "NightXpm", bitmap)?;
    }
    end_section(out)
}

fn write_polygon(out: &mut String, polygon: &PolygonType, options: &WriteOptions) -> FmtResult {
    writeln!(out, "[_polygon]")?;
    writeln!(out, "Type={}", polygon.type_code)?;
    write_labels(out, &polygon.labels, &options.primary_language)?;
    if polygon.extended_labels {
        writeln!(out, "ExtendedLabels=Y")?;
    }
    if let Some(font_style) = &polygon.font_style {
        writeln!(out, "FontStyle={font_style}")?;
    }
    if let Some(bitmap) = &polygon.day_bitmap {
        write_bitmap(out, "Xpm", bitmap)?;
    }
    if let Some(bitmap) = &polygon.night_bitmap {
        write_bitmap(out, "NightXpm", bitmap)?;
    }
    end_section(out)
}

fn write_draw_order(out: &mut String, draw_order: &DrawOrder) -> FmtResult {
    writeln!(out, "[_drawOrder]")?;
    for entry in &draw_order.entries {
        match entry.priority {
            Some(priority) => writeln!(out, "Type={},{priority}", entry.type_code)?,
            None => writeln!(out, "Type={}", entry.type_code)?,
        }
    }
    end_section(out)
}

/// 主语言标签优先，其余按语言代码升序。
fn write_labels(out: &mut String, labels: &Labels, primary: &str) -> FmtResult {
    if let Some(text) = labels.get(primary) {
        writeln!(out, "String={primary},{text}")?;
    }
    for (code, text) in labels.iter().filter(|(code, _)| code.as_str() != primary) {
        writeln!(out, "String={code},{text}")?;
    }
    Ok(())
}

/// 头部由位图自身字段重新生成，随后依次输出调色板与像素行。
fn write_bitmap(out: &mut String, key: &str, bitmap: &Bitmap) -> FmtResult {
    writeln!(
        out,
        "{key}=\"{} {} {} {}\"",
        bitmap.width, bitmap.height, bitmap.colors, bitmap.chars_per_pixel
    )?;
    for (token, color) in &bitmap.palette {
        writeln!(out, "\"{token} c {}\"", color.as_token())?;
    }
    for row in &bitmap.rows {
        writeln!(out, "\"{row}\"")?;
    }
    Ok(())
}

fn write_custom_color(out: &mut String, key: &str, color: &Color) -> FmtResult {
    writeln!(out, "{key}=\"{}\"", color.as_token())
}

fn end_section(out: &mut String) -> FmtResult {
    writeln!(out, "[end]")?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use typ_core::style::{DrawOrderEntry, StyleRecord};

    use super::*;

    fn render(document: &Document) -> String {
        write_str(document, &WriteOptions::default()).expect("render document")
    }

    #[test]
    fn header_omits_unset_and_zero_fields() {
        let mut doc = Document::new();
        doc.header.code_page = Some(1252);
        doc.header.fid = Some(1234);
        doc.header.product_code = Some(0);
        let text = render(&doc);
        assert_eq!(text, "[_id]\nCodePage=1252\nFID=1234\n[end]\n\n");
    }

    #[test]
    fn primary_language_is_written_first() {
        let mut point = PointType::new("0x2f06");
        point.set_label("0x01", "Banque");
        point.set_label("0x04", "Bank");
        point.set_label("0x02", "Bank (de)");
        let mut doc = Document::new();
        doc.points.push(point);

        let text = render(&doc);
        let labels: Vec<&str> = text
            .lines()
            .filter(|line| line.starts_with("String="))
            .collect();
        assert_eq!(
            labels,
            vec!["String=0x04,Bank", "String=0x01,Banque", "String=0x02,Bank (de)"]
        );
    }

    #[test]
    fn bitmap_header_is_regenerated_from_fields() {
        let mut bitmap = Bitmap::new(2, 2, 2, 1);
        bitmap.palette.insert("a".to_string(), Color::hex("#FF0000"));
        bitmap.palette.insert("b".to_string(), Color::transparent());
        bitmap.rows = vec!["ab".to_string(), "ba".to_string()];
        let mut polygon = PolygonType::new("0x13");
        polygon.extended_labels = true;
        polygon.day_bitmap = Some(bitmap);
        let mut doc = Document::new();
        doc.polygons.push(polygon);

        let text = render(&doc);
        assert!(text.ends_with(
            "[_polygon]\nType=0x13\nExtendedLabels=Y\nXpm=\"2 2 2 1\"\n\"a c #FF0000\"\n\"b c none\"\n\"ab\"\n\"ba\"\n[end]\n\n"
        ));
    }

    #[test]
    fn line_defaults_are_not_written() {
        let mut doc = Document::new();
        doc.lines.push(LineType::new("0x01"));
        let text = render(&doc);
        assert!(text.contains("[_line]\nType=0x01\n[end]\n"));
        assert!(!text.contains("LineWidth"));
        assert!(!text.contains("UseOrientation"));
    }

    #[test]
    fn draw_order_follows_records_and_can_be_disabled() {
        let mut doc = Document::new();
        doc.points.push(PointType::new("0x2f06"));
        doc.draw_order.entries.push(DrawOrderEntry {
            type_code: "0x4b".to_string(),
            priority: Some(1),
        });
        doc.draw_order.entries.push(DrawOrderEntry {
            type_code: "0x13".to_string(),
            priority: None,
        });

        let text = render(&doc);
        assert!(text.ends_with("[_drawOrder]\nType=0x4b,1\nType=0x13\n[end]\n\n"));

        let options = WriteOptions {
            include_draw_order: false,
            ..WriteOptions::default()
        };
        let text = write_str(&doc, &options).expect("render");
        assert!(!text.contains("_drawOrder"));
    }
}
