pub mod bitmap {
    use std::collections::BTreeMap;
    use std::fmt::{Display, Formatter};

    use serde::{Deserialize, Serialize};

    /// 颜色适用的显示模式（白天 / 夜间）。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum Phase {
        Day,
        Night,
    }

    /// 颜色取值：`#RRGGBB` 形式的十六进制串，或透明哨兵值。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ColorValue {
        Transparent,
        Hex(String),
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Color {
        pub value: ColorValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub phase: Option<Phase>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
    }

    impl Color {
        #[inline]
        pub fn hex(raw: impl Into<String>) -> Self {
            Self {
                value: ColorValue::Hex(raw.into()),
                phase: None,
                name: None,
            }
        }

        #[inline]
        pub fn transparent() -> Self {
            Self {
                value: ColorValue::Transparent,
                phase: None,
                name: None,
            }
        }

        /// 解析调色板中的颜色记号：`none` / `transparent`（不区分大小写）视为透明，
        /// 其余内容原样保存。
        pub fn parse(token: &str) -> Self {
            let token = token.trim();
            if token.eq_ignore_ascii_case("none") || token.eq_ignore_ascii_case("transparent") {
                Self::transparent()
            } else {
                Self::hex(token)
            }
        }

        #[inline]
        pub fn with_phase(mut self, phase: Phase) -> Self {
            self.phase = Some(phase);
            self
        }

        #[inline]
        pub fn with_name(mut self, name: impl Into<String>) -> Self {
            self.name = Some(name.into());
            self
        }

        #[inline]
        pub fn is_transparent(&self) -> bool {
            matches!(self.value, ColorValue::Transparent)
        }

        /// 写回文本时使用的记号。
        pub fn as_token(&self) -> &str {
            match &self.value {
                ColorValue::Transparent => "none",
                ColorValue::Hex(raw) => raw,
            }
        }

        /// 解码 `#RRGGBB` 或 `RRGGBB`；透明或格式不符时返回 `None`。
        pub fn rgb(&self) -> Option<(u8, u8, u8)> {
            let ColorValue::Hex(raw) = &self.value else {
                return None;
            };
            let hex = raw.strip_prefix('#').unwrap_or(raw);
            if hex.len() != 6 || !hex.is_ascii() {
                return None;
            }
            let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
            Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
        }
    }

    /// XPM 风格的位图：头部四元组、调色板以及像素行。
    ///
    /// 声明值与实际内容之间的一致性在解析阶段不做强制检查，可通过
    /// [`Bitmap::validate`] 按需获取问题列表。
    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Bitmap {
        pub width: u32,
        pub height: u32,
        pub colors: u32,
        pub chars_per_pixel: u32,
        pub palette: BTreeMap<String, Color>,
        pub rows: Vec<String>,
    }

    impl Bitmap {
        pub fn new(width: u32, height: u32, colors: u32, chars_per_pixel: u32) -> Self {
            Self {
                width,
                height,
                colors,
                chars_per_pixel,
                palette: BTreeMap::new(),
                rows: Vec::new(),
            }
        }

        /// 声明的调色板条目与像素行是否都已读满。
        pub fn is_complete(&self) -> bool {
            self.palette.len() == self.colors as usize && self.rows.len() == self.height as usize
        }

        /// 取 `(x, y)` 处的像素记号（长度为 `chars_per_pixel` 个字符）。
        pub fn pixel_token(&self, x: u32, y: u32) -> Option<&str> {
            if x >= self.width || self.chars_per_pixel == 0 {
                return None;
            }
            let row = self.rows.get(y as usize)?;
            let cpp = self.chars_per_pixel as usize;
            let start = x as usize * cpp;
            char_slice(row, start, start + cpp)
        }

        pub fn color_at(&self, x: u32, y: u32) -> Option<&Color> {
            let token = self.pixel_token(x, y)?;
            self.palette.get(token)
        }

        /// 检查声明尺寸、调色板与像素数据是否一致。
        pub fn validate(&self) -> Vec<BitmapIssue> {
            let mut issues = Vec::new();
            if self.palette.len() != self.colors as usize {
                issues.push(BitmapIssue::PaletteSize {
                    declared: self.colors,
                    actual: self.palette.len(),
                });
            }
            if self.rows.len() != self.height as usize {
                issues.push(BitmapIssue::RowCount {
                    declared: self.height,
                    actual: self.rows.len(),
                });
            }

            let cpp = self.chars_per_pixel as usize;
            let expected = self.width as usize * cpp;
            for (row_index, row) in self.rows.iter().enumerate() {
                let actual = row.chars().count();
                if actual != expected {
                    issues.push(BitmapIssue::RowWidth {
                        row: row_index,
                        expected,
                        actual,
                    });
                    continue;
                }
                if cpp == 0 {
                    continue;
                }
                for column in 0..self.width as usize {
                    let Some(token) = char_slice(row, column * cpp, (column + 1) * cpp) else {
                        break;
                    };
                    if !self.palette.contains_key(token) {
                        issues.push(BitmapIssue::UnknownToken {
                            row: row_index,
                            column,
                            token: token.to_string(),
                        });
                    }
                }
            }
            issues
        }
    }

    fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
        let mut indices = text.char_indices().map(|(index, _)| index).chain([text.len()]);
        let begin = indices.nth(start)?;
        let finish = indices.nth(end - start - 1)?;
        Some(&text[begin..finish])
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BitmapIssue {
        PaletteSize {
            declared: u32,
            actual: usize,
        },
        RowCount {
            declared: u32,
            actual: usize,
        },
        RowWidth {
            row: usize,
            expected: usize,
            actual: usize,
        },
        UnknownToken {
            row: usize,
            column: usize,
            token: String,
        },
    }

    impl Display for BitmapIssue {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            match self {
                BitmapIssue::PaletteSize { declared, actual } => {
                    write!(f, "palette declares {declared} colors but holds {actual}")
                }
                BitmapIssue::RowCount { declared, actual } => {
                    write!(f, "bitmap declares {declared} rows but holds {actual}")
                }
                BitmapIssue::RowWidth {
                    row,
                    expected,
                    actual,
                } => write!(
                    f,
                    "row {row} has {actual} characters, expected {expected}"
                ),
                BitmapIssue::UnknownToken { row, column, token } => write!(
                    f,
                    "pixel ({column}, {row}) uses token {token:?} missing from the palette"
                ),
            }
        }
    }
}

pub mod language {
    /// 写出标签时优先输出的语言代码（英语）。
    pub const PRIMARY_LANGUAGE: &str = "0x04";

    /// 常见语言代码到名称的映射，未知代码返回 `None`。
    pub fn language_name(code: &str) -> Option<&'static str> {
        let name = match code.trim().to_ascii_lowercase().as_str() {
            "0x00" => "Unspecified",
            "0x01" => "French",
            "0x02" => "German",
            "0x03" => "Dutch",
            "0x04" => "English",
            "0x05" => "Italian",
            "0x06" => "Finnish",
            "0x07" => "Swedish",
            "0x08" => "Spanish",
            "0x09" => "Basque",
            "0x0a" => "Catalan",
            "0x0b" => "Galician",
            "0x0c" => "Welsh",
            "0x0d" => "Gaelic",
            "0x0e" => "Danish",
            "0x0f" => "Norwegian",
            "0x10" => "Portuguese",
            "0x11" => "Slovak",
            "0x12" => "Czech",
            "0x13" => "Croatian",
            "0x14" => "Hungarian",
            "0x15" => "Polish",
            "0x16" => "Turkish",
            "0x17" => "Greek",
            "0x18" => "Slovenian",
            "0x19" => "Russian",
            "0x1a" => "Estonian",
            "0x1b" => "Latvian",
            "0x1c" => "Romanian",
            "0x1d" => "Albanian",
            "0x1e" => "Bosnian",
            "0x1f" => "Lithuanian",
            "0x20" => "Serbian",
            "0x21" => "Macedonian",
            "0x22" => "Bulgarian",
            _ => return None,
        };
        Some(name)
    }
}

pub mod style {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use serde::{Deserialize, Serialize};

    use crate::bitmap::{Bitmap, Color};
    use crate::language::PRIMARY_LANGUAGE;

    /// 语言代码 -> 标签文本；每种语言至多一条。
    pub type Labels = BTreeMap<String, String>;

    /// `[_id]` 段中的元数据，未出现的字段为 `None`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Header {
        pub code_page: Option<i32>,
        pub fid: Option<i32>,
        pub product_code: Option<i32>,
        pub map_id: Option<i32>,
    }

    /// 点 / 线 / 面样式记录的公共部分。
    pub trait StyleRecord {
        fn type_code(&self) -> &str;
        fn labels(&self) -> &Labels;
        fn labels_mut(&mut self) -> &mut Labels;

        /// 写入标签，同一语言代码的旧值被覆盖并返回。
        fn set_label(&mut self, code: impl Into<String>, text: impl Into<String>) -> Option<String>
        where
            Self: Sized,
        {
            self.labels_mut().insert(code.into(), text.into())
        }

        fn label(&self, code: &str) -> Option<&str> {
            self.labels().get(code).map(String::as_str)
        }

        /// 优先返回英语标签，否则返回任意一条。
        fn display_label(&self) -> Option<&str> {
            self.label(PRIMARY_LANGUAGE)
                .or_else(|| self.labels().values().next().map(String::as_str))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct PointType {
        pub type_code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub sub_type: Option<String>,
        #[serde(default)]
        pub labels: Labels,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub day_bitmap: Option<Bitmap>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub night_bitmap: Option<Bitmap>,
        #[serde(default)]
        pub day_colors: Vec<Color>,
        #[serde(default)]
        pub night_colors: Vec<Color>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub font_style: Option<String>,
    }

    impl PointType {
        pub fn new(type_code: impl Into<String>) -> Self {
            Self {
                type_code: type_code.into(),
                ..Self::default()
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct LineType {
        pub type_code: String,
        #[serde(default)]
        pub labels: Labels,
        #[serde(default)]
        pub width: u32,
        #[serde(default)]
        pub border_width: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style: Option<String>,
        #[serde(default)]
        pub use_orientation: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub day_bitmap: Option<Bitmap>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub night_bitmap: Option<Bitmap>,
    }

    impl LineType {
        pub fn new(type_code: impl Into<String>) -> Self {
            Self {
                type_code: type_code.into(),
                ..Self::default()
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct PolygonType {
        pub type_code: String,
        #[serde(default)]
        pub labels: Labels,
        #[serde(default)]
        pub extended_labels: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub font_style: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub day_bitmap: Option<Bitmap>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub night_bitmap: Option<Bitmap>,
    }

    impl PolygonType {
        pub fn new(type_code: impl Into<String>) -> Self {
            Self {
                type_code: type_code.into(),
                ..Self::default()
            }
        }
    }

    macro_rules! impl_style_record {
        ($($ty:ty),*) => {
            $(
                impl StyleRecord for $ty {
                    #[inline]
                    fn type_code(&self) -> &str {
                        &self.type_code
                    }

                    #[inline]
                    fn labels(&self) -> &Labels {
                        &self.labels
                    }

                    #[inline]
                    fn labels_mut(&mut self) -> &mut Labels {
                        &mut self.labels
                    }
                }
            )*
        };
    }

    impl_style_record!(PointType, LineType, PolygonType);

    /// `[_drawOrder]` 中的一行；目前不区分几何类别。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DrawOrderEntry {
        pub type_code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub priority: Option<u32>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct DrawOrder {
        pub entries: Vec<DrawOrderEntry>,
    }

    impl DrawOrder {
        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entries.is_empty()
        }

        pub fn type_codes(&self) -> impl Iterator<Item = &str> {
            self.entries.iter().map(|entry| entry.type_code.as_str())
        }
    }

    /// 一份完整的 TYP 样式文档。解析器每次加载都会新建实例，之后由调用方独占持有。
    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Document {
        pub header: Header,
        pub points: Vec<PointType>,
        pub lines: Vec<LineType>,
        pub polygons: Vec<PolygonType>,
        #[serde(default)]
        pub draw_order: DrawOrder,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub source_path: Option<PathBuf>,
        /// 读取时识别出的文本编码标签（如 `windows-1252`），保存时沿用；新建文档为 `None`。
        #[serde(skip)]
        pub source_encoding: Option<String>,
        #[serde(skip)]
        dirty: bool,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_source(path: impl Into<PathBuf>) -> Self {
            Self {
                source_path: Some(path.into()),
                ..Self::default()
            }
        }

        /// 点、线、面记录总数。
        pub fn record_count(&self) -> usize {
            self.points.len() + self.lines.len() + self.polygons.len()
        }

        pub fn find_point(&self, type_code: &str) -> Option<&PointType> {
            self.points.iter().find(|point| point.type_code == type_code)
        }

        pub fn find_line(&self, type_code: &str) -> Option<&LineType> {
            self.lines.iter().find(|line| line.type_code == type_code)
        }

        pub fn find_polygon(&self, type_code: &str) -> Option<&PolygonType> {
            self.polygons
                .iter()
                .find(|polygon| polygon.type_code == type_code)
        }

        /// 编辑器修改文档后调用；编解码器本身从不设置该标记。
        #[inline]
        pub fn mark_dirty(&mut self) {
            self.dirty = true;
        }

        #[inline]
        pub fn mark_clean(&mut self) {
            self.dirty = false;
        }

        #[inline]
        pub fn is_dirty(&self) -> bool {
            self.dirty
        }
    }

}
