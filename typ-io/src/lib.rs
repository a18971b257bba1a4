use std::fmt::{Display, Formatter};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use encoding_rs::Encoding;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};
use typ_core::bitmap::{Bitmap, Color, Phase};
use typ_core::style::{
    Document, DrawOrder, DrawOrderEntry, Header, LineType, PointType, PolygonType, StyleRecord,
};

pub mod encoding;
mod writer;

pub use writer::{WriteOptions, write_str};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode {path:?} as {encoding}: text contains unmappable characters")]
    Unencodable {
        path: PathBuf,
        encoding: &'static str,
    },
    #[error("failed to render document: {0}")]
    Render(#[from] std::fmt::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// 带位置信息的致命解析错误。`column` 为尽力而为的 1 起始列号，未知时为 0。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub path: Option<PathBuf>,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn new(line: usize, column: usize, kind: ParseErrorKind) -> Self {
        Self {
            line,
            column,
            path: None,
            kind,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// 结构性错误（段落未闭合）与字段错误的区分，便于调用方分别呈现。
    pub fn is_structural(&self) -> bool {
        matches!(self.kind, ParseErrorKind::UnexpectedEof { .. })
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "{}:{}:{}: {}",
                path.display(),
                self.line,
                self.column,
                self.kind
            ),
            None => write!(f, "line {}, col {}: {}", self.line, self.column, self.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of file in {section} section")]
    UnexpectedEof { section: String },
    #[error("invalid value for {key}: {value}")]
    InvalidField { key: String, value: String },
    #[error("invalid bitmap format for {key}: {value:?}")]
    InvalidBitmap { key: String, value: String },
}

/// 解析时被容忍的异常输入，随文档一同返回而不中断解析。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    UnknownSection { name: String },
    UnknownKey { section: String, key: String },
    MalformedLine { text: String },
    UnlabeledString { value: String },
    MalformedPaletteEntry { text: String },
    ShortBitmap {
        key: String,
        expected: usize,
        read: usize,
    },
    MissingTypeCode { section: String },
    StrayTerminator,
    EmptyCustomColor { key: String },
    NegativeWidth { key: String, value: i64 },
}

impl DiagnosticKind {
    /// 可能导致数据缺失的异常；其余属于向前兼容的正常忽略。
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::ShortBitmap { .. }
                | DiagnosticKind::MalformedPaletteEntry { .. }
                | DiagnosticKind::MissingTypeCode { .. }
                | DiagnosticKind::EmptyCustomColor { .. }
                | DiagnosticKind::NegativeWidth { .. }
        )
    }
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::UnknownSection { name } => write!(f, "skipped unknown section [{name}]"),
            DiagnosticKind::UnknownKey { section, key } => {
                write!(f, "ignored unknown key {key} in {section} section")
            }
            DiagnosticKind::MalformedLine { text } => {
                write!(f, "ignored line without '=': {text:?}")
            }
            DiagnosticKind::UnlabeledString { value } => {
                write!(f, "ignored label without language code: {value:?}")
            }
            DiagnosticKind::MalformedPaletteEntry { text } => {
                write!(f, "palette entry without \" c \" separator: {text:?}")
            }
            DiagnosticKind::ShortBitmap {
                key,
                expected,
                read,
            } => write!(
                f,
                "bitmap {key} ended after {read} of {expected} quoted lines"
            ),
            DiagnosticKind::MissingTypeCode { section } => {
                write!(f, "{section} section has no Type")
            }
            DiagnosticKind::StrayTerminator => write!(f, "ignored [end] outside of a section"),
            DiagnosticKind::EmptyCustomColor { key } => {
                write!(f, "ignored {key} without a value (an unquoted '#' starts a comment)")
            }
            DiagnosticKind::NegativeWidth { key, value } => {
                write!(f, "{key}={value} is negative, using 0")
            }
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

/// 解析结果：文档及被容忍的异常列表。
#[derive(Debug)]
pub struct Parsed {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

/// 注释识别方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentStyle {
    /// 行内第一个 `;` 或 `#` 即为注释起点，不识别引号。
    Legacy,
    /// 双引号内的 `;` / `#` 视为数据。
    #[default]
    QuoteAware,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub comment_style: CommentStyle,
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

#[derive(Debug, Clone, Default)]
pub struct TypFacade {
    parse_options: ParseOptions,
    write_options: WriteOptions,
}

impl TypFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(parse_options: ParseOptions, write_options: WriteOptions) -> Self {
        Self {
            parse_options,
            write_options,
        }
    }

    /// 读取并解析文件，同时返回被容忍的异常，供调用方自行呈现。
    pub fn load_with_diagnostics(&self, path: &Path) -> Result<Parsed, IoError> {
        let bytes = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let (text, encoding) = encoding::decode(&bytes);
        let mut parsed =
            parse_str(&text, self.parse_options).map_err(|err| err.with_path(path))?;
        parsed.document.source_path = Some(path.to_path_buf());
        parsed.document.source_encoding = Some(encoding.name().to_string());
        debug!(
            path = %path.display(),
            encoding = encoding.name(),
            points = parsed.document.points.len(),
            lines = parsed.document.lines.len(),
            polygons = parsed.document.polygons.len(),
            diagnostics = parsed.diagnostics.len(),
            "TYP 文档解析完成"
        );
        Ok(parsed)
    }
}

impl DocumentLoader for TypFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let parsed = self.load_with_diagnostics(path)?;
        for diagnostic in &parsed.diagnostics {
            if diagnostic.kind.is_warning() {
                warn!(path = %path.display(), line = diagnostic.line, "{}", diagnostic.kind);
            } else {
                debug!(path = %path.display(), line = diagnostic.line, "{}", diagnostic.kind);
            }
        }
        Ok(parsed.document)
    }
}

impl DocumentSaver for TypFacade {
    /// 先写入目标目录下的临时文件再整体替换，失败时不会留下半截文件。
    /// 文本按读取时的编码写回（新建文档为 UTF-8），已有文件的权限保持不变。
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let text = write_str(document, &self.write_options)?;
        let encoding = document
            .source_encoding
            .as_deref()
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(encoding_rs::UTF_8);
        let bytes = encoding::encode(&text, encoding).ok_or_else(|| IoError::Unencodable {
            path: path.to_path_buf(),
            encoding: encoding.name(),
        })?;
        let write_error = |source: std::io::Error| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        };

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staging = NamedTempFile::new_in(directory).map_err(write_error)?;
        staging.write_all(&bytes).map_err(write_error)?;
        if let Some(permissions) = target_permissions(path) {
            staging
                .as_file()
                .set_permissions(permissions)
                .map_err(write_error)?;
        }
        staging.as_file().sync_all().map_err(write_error)?;
        staging
            .persist(path)
            .map_err(|err| write_error(err.error))?;

        info!(
            path = %path.display(),
            encoding = encoding.name(),
            bytes = bytes.len(),
            "TYP 文档已保存"
        );
        Ok(())
    }
}

/// 覆盖已有文件时沿用其权限；新文件在 Unix 上使用 0644，而非临时文件的 0600。
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// 解析内存中的 TYP 文本。
pub fn parse_str(source: &str, options: ParseOptions) -> Result<Parsed, ParseError> {
    TypParser::new(source, options).parse()
}

/// 去除注释与首尾空白，得到逻辑行。
pub fn clean_line(line: &str, style: CommentStyle) -> &str {
    let end = comment_start(line, style).unwrap_or(line.len());
    line[..end].trim()
}

fn comment_start(line: &str, style: CommentStyle) -> Option<usize> {
    let mut quoted = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' if style == CommentStyle::QuoteAware => quoted = !quoted,
            ';' | '#' if !quoted => return Some(index),
            _ => {}
        }
    }
    None
}

/// 拆分 `code,text` 形式的标签；缺少逗号或语言代码为空时返回 `None`。
pub fn parse_label(value: &str) -> Option<(&str, &str)> {
    let (code, text) = value.split_once(',')?;
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    Some((code, text.trim()))
}

/// `Y` / `y` / `1` 为真，其余为假。
pub fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("y") || value == "1"
}

/// 顶层可识别的段落种类。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    Header,
    Point,
    Line,
    Polygon,
    DrawOrder,
    Unknown(String),
}

impl SectionKind {
    pub fn from_marker(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "_id" => SectionKind::Header,
            "_point" => SectionKind::Point,
            "_line" => SectionKind::Line,
            "_polygon" => SectionKind::Polygon,
            "_draworder" => SectionKind::DrawOrder,
            _ => SectionKind::Unknown(name.to_string()),
        }
    }
}

impl Display for SectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionKind::Header => f.write_str("header"),
            SectionKind::Point => f.write_str("point"),
            SectionKind::Line => f.write_str("line"),
            SectionKind::Polygon => f.write_str("polygon"),
            SectionKind::DrawOrder => f.write_str("draw order"),
            SectionKind::Unknown(name) => write!(f, "[{name}]"),
        }
    }
}

fn section_marker(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?;
    Some(inner.strip_suffix(']').unwrap_or(inner).trim())
}

fn is_terminator(line: &str) -> bool {
    section_marker(line).is_some_and(|name| name.eq_ignore_ascii_case("end"))
}

/// 段落内的一条 `Key=Value` 记录，`raw` 为原始物理行。
struct Entry<'a> {
    key: &'a str,
    value: &'a str,
    raw: &'a str,
}

impl Entry<'_> {
    fn value_column(&self) -> usize {
        let Some(eq) = self.raw.find('=') else {
            return 0;
        };
        let after = &self.raw[eq + 1..];
        eq + 1 + (after.len() - after.trim_start().len()) + 1
    }
}

struct TypParser<'a> {
    reader: LineReader<'a>,
    options: ParseOptions,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TypParser<'a> {
    fn new(source: &'a str, options: ParseOptions) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            reader: LineReader::new(source),
            options,
            diagnostics: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Parsed, ParseError> {
        let mut document = Document::new();
        while let Some((_, line)) = self.reader.next_logical(self.options.comment_style) {
            if is_terminator(line) {
                self.note(DiagnosticKind::StrayTerminator);
                continue;
            }
            let Some(name) = section_marker(line) else {
                continue;
            };
            match SectionKind::from_marker(name) {
                SectionKind::Header => self.parse_header(&mut document.header)?,
                SectionKind::Point => {
                    let point = self.parse_point()?;
                    document.points.push(point);
                }
                SectionKind::Line => {
                    let line = self.parse_line()?;
                    document.lines.push(line);
                }
                SectionKind::Polygon => {
                    let polygon = self.parse_polygon()?;
                    document.polygons.push(polygon);
                }
                SectionKind::DrawOrder => self.parse_draw_order(&mut document.draw_order)?,
                SectionKind::Unknown(name) => {
                    self.note(DiagnosticKind::UnknownSection { name: name.clone() });
                    self.skip_section(&SectionKind::Unknown(name))?;
                }
            }
        }
        Ok(Parsed {
            document,
            diagnostics: self.diagnostics,
        })
    }

    fn skip_section(&mut self, section: &SectionKind) -> Result<(), ParseError> {
        loop {
            match self.reader.next_logical(self.options.comment_style) {
                Some((_, line)) if is_terminator(line) => return Ok(()),
                Some(_) => continue,
                None => return Err(self.unexpected_eof(section)),
            }
        }
    }

    /// 读取段内下一条记录；遇到 `[end]` 返回 `None`，文件提前结束则报错。
    fn next_entry(&mut self, section: &SectionKind) -> Result<Option<Entry<'a>>, ParseError> {
        loop {
            let Some((raw, line)) = self.reader.next_logical(self.options.comment_style) else {
                return Err(self.unexpected_eof(section));
            };
            if is_terminator(line) {
                return Ok(None);
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    return Ok(Some(Entry {
                        key: key.trim(),
                        value: value.trim(),
                        raw,
                    }));
                }
                None => self.note(DiagnosticKind::MalformedLine {
                    text: line.to_string(),
                }),
            }
        }
    }

    fn parse_header(&mut self, header: &mut Header) -> Result<(), ParseError> {
        let section = SectionKind::Header;
        while let Some(entry) = self.next_entry(&section)? {
            let slot = match entry.key.to_ascii_lowercase().as_str() {
                "codepage" => &mut header.code_page,
                "fid" => &mut header.fid,
                "productcode" => &mut header.product_code,
                "mapid" => &mut header.map_id,
                _ => {
                    self.unknown_key(&section, &entry);
                    continue;
                }
            };
            *slot = Some(self.parse_number::<i32>(&entry)?);
        }
        Ok(())
    }

    fn parse_point(&mut self) -> Result<PointType, ParseError> {
        let section = SectionKind::Point;
        let mut point = PointType::default();
        while let Some(entry) = self.next_entry(&section)? {
            match entry.key.to_ascii_lowercase().as_str() {
                "type" => point.type_code = entry.value.to_string(),
                "subtype" => point.sub_type = Some(entry.value.to_string()),
                "string" | "string1" | "string2" | "string3" | "string4" => {
                    self.apply_label(&mut point, &entry)
                }
                "dayxpm" | "xpm" => point.day_bitmap = Some(self.parse_bitmap(&entry)?),
                "nightxpm" => point.night_bitmap = Some(self.parse_bitmap(&entry)?),
                "daycustomcolor" => {
                    if let Some(color) = self.custom_color(&entry, Phase::Day) {
                        point.day_colors.push(color);
                    }
                }
                "nightcustomcolor" => {
                    if let Some(color) = self.custom_color(&entry, Phase::Night) {
                        point.night_colors.push(color);
                    }
                }
                "fontstyle" => point.font_style = Some(entry.value.to_string()),
                _ => self.unknown_key(&section, &entry),
            }
        }
        self.check_type_code(&section, &point);
        Ok(point)
    }

    fn parse_line(&mut self) -> Result<LineType, ParseError> {
        let section = SectionKind::Line;
        let mut line = LineType::default();
        while let Some(entry) = self.next_entry(&section)? {
            match entry.key.to_ascii_lowercase().as_str() {
                "type" => line.type_code = entry.value.to_string(),
                "string" | "string1" | "string2" | "string3" | "string4" => {
                    self.apply_label(&mut line, &entry)
                }
                "linewidth" => line.width = self.parse_width(&entry)?,
                "borderwidth" => line.border_width = self.parse_width(&entry)?,
                "linestyle" => line.style = Some(entry.value.to_string()),
                "useorientation" => line.use_orientation = parse_flag(entry.value),
                "xpm" | "dayxpm" => line.day_bitmap = Some(self.parse_bitmap(&entry)?),
                "nightxpm" => line.night_bitmap = Some(self.parse_bitmap(&entry)?),
                _ => self.unknown_key(&section, &entry),
            }
        }
        self.check_type_code(&section, &line);
        Ok(line)
    }

    fn parse_polygon(&mut self) -> Result<PolygonType, ParseError> {
        let section = SectionKind::Polygon;
        let mut polygon = PolygonType::default();
        while let Some(entry) = self.next_entry(&section)? {
            match entry.key.to_ascii_lowercase().as_str() {
                "type" => polygon.type_code = entry.value.to_string(),
                "string" | "string1" | "string2" | "string3" | "string4" => {
                    self.apply_label(&mut polygon, &entry)
                }
                "extendedlabels" => polygon.extended_labels = parse_flag(entry.value),
                "fontstyle" => polygon.font_style = Some(entry.value.to_string()),
                "xpm" | "dayxpm" => polygon.day_bitmap = Some(self.parse_bitmap(&entry)?),
                "nightxpm" => polygon.night_bitmap = Some(self.parse_bitmap(&entry)?),
                _ => self.unknown_key(&section, &entry),
            }
        }
        self.check_type_code(&section, &polygon);
        Ok(polygon)
    }

    /// 只提取 `Type=code,priority` 中的类型代码（以及可解析的优先级）。
    fn parse_draw_order(&mut self, draw_order: &mut DrawOrder) -> Result<(), ParseError> {
        let section = SectionKind::DrawOrder;
        while let Some(entry) = self.next_entry(&section)? {
            if !entry.key.eq_ignore_ascii_case("type") {
                self.unknown_key(&section, &entry);
                continue;
            }
            let (code, priority) = match entry.value.split_once(',') {
                Some((code, priority)) => (code.trim(), priority.trim().parse::<u32>().ok()),
                None => (entry.value, None),
            };
            if code.is_empty() {
                self.note(DiagnosticKind::MalformedLine {
                    text: entry.raw.trim().to_string(),
                });
                continue;
            }
            draw_order.entries.push(DrawOrderEntry {
                type_code: code.to_string(),
                priority,
            });
        }
        Ok(())
    }

    /// 解析位图头部并按声明数量读取随后的调色板行与像素行。
    fn parse_bitmap(&mut self, entry: &Entry<'a>) -> Result<Bitmap, ParseError> {
        let header = unquote(entry.value);
        let fields: Vec<u32> = header
            .split_whitespace()
            .map(|field| field.parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| self.invalid_bitmap(entry))?;
        let &[width, height, colors, chars_per_pixel] = fields.as_slice() else {
            return Err(self.invalid_bitmap(entry));
        };

        let mut bitmap = Bitmap::new(width, height, colors, chars_per_pixel);
        let palette_lines = colors as usize;
        let expected = palette_lines.saturating_add(height as usize);
        let mut read = 0;
        while read < expected {
            let Some(raw) = self.reader.next_raw() else {
                break;
            };
            let content = match BitmapLine::classify(raw) {
                BitmapLine::Skip => continue,
                BitmapLine::Quoted(content) => content,
                BitmapLine::Other => {
                    self.reader.put_back(raw);
                    break;
                }
            };

            if read < palette_lines {
                match content.split_once(" c ") {
                    Some((token, spec)) => {
                        bitmap.palette.insert(token.to_string(), Color::parse(spec));
                    }
                    None => self.note(DiagnosticKind::MalformedPaletteEntry {
                        text: content.to_string(),
                    }),
                }
            } else {
                bitmap.rows.push(content.to_string());
            }
            read += 1;
        }

        if read < expected {
            self.note(DiagnosticKind::ShortBitmap {
                key: entry.key.to_string(),
                expected,
                read,
            });
        }
        Ok(bitmap)
    }

    fn apply_label<R: StyleRecord>(&mut self, record: &mut R, entry: &Entry<'a>) {
        match parse_label(entry.value) {
            Some((code, text)) => {
                record.set_label(code, text);
            }
            None => self.note(DiagnosticKind::UnlabeledString {
                value: entry.value.to_string(),
            }),
        }
    }

    fn parse_number<T: FromStr>(&self, entry: &Entry<'a>) -> Result<T, ParseError> {
        entry
            .value
            .parse::<T>()
            .map_err(|_| self.invalid_field(entry))
    }

    fn invalid_field(&self, entry: &Entry<'a>) -> ParseError {
        ParseError::new(
            self.reader.line_number(),
            entry.value_column(),
            ParseErrorKind::InvalidField {
                key: entry.key.to_string(),
                value: entry.value.to_string(),
            },
        )
    }

    /// 宽度按有符号整数解析；负值记录诊断并按 0 处理，非数字仍为致命错误。
    fn parse_width(&mut self, entry: &Entry<'a>) -> Result<u32, ParseError> {
        let value = self.parse_number::<i64>(entry)?;
        match u32::try_from(value) {
            Ok(width) => Ok(width),
            Err(_) if value < 0 => {
                self.note(DiagnosticKind::NegativeWidth {
                    key: entry.key.to_string(),
                    value,
                });
                Ok(0)
            }
            Err(_) => Err(self.invalid_field(entry)),
        }
    }

    /// 值为空（通常是未加引号的 `#RRGGBB` 被当作注释截掉）时忽略该条目。
    fn custom_color(&mut self, entry: &Entry<'a>, phase: Phase) -> Option<Color> {
        let value = unquote(entry.value);
        if value.is_empty() {
            self.note(DiagnosticKind::EmptyCustomColor {
                key: entry.key.to_string(),
            });
            return None;
        }
        Some(Color::parse(value).with_phase(phase))
    }

    fn invalid_bitmap(&self, entry: &Entry<'a>) -> ParseError {
        ParseError::new(
            self.reader.line_number(),
            entry.value_column(),
            ParseErrorKind::InvalidBitmap {
                key: entry.key.to_string(),
                value: entry.value.to_string(),
            },
        )
    }

    fn unexpected_eof(&self, section: &SectionKind) -> ParseError {
        ParseError::new(
            self.reader.line_number(),
            0,
            ParseErrorKind::UnexpectedEof {
                section: section.to_string(),
            },
        )
    }

    fn check_type_code<R: StyleRecord>(&mut self, section: &SectionKind, record: &R) {
        if record.type_code().is_empty() {
            self.note(DiagnosticKind::MissingTypeCode {
                section: section.to_string(),
            });
        }
    }

    fn unknown_key(&mut self, section: &SectionKind, entry: &Entry<'a>) {
        self.note(DiagnosticKind::UnknownKey {
            section: section.to_string(),
            key: entry.key.to_string(),
        });
    }

    fn note(&mut self, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic {
            line: self.reader.line_number(),
            kind,
        });
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"').trim()
}

/// 位图块内的一行。数据行不做行内注释剥离：内容取第一个与最后一个引号之间的全部字符，
/// 因而 `;`、`#` 与 `"` 都可以作为像素记号；行尾注释里不能再出现引号。
enum BitmapLine<'a> {
    Skip,
    Quoted(&'a str),
    Other,
}

impl<'a> BitmapLine<'a> {
    fn classify(raw: &'a str) -> Self {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            return BitmapLine::Skip;
        }
        let Some(rest) = line.strip_prefix('"') else {
            return BitmapLine::Other;
        };
        // 未闭合的引号取到行尾
        BitmapLine::Quoted(match rest.rfind('"') {
            Some(end) => &rest[..end],
            None => rest,
        })
    }
}

/// 逐行读取源文本，支持回退一行。
struct LineReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<&'a str>,
    line_number: usize,
}

impl<'a> LineReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    /// 最近一次返回的物理行行号（1 起始）。
    fn line_number(&self) -> usize {
        self.line_number
    }

    fn next_raw(&mut self) -> Option<&'a str> {
        if let Some(line) = self.buffer.take() {
            return Some(line);
        }
        let line = self.lines.next()?;
        self.line_number += 1;
        Some(line)
    }

    /// 跳过空行，返回 `(原始行, 逻辑行)`。
    fn next_logical(&mut self, style: CommentStyle) -> Option<(&'a str, &'a str)> {
        loop {
            let raw = self.next_raw()?;
            let line = clean_line(raw, style);
            if !line.is_empty() {
                return Some((raw, line));
            }
        }
    }

    /// 回退刚刚读到的那一行，下一次 `next_raw` 会再次返回它。
    fn put_back(&mut self, line: &'a str) {
        debug_assert!(self.buffer.is_none(), "only one line may be put back");
        self.buffer = Some(line);
    }
}
