
use std::fs;
use std::path::PathBuf;

use golden::assert_golden;
use typ_core::bitmap::{Bitmap, Color, Phase};
use typ_core::style::{Document, LineType, PointType, PolygonType, StyleRecord};
use typ_io::{
    DiagnosticKind, DocumentLoader, DocumentSaver, IoError, ParseErrorKind, ParseOptions,
    TypFacade, WriteOptions, parse_str, write_str,
};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn load_minimal_file_matches_expected_values() {
    let loader = TypFacade::new();
    let doc = loader.load(&fixture("minimal.typ")).expect("读取 minimal.typ 失败");

    assert_eq!(doc.header.code_page, Some(1252));
    assert_eq!(doc.header.fid, Some(1234));
    assert_eq!(doc.header.product_code, Some(1));
    assert_eq!(doc.points.len(), 1);
    let point = &doc.points[0];
    assert_eq!(point.type_code, "0x2f06");
    assert_eq!(point.label("0x04"), Some("Bank"));
    assert_eq!(doc.source_path.as_deref(), Some(fixture("minimal.typ").as_path()));
    assert!(!doc.is_dirty());
}

#[test]
fn load_basic_file_matches_golden_snapshot() {
    let loader = TypFacade::new();
    let parsed = loader
        .load_with_diagnostics(&fixture("basic.typ"))
        .expect("读取 basic.typ 失败");
    assert_golden("basic", &parsed.document);

    let kinds: Vec<&DiagnosticKind> = parsed.diagnostics.iter().map(|d| &d.kind).collect();
    assert_eq!(
        kinds,
        vec![&DiagnosticKind::UnknownSection {
            name: "_icons".to_string()
        }]
    );

    let point = &parsed.document.points[0];
    let bitmap = point.day_bitmap.as_ref().expect("缺少 DayXpm");
    assert!(bitmap.validate().is_empty());
    assert!(bitmap.color_at(1, 0).expect("像素颜色").is_transparent());
    assert_eq!(bitmap.color_at(0, 0).and_then(Color::rgb), Some((255, 0, 0)));
}

#[test]
fn invalid_header_value_reports_field_and_line() {
    let loader = TypFacade::new();
    let path = fixture("invalid_fid.typ");
    let err = match loader.load(&path) {
        Err(IoError::Parse(err)) => err,
        other => panic!("期望解析错误，实际为 {other:?}"),
    };
    assert_eq!(err.line, 3);
    assert_eq!(err.path.as_deref(), Some(path.as_path()));
    assert_eq!(
        err.kind,
        ParseErrorKind::InvalidField {
            key: "FID".to_string(),
            value: "0xZZ.typ".to_string(),
        }
    );
    assert!(err.to_string().ends_with(":3:5: invalid value for FID: 0xZZ.typ"));
}

#[test]
fn unterminated_section_is_structural_error() {
    let loader = TypFacade::new();
    let err = loader
        .load(&fixture("unterminated_point.typ"))
        .expect_err("缺少 [end] 应当失败");
    match err {
        IoError::Parse(err) => {
            assert!(err.is_structural());
            assert_eq!(err.line, 7);
            assert_eq!(err.message(), "unexpected end of file in point section");
        }
        other => panic!("期望解析错误，实际为 {other:?}"),
    }
}

#[test]
fn missing_file_is_read_error() {
    let loader = TypFacade::new();
    let err = loader
        .load(&fixture("does_not_exist.typ"))
        .expect_err("文件不存在应当失败");
    assert!(matches!(err, IoError::ReadError { .. }));
}

#[test]
fn short_bitmap_keeps_following_sections() {
    let loader = TypFacade::new();
    let parsed = loader
        .load_with_diagnostics(&fixture("short_bitmap.typ"))
        .expect("读取 short_bitmap.typ 失败");
    let doc = &parsed.document;
    assert_eq!(doc.points.len(), 1);
    assert_eq!(doc.polygons.len(), 1);

    let bitmap = doc.points[0].day_bitmap.as_ref().expect("缺少 DayXpm");
    assert_eq!(bitmap.palette.len(), 2);
    assert_eq!(bitmap.rows, vec!["ab".to_string()]);
    assert!(!bitmap.is_complete());

    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].line, 7);
    assert!(parsed.diagnostics[0].kind.is_warning());
}

#[test]
fn save_and_reload_preserves_fields() {
    let facade = TypFacade::new();
    let mut doc = facade.load(&fixture("basic.typ")).expect("读取 basic.typ 失败");
    doc.points[0].set_label("0x04", "Modified Bank");
    doc.mark_dirty();

    let dir = tempfile::tempdir().expect("创建临时目录");
    let target = dir.path().join("roundtrip.typ");
    facade.save(&doc, &target).expect("保存失败");

    let mut reloaded = facade.load(&target).expect("重新读取失败");
    assert_eq!(reloaded.points[0].label("0x04"), Some("Modified Bank"));
    assert_eq!(reloaded.source_path.as_deref(), Some(target.as_path()));

    reloaded.source_path = doc.source_path.clone();
    doc.mark_clean();
    assert_eq!(reloaded, doc);

    let entries: Vec<_> = fs::read_dir(dir.path())
        .expect("列出临时目录")
        .map(|entry| entry.expect("目录项").file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("roundtrip.typ")]);
}

#[test]
fn save_overwrites_existing_file() {
    let facade = TypFacade::new();
    let dir = tempfile::tempdir().expect("创建临时目录");
    let target = dir.path().join("existing.typ");
    fs::write(&target, "stale content").expect("写入旧文件");

    let mut doc = Document::new();
    doc.header.code_page = Some(1252);
    facade.save(&doc, &target).expect("保存失败");

    let text = fs::read_to_string(&target).expect("读取保存结果");
    assert_eq!(text, "[_id]\nCodePage=1252\n[end]\n\n");
}

#[test]
fn save_into_missing_directory_fails_without_output() {
    let facade = TypFacade::new();
    let dir = tempfile::tempdir().expect("创建临时目录");
    let target = dir.path().join("missing").join("out.typ");

    let err = facade
        .save(&Document::new(), &target)
        .expect_err("目录不存在应当失败");
    assert!(matches!(err, IoError::WriteError { .. }));
    assert!(!target.exists());
}

#[test]
fn written_text_parses_back_to_equal_document() {
    let mut doc = Document::new();
    doc.header.code_page = Some(65001);
    doc.header.map_id = Some(77);

    let mut icon = Bitmap::new(3, 1, 2, 1);
    icon.palette.insert(" ".to_string(), Color::transparent());
    icon.palette.insert(";".to_string(), Color::hex("#00FF00"));
    icon.rows.push("; ;".to_string());

    let mut point = PointType::new("0x6403");
    point.sub_type = Some("0x01".to_string());
    point.set_label("0x04", "Cemetery");
    point.set_label("0x02", "Friedhof");
    point.day_bitmap = Some(icon.clone());
    point.night_bitmap = Some(icon.clone());
    point
        .night_colors
        .push(Color::hex("#202020").with_phase(Phase::Night));
    doc.points.push(point);

    let mut line = LineType::new("0x16");
    line.width = 2;
    line.style = Some("dashed".to_string());
    line.night_bitmap = Some(icon.clone());
    doc.lines.push(line);

    let mut polygon = PolygonType::new("0x50");
    polygon.set_label("0x04", "Forest");
    polygon.font_style = Some("NoLabel".to_string());
    polygon.night_bitmap = Some(icon);
    doc.polygons.push(polygon);

    let text = write_str(&doc, &WriteOptions::default()).expect("渲染失败");
    let parsed = parse_str(&text, ParseOptions::default()).expect("重新解析失败");
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    assert_eq!(parsed.document, doc);

    let again = write_str(&parsed.document, &WriteOptions::default()).expect("再次渲染失败");
    assert_eq!(again, text);
}

#[test]
fn cp1252_file_loads_and_saves_in_same_encoding() {
    let facade = TypFacade::new();
    let doc = facade.load(&fixture("latin1.typ")).expect("读取 latin1.typ 失败");
    assert_eq!(doc.header.code_page, Some(1252));
    assert_eq!(doc.source_encoding.as_deref(), Some("windows-1252"));
    let polygon = &doc.polygons[0];
    assert_eq!(polygon.label("0x01"), Some("Bâtiment"));
    assert_eq!(polygon.label("0x02"), Some("Gebäude"));

    let dir = tempfile::tempdir().expect("创建临时目录");
    let target = dir.path().join("latin1.typ");
    facade.save(&doc, &target).expect("保存失败");

    let saved = fs::read(&target).expect("读取保存结果");
    assert!(std::str::from_utf8(&saved).is_err(), "应按 CP1252 写回");
    assert!(saved.windows(9).any(|w| w == b"B\xE2timent"));
    assert!(saved.windows(7).any(|w| w == b"Geb\xE4ude"));

    let reloaded = facade.load(&target).expect("重新读取失败");
    assert_eq!(reloaded.polygons, doc.polygons);
    assert_eq!(reloaded.source_encoding, doc.source_encoding);
}

#[test]
fn unencodable_label_fails_without_touching_target() {
    let facade = TypFacade::new();
    let mut doc = facade.load(&fixture("latin1.typ")).expect("读取 latin1.typ 失败");
    doc.polygons[0].set_label("0x04", "東京");

    let dir = tempfile::tempdir().expect("创建临时目录");
    let target = dir.path().join("out.typ");
    fs::write(&target, "previous").expect("写入旧文件");

    let err = facade.save(&doc, &target).expect_err("CP1252 无法表示汉字");
    assert!(matches!(
        err,
        IoError::Unencodable {
            encoding: "windows-1252",
            ..
        }
    ));
    assert_eq!(fs::read_to_string(&target).expect("读取旧文件"), "previous");
}

#[cfg(unix)]
#[test]
fn save_keeps_existing_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let facade = TypFacade::new();
    let dir = tempfile::tempdir().expect("创建临时目录");
    for mode in [0o644, 0o640] {
        let target = dir.path().join(format!("mode_{mode:o}.typ"));
        fs::write(&target, "stale").expect("写入旧文件");
        fs::set_permissions(&target, fs::Permissions::from_mode(mode)).expect("设置权限");

        facade.save(&Document::new(), &target).expect("保存失败");

        let actual = fs::metadata(&target).expect("读取元数据").permissions().mode() & 0o777;
        assert_eq!(actual, mode, "保存后权限应保持为 {mode:o}");
    }
}

#[cfg(unix)]
#[test]
fn save_creates_new_file_readable_by_others() {
    use std::os::unix::fs::PermissionsExt;

    let facade = TypFacade::new();
    let dir = tempfile::tempdir().expect("创建临时目录");
    let target = dir.path().join("fresh.typ");
    facade.save(&Document::new(), &target).expect("保存失败");

    let actual = fs::metadata(&target).expect("读取元数据").permissions().mode() & 0o777;
    assert_eq!(actual, 0o644);
}
