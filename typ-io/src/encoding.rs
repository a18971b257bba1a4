//! 文本编码识别与转换。
//!
//! 读取时优先按 UTF-8 解码；不是合法 UTF-8 时按文件头部声明的 `CodePage`
//! 选择编码，未声明或无法识别则退回 Windows-1252。保存时沿用读取时的编码。

use std::borrow::Cow;

use encoding_rs::Encoding;

/// Windows 代码页编号到 `encoding_rs` 编码的映射。
pub fn encoding_for_code_page(code_page: i32) -> Option<&'static Encoding> {
    let encoding = match code_page {
        437 | 850 | 1252 | 28591 => encoding_rs::WINDOWS_1252,
        866 => encoding_rs::IBM866,
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        28592 => encoding_rs::ISO_8859_2,
        28605 => encoding_rs::ISO_8859_15,
        65001 => encoding_rs::UTF_8,
        _ => return None,
    };
    Some(encoding)
}

/// 解码文件内容，返回文本及实际使用的编码。
pub fn decode(bytes: &[u8]) -> (Cow<'_, str>, &'static Encoding) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (Cow::Borrowed(text), encoding_rs::UTF_8);
    }
    let encoding = declared_code_page(bytes)
        .and_then(encoding_for_code_page)
        .filter(|encoding| *encoding != encoding_rs::UTF_8)
        .unwrap_or(encoding_rs::WINDOWS_1252);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    (text, encoding)
}

/// 按指定编码编码文本；存在该编码无法表示的字符时返回 `None`。
pub fn encode<'a>(text: &'a str, encoding: &'static Encoding) -> Option<Cow<'a, [u8]>> {
    let (bytes, _, had_unmappable) = encoding.encode(text);
    if had_unmappable { None } else { Some(bytes) }
}

/// 在原始字节中查找 `CodePage=` 行。键名与数字都是 ASCII，不依赖编码。
fn declared_code_page(bytes: &[u8]) -> Option<i32> {
    const KEY: &[u8] = b"codepage";
    bytes.split(|byte| *byte == b'\n').find_map(|line| {
        let line = line.trim_ascii();
        let (key, value) = line.split_at(line.iter().position(|byte| *byte == b'=')?);
        if !key.trim_ascii().eq_ignore_ascii_case(KEY) {
            return None;
        }
        let digits: Vec<u8> = value[1..]
            .trim_ascii()
            .iter()
            .copied()
            .take_while(u8::is_ascii_digit)
            .collect();
        std::str::from_utf8(&digits).ok()?.parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_utf8_is_borrowed_unchanged() {
        let source = "[_id]\nCodePage=1252\n[end]\n[_polygon]\nString=0x01,Bâtiment\n";
        let (text, encoding) = decode(source.as_bytes());
        assert!(matches!(text, Cow::Borrowed(_)));
        assert_eq!(text, source);
        assert_eq!(encoding, encoding_rs::UTF_8);
    }

    #[test]
    fn declared_code_page_selects_encoding() {
        let mut bytes = b"[_id]\r\n  codepage = 1251 ; cyrillic\r\n[end]\r\nString=0x19,".to_vec();
        bytes.extend_from_slice(&[0xCC, 0xEE, 0xF1, 0xEA, 0xE2, 0xE0]);
        let (text, encoding) = decode(&bytes);
        assert_eq!(encoding, encoding_rs::WINDOWS_1251);
        assert!(text.ends_with("String=0x19,Москва"));
    }

    #[test]
    fn missing_or_unknown_code_page_falls_back_to_windows_1252() {
        let (text, encoding) = decode(b"String=0x01,B\xE2timent");
        assert_eq!(encoding, encoding_rs::WINDOWS_1252);
        assert_eq!(text, "String=0x01,B\u{e2}timent");

        let (_, encoding) = decode(b"CodePage=4242\nString=0x01,B\xE2timent");
        assert_eq!(encoding, encoding_rs::WINDOWS_1252);

        // 声明 UTF-8 但内容不合法时同样退回
        let (_, encoding) = decode(b"CodePage=65001\nString=0x01,B\xE2timent");
        assert_eq!(encoding, encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn encode_reports_unmappable_characters() {
        let bytes = encode("Bâtiment", encoding_rs::WINDOWS_1252).expect("encodable");
        assert_eq!(bytes.as_ref(), b"B\xE2timent");
        assert!(encode("東京", encoding_rs::WINDOWS_1252).is_none());
        assert!(encode("東京", encoding_rs::UTF_8).is_some());
    }
}
