//! 集成测试辅助：内存 xlsx 构建、multipart 请求体、计数假模型

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sheet_insight::error::LlmError;
use sheet_insight::services::{EnrichmentRequest, LanguageModel};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-chart-a";
pub const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0fake-chart-b";

/// 单元格内容
#[derive(Debug, Clone)]
pub enum CellValue {
    Text(String),
    /// 富文本，按 run 拆分
    Rich(Vec<String>),
    Number(f64),
}

pub fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

/// 图片：锚点左上角（0 起）和媒体文件名；`media` 不存在于工作簿中时模拟缺失媒体
#[derive(Debug, Clone)]
pub struct PictureFixture {
    pub row: u32,
    pub col: u32,
    pub media: String,
}

#[derive(Debug, Clone, Default)]
pub struct SheetFixture {
    pub name: String,
    /// (行, 列, 值)，行列从 1 开始
    pub cells: Vec<(u32, u32, CellValue)>,
    pub pictures: Vec<PictureFixture>,
}

impl SheetFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn cell(mut self, row: u32, col: u32, value: CellValue) -> Self {
        self.cells.push((row, col, value));
        self
    }

    pub fn picture(mut self, row: u32, col: u32, media: &str) -> Self {
        self.pictures.push(PictureFixture {
            row,
            col,
            media: media.to_string(),
        });
        self
    }
}

/// 内存 xlsx 构建器
#[derive(Debug, Default)]
pub struct XlsxBuilder {
    sheets: Vec<SheetFixture>,
    /// (文件名, 数据)，按加入顺序写入 `xl/media/`
    media: Vec<(String, Vec<u8>)>,
}

impl XlsxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(mut self, sheet: SheetFixture) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn media(mut self, name: &str, data: &[u8]) -> Self {
        self.media.push((name.to_string(), data.to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut put = |name: &str, content: &[u8]| {
            zip.start_file(name, options).unwrap();
            zip.write_all(content).unwrap();
        };

        put("[Content_Types].xml", content_types(self).as_bytes());
        put("_rels/.rels", ROOT_RELS.as_bytes());
        put("xl/workbook.xml", workbook_xml(&self.sheets).as_bytes());
        put(
            "xl/_rels/workbook.xml.rels",
            workbook_rels(&self.sheets).as_bytes(),
        );

        for (index, sheet) in self.sheets.iter().enumerate() {
            let n = index + 1;
            let has_drawing = !sheet.pictures.is_empty();
            put(
                &format!("xl/worksheets/sheet{n}.xml"),
                sheet_xml(sheet, has_drawing).as_bytes(),
            );
            if has_drawing {
                put(
                    &format!("xl/worksheets/_rels/sheet{n}.xml.rels"),
                    rels(&[(
                        "rId1".to_string(),
                        "drawing".to_string(),
                        format!("../drawings/drawing{n}.xml"),
                    )])
                    .as_bytes(),
                );
                put(
                    &format!("xl/drawings/drawing{n}.xml"),
                    drawing_xml(&sheet.pictures).as_bytes(),
                );
                let picture_rels: Vec<_> = sheet
                    .pictures
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        (
                            format!("rId{}", i + 1),
                            "image".to_string(),
                            format!("../media/{}", p.media),
                        )
                    })
                    .collect();
                put(
                    &format!("xl/drawings/_rels/drawing{n}.xml.rels"),
                    rels(&picture_rels).as_bytes(),
                );
            }
        }

        for (name, data) in &self.media {
            put(&format!("xl/media/{name}"), data);
        }

        zip.finish().unwrap().into_inner()
    }
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

fn content_types(builder: &XlsxBuilder) -> String {
    let mut overrides = String::new();
    for n in 1..=builder.sheets.len() {
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Default Extension="jpeg" ContentType="image/jpeg"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
    )
}

fn workbook_xml(sheets: &[SheetFixture]) -> String {
    let entries: String = sheets
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape(&s.name),
                i + 1,
                i + 1
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{entries}</sheets></workbook>"#
    )
}

fn workbook_rels(sheets: &[SheetFixture]) -> String {
    let entries: Vec<_> = (1..=sheets.len())
        .map(|n| {
            (
                format!("rId{n}"),
                "worksheet".to_string(),
                format!("worksheets/sheet{n}.xml"),
            )
        })
        .collect();
    rels(&entries)
}

fn rels(entries: &[(String, String, String)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, kind, target)| {
            format!(
                r#"<Relationship Id="{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/{kind}" Target="{target}"/>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{body}</Relationships>"#
    )
}

fn sheet_xml(sheet: &SheetFixture, has_drawing: bool) -> String {
    let mut cells = sheet.cells.clone();
    cells.sort_by_key(|(row, col, _)| (*row, *col));

    let mut rows = String::new();
    let mut current_row = None;
    for (row, col, value) in &cells {
        if current_row != Some(*row) {
            if current_row.is_some() {
                rows.push_str("</row>");
            }
            rows.push_str(&format!(r#"<row r="{row}">"#));
            current_row = Some(*row);
        }
        let reference = format!("{}{}", column_letters(*col), row);
        let cell = match value {
            CellValue::Text(s) => format!(
                r#"<c r="{reference}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                escape(s)
            ),
            CellValue::Rich(runs) => {
                let runs: String = runs
                    .iter()
                    .map(|r| format!(r#"<r><t xml:space="preserve">{}</t></r>"#, escape(r)))
                    .collect();
                format!(r#"<c r="{reference}" t="inlineStr"><is>{runs}</is></c>"#)
            }
            CellValue::Number(n) => format!(r#"<c r="{reference}"><v>{n}</v></c>"#),
        };
        rows.push_str(&cell);
    }
    if current_row.is_some() {
        rows.push_str("</row>");
    }

    let drawing = if has_drawing {
        r#"<drawing r:id="rId1"/>"#
    } else {
        ""
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheetData>{rows}</sheetData>{drawing}</worksheet>"#
    )
}

fn drawing_xml(pictures: &[PictureFixture]) -> String {
    let anchors: String = pictures
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                r#"<xdr:twoCellAnchor editAs="oneCell"><xdr:from><xdr:col>{col}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{row}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from><xdr:to><xdr:col>{to_col}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{to_row}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="{id}" name="Picture {id}"/><xdr:cNvPicPr/></xdr:nvPicPr><xdr:blipFill><a:blip r:embed="rId{rel}"/></xdr:blipFill><xdr:spPr/></xdr:pic><xdr:clientData/></xdr:twoCellAnchor>"#,
                col = p.col,
                row = p.row,
                to_col = p.col + 6,
                to_row = p.row + 12,
                id = i + 2,
                rel = i + 1,
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{anchors}</xdr:wsDr>"#
    )
}

fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap()
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// 标准测试工作簿
///
/// - "Table" 表：表头 Date/Price + 7 行数据，无图片
/// - "Charts" 表：三张图片
///   - 图片 0（image1.png，锚点 (12,1)）：Title / Period / AI 标签
///   - 图片 1（image2.jpeg，锚点 (30,4)）：两个 Title 标签，无 AI
///   - 锚点 (45,1) 的图片媒体缺失，应被忽略
/// - "Notes" 表：一张带 AI 标签的图片，复用 image1.png
pub fn sample_workbook() -> Vec<u8> {
    let mut table = SheetFixture::new("Table")
        .cell(1, 1, text("Date"))
        .cell(1, 2, text("Price"));
    for i in 0..7u32 {
        table = table
            .cell(i + 2, 1, text(&format!("2024-0{}", i + 1)))
            .cell(i + 2, 2, CellValue::Number(70.0 + f64::from(i)));
    }

    let charts = SheetFixture::new("Charts")
        .cell(10, 1, CellValue::Rich(vec!["Title: ".into(), "Brent Crude".into()]))
        .cell(11, 2, text("period: 2020-2024"))
        .cell(12, 3, text("AI: Summarize the trend"))
        .cell(27, 3, text("Title: First"))
        .cell(29, 6, text("TITLE: Natural Gas"))
        .cell(30, 4, text("Legend"))
        .picture(12, 1, "image1.png")
        .picture(30, 4, "image2.jpeg")
        .picture(45, 1, "missing.png");

    let notes = SheetFixture::new("Notes")
        .cell(1, 1, text("AI: Explain the chart"))
        .picture(2, 1, "image1.png");

    XlsxBuilder::new()
        .sheet(table)
        .sheet(charts)
        .sheet(notes)
        .media("image1.png", PNG_BYTES)
        .media("image2.jpeg", JPEG_BYTES)
        .build()
}

pub const BOUNDARY: &str = "----sheet-insight-test-boundary";

/// 构建 multipart 请求体
pub fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/vnd.openxmlformats-officedocument.spreadsheetml.sheet\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// 计数假模型：回复 `note: <prompt>`，提示词包含 `fail` 时返回错误
#[derive(Default)]
pub struct CountingModel {
    calls: AtomicUsize,
    requests: Mutex<Vec<EnrichmentRequest>>,
}

impl CountingModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<EnrichmentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for CountingModel {
    async fn complete(&self, request: &EnrichmentRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if request.prompt.contains("fail") {
            return Err(LlmError::Rejected("model refused".to_string()));
        }
        Ok(format!("  note: {}  ", request.prompt))
    }
}
