//! OOXML 部件解析
//!
//! calamine 只负责单元格；图片锚点需要自己从包结构里解析：
//! - `xl/workbook.xml` + `xl/_rels/workbook.xml.rels`：工作表名称 → 工作表部件
//! - `xl/worksheets/_rels/sheetN.xml.rels`：工作表 → drawing 部件
//! - `xl/drawings/drawingN.xml`：`<xdr:pic>` 的锚点和 `r:embed` 关系 ID
//! - `xl/drawings/_rels/drawingN.xml.rels`：关系 ID → `xl/media/*`

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::WorkbookError;
use crate::models::{Anchor, CellPos};

pub const WORKBOOK_PART: &str = "xl/workbook.xml";

const REL_TYPE_WORKSHEET: &str = "/worksheet";
const REL_TYPE_DRAWING: &str = "/drawing";

/// `.rels` 中的一条关系
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub fn is_worksheet(&self) -> bool {
        self.rel_type.ends_with(REL_TYPE_WORKSHEET)
    }

    pub fn is_drawing(&self) -> bool {
        self.rel_type.ends_with(REL_TYPE_DRAWING)
    }
}

/// `xl/workbook.xml` 中的工作表声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub rel_id: String,
}

/// 计算某个部件对应的 `.rels` 路径
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// 将关系中的 Target 解析为包内绝对路径
///
/// `/xl/media/a.png` 是包根路径；其他形式相对于 `base_part` 所在目录
pub fn resolve_part(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_part.split('/').collect();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// 解析 `.rels` 部件
pub fn parse_relationships(part: &str, xml: &str) -> Result<Vec<Relationship>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut relationships = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() != b"Relationship" {
                    continue;
                }
                let (Some(id), Some(target)) = (
                    attr_value(&reader, &e, b"Id"),
                    attr_value(&reader, &e, b"Target"),
                ) else {
                    continue;
                };
                relationships.push(Relationship {
                    id,
                    target,
                    rel_type: attr_value(&reader, &e, b"Type").unwrap_or_default(),
                    external: attr_value(&reader, &e, b"TargetMode").as_deref()
                        == Some("External"),
                });
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(part, err)),
            _ => {}
        }
    }

    Ok(relationships)
}

/// 解析 `xl/workbook.xml` 中的 `<sheet>` 列表（保持工作簿顺序）
pub fn parse_workbook_sheets(xml: &str) -> Result<Vec<SheetEntry>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut sheets = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() != b"sheet" {
                    continue;
                }
                // r:id 的本地名是 "id"，sheetId 不会误匹配
                if let (Some(name), Some(rel_id)) = (
                    attr_value(&reader, &e, b"name"),
                    attr_value(&reader, &e, b"id"),
                ) {
                    sheets.push(SheetEntry { name, rel_id });
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(WORKBOOK_PART, err)),
            _ => {}
        }
    }

    Ok(sheets)
}

#[derive(Debug, Clone, Copy)]
enum Marker {
    From,
    To,
}

#[derive(Debug, Clone, Copy)]
enum Coord {
    Col,
    Row,
}

/// 解析 drawing 部件，返回 (关系 ID, 锚点) 列表，按出现顺序
///
/// 支持 `twoCellAnchor` 和 `oneCellAnchor`；`absoluteAnchor` 没有单元格锚点，忽略。
/// 组合形状中的多张图片共享同一个锚点。
pub fn parse_drawing(part: &str, xml: &str) -> Result<Vec<(String, Anchor)>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut pictures = Vec::new();

    let mut in_anchor = false;
    let mut in_pic = false;
    let mut marker: Option<Marker> = None;
    let mut coord: Option<Coord> = None;
    let (mut col, mut row) = (0u32, 0u32);
    let mut from: Option<CellPos> = None;
    let mut to: Option<CellPos> = None;
    let mut embeds: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"twoCellAnchor" | b"oneCellAnchor" | b"absoluteAnchor" => {
                    in_anchor = true;
                    from = None;
                    to = None;
                    embeds.clear();
                }
                b"from" if in_anchor => {
                    marker = Some(Marker::From);
                    (col, row) = (0, 0);
                }
                b"to" if in_anchor => {
                    marker = Some(Marker::To);
                    (col, row) = (0, 0);
                }
                b"col" if marker.is_some() => coord = Some(Coord::Col),
                b"row" if marker.is_some() => coord = Some(Coord::Row),
                b"pic" if in_anchor => in_pic = true,
                b"blip" if in_pic => embeds.extend(attr_value(&reader, &e, b"embed")),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_pic && e.local_name().as_ref() == b"blip" {
                    embeds.extend(attr_value(&reader, &e, b"embed"));
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(current) = coord {
                    let text = text.unescape().map_err(|err| xml_error(part, err))?;
                    let value = text.trim().parse::<u32>().unwrap_or(0);
                    match current {
                        Coord::Col => col = value,
                        Coord::Row => row = value,
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"col" | b"row" => coord = None,
                b"from" if in_anchor => {
                    from = Some(CellPos::new(row, col));
                    marker = None;
                }
                b"to" if in_anchor => {
                    to = Some(CellPos::new(row, col));
                    marker = None;
                }
                b"pic" => in_pic = false,
                b"twoCellAnchor" | b"oneCellAnchor" | b"absoluteAnchor" => {
                    if let Some(top_left) = from {
                        for rel_id in embeds.drain(..) {
                            pictures.push((
                                rel_id,
                                Anchor {
                                    top_left,
                                    bottom_right: to,
                                },
                            ));
                        }
                    }
                    embeds.clear();
                    in_anchor = false;
                    in_pic = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(part, err)),
            _ => {}
        }
    }

    Ok(pictures)
}

/// 按本地名（忽略命名空间前缀）读取属性值
///
/// 通过 reader 解码，calamine 会为 quick-xml 打开 `encoding` 特性
fn attr_value<B>(
    reader: &Reader<B>,
    element: &BytesStart<'_>,
    local_name: &[u8],
) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local_name)
        .and_then(|attr| {
            attr.decode_and_unescape_value(reader)
                .ok()
                .map(|v| v.into_owned())
        })
}

fn xml_error(part: &str, err: impl std::fmt::Display) -> WorkbookError {
    WorkbookError::Xml {
        part: part.to_string(),
        message: err.to_string(),
    }
}
