//! xlsx 工作簿加载器 - 基础设施层
//!
//! 单元格交给 calamine 读取，媒体文件和图片锚点直接从 ZIP 包中解析。
//! 全部为同步 IO，调用方需放在 `spawn_blocking` 中执行。

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use bytes::Bytes;
use calamine::{Reader, Xlsx};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::WorkbookError;
use crate::infrastructure::ooxml::{self, WORKBOOK_PART};
use crate::models::{DrawingPicture, ImageFormat, MediaItem, Sheet, Workbook};

const MEDIA_PREFIX: &str = "xl/media/";
/// 媒体文件预分配上限（8 MiB）
const MEDIA_CAPACITY_HINT: u64 = 8 * 1024 * 1024;

/// 从磁盘加载工作簿
pub fn load_workbook(path: &Path) -> Result<Workbook, WorkbookError> {
    let data = std::fs::read(path).map_err(|source| WorkbookError::ReadFailed {
        path: path.display().to_string(),
        source,
    })?;
    load_workbook_from_bytes(path, &data)
}

/// 从内存中的 xlsx 数据加载工作簿
///
/// `path` 只作为文档标识保存
pub fn load_workbook_from_bytes(path: &Path, data: &[u8]) -> Result<Workbook, WorkbookError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let media = read_media(&mut archive)?;
    let sheet_parts = read_sheet_parts(&mut archive)?;

    let mut xlsx: Xlsx<_> = Xlsx::new(Cursor::new(data)).map_err(WorkbookError::Open)?;

    let mut sheets = Vec::with_capacity(sheet_parts.len());
    for (name, part) in sheet_parts {
        let cells = xlsx
            .worksheet_range(&name)
            .map_err(|source| WorkbookError::Cells {
                sheet: name.clone(),
                source,
            })?;

        // 图片解析失败不影响单元格数据
        let pictures = match read_sheet_pictures(&mut archive, &part) {
            Ok(pictures) => pictures,
            Err(e) => {
                warn!("工作表 {} 的图片解析失败，按无图片处理: {}", name, e);
                Vec::new()
            }
        };

        debug!(
            "已加载工作表 {} ({})：{} 张图片引用",
            name,
            part,
            pictures.len()
        );
        sheets.push(Sheet {
            name,
            cells,
            pictures,
        });
    }

    Ok(Workbook {
        path: path.to_path_buf(),
        sheets,
        media,
    })
}

/// 读取 `xl/media/` 下的全部媒体文件，按包内顺序编号
fn read_media<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<MediaItem>, WorkbookError> {
    let mut media = Vec::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() || !file.name().starts_with(MEDIA_PREFIX) {
            continue;
        }

        let part = file.name().to_string();
        let mut buf = Vec::with_capacity(capacity_hint(file.size()));
        file.read_to_end(&mut buf)
            .map_err(|source| WorkbookError::PartRead {
                part: part.clone(),
                source,
            })?;

        media.push(MediaItem {
            id: media.len() as u32,
            format: ImageFormat::from_part_name(&part),
            part,
            bytes: Bytes::from(buf),
        });
    }

    Ok(media)
}

/// 压缩包头部声明的大小不可信，只作为有上限的预分配提示
fn capacity_hint(declared: u64) -> usize {
    declared.min(MEDIA_CAPACITY_HINT) as usize
}

/// 工作表名称 → 工作表部件路径（只保留普通工作表，图表页忽略）
fn read_sheet_parts<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<(String, String)>, WorkbookError> {
    let workbook_xml = read_part(archive, WORKBOOK_PART)?.ok_or_else(|| WorkbookError::Xml {
        part: WORKBOOK_PART.to_string(),
        message: "缺少 workbook.xml".to_string(),
    })?;
    let entries = ooxml::parse_workbook_sheets(&workbook_xml)?;

    let rels_part = ooxml::rels_part_for(WORKBOOK_PART);
    let rels = match read_part(archive, &rels_part)? {
        Some(xml) => ooxml::parse_relationships(&rels_part, &xml)?,
        None => Vec::new(),
    };
    let targets: HashMap<&str, &ooxml::Relationship> =
        rels.iter().map(|r| (r.id.as_str(), r)).collect();

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let rel = targets.get(entry.rel_id.as_str())?;
            rel.is_worksheet()
                .then(|| (entry.name, ooxml::resolve_part(WORKBOOK_PART, &rel.target)))
        })
        .collect())
}

/// 读取某个工作表关联的所有 drawing 中的图片引用
fn read_sheet_pictures<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    sheet_part: &str,
) -> Result<Vec<DrawingPicture>, WorkbookError> {
    let sheet_rels_part = ooxml::rels_part_for(sheet_part);
    let Some(sheet_rels_xml) = read_part(archive, &sheet_rels_part)? else {
        return Ok(Vec::new());
    };

    let mut pictures = Vec::new();
    for rel in ooxml::parse_relationships(&sheet_rels_part, &sheet_rels_xml)? {
        if !rel.is_drawing() || rel.external {
            continue;
        }
        let drawing_part = ooxml::resolve_part(sheet_part, &rel.target);
        let Some(drawing_xml) = read_part(archive, &drawing_part)? else {
            debug!("drawing 部件不存在: {}", drawing_part);
            continue;
        };

        let drawing_rels_part = ooxml::rels_part_for(&drawing_part);
        let drawing_rels = match read_part(archive, &drawing_rels_part)? {
            Some(xml) => ooxml::parse_relationships(&drawing_rels_part, &xml)?,
            None => Vec::new(),
        };

        for (rel_id, anchor) in ooxml::parse_drawing(&drawing_part, &drawing_xml)? {
            match drawing_rels.iter().find(|r| r.id == rel_id && !r.external) {
                Some(image_rel) => pictures.push(DrawingPicture {
                    anchor,
                    media_part: ooxml::resolve_part(&drawing_part, &image_rel.target),
                }),
                None => debug!("图片关系 {} 在 {} 中无法解析，跳过", rel_id, drawing_part),
            }
        }
    }

    Ok(pictures)
}

/// 读取包内文本部件，不存在时返回 None
fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<Option<String>, WorkbookError> {
    let mut file = match archive.by_name(part) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|source| WorkbookError::PartRead {
            part: part.to_string(),
            source,
        })?;
    Ok(Some(content))
}
