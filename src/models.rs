//! Wire DTOs for the Are.na v2 API and the domain types the coordinator
//! hands to the rendering layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image dimensions assumed while the real ones are unknown
pub const DEFAULT_IMAGE_WIDTH: u32 = 800;
pub const DEFAULT_IMAGE_HEIGHT: u32 = 600;
/// Caption credit for blocks whose submitter is missing
pub const ANONYMOUS_SUBMITTER: &str = "anonymous";

// --- Upstream DTOs ---

/// `GET {base}/channels/{slug}` response, reduced to the fields we read.
/// The upstream reports the collection size both as `length` and
/// `contents_count`; `length` is authoritative here.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfoDto {
    pub title: Option<String>,
    pub length: Option<i64>,
    pub contents_count: Option<i64>,
    pub updated_at: Option<String>,
}

/// `GET {base}/channels/{slug}/contents?...` response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelContentsDto {
    pub contents: Option<Vec<BlockDto>>,
    pub total_pages: Option<u32>,
    pub current_page: Option<u32>,
    pub length: Option<i64>,
    pub per: Option<u32>,
}

/// One block of the channel
#[derive(Debug, Clone, Deserialize)]
pub struct BlockDto {
    pub id: u64,
    pub image: Option<BlockImageDto>,
    pub user: Option<BlockUserDto>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockImageDto {
    pub display: Option<ImageVariantDto>,
    pub original: Option<ImageVariantDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageVariantDto {
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockUserDto {
    pub username: Option<String>,
}

// --- Domain types ---

/// Summary of the remote collection
#[derive(Debug, Clone, Serialize)]
pub struct ChannelMetadata {
    pub title: String,
    pub total_item_count: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ChannelMetadata {
    /// Count resolution: `length`, then `contents_count`, then the
    /// configured fallback when both are missing or non-positive.
    pub fn from_dto(dto: ChannelInfoDto, fallback_count: u64, fallback_title: &str) -> Self {
        let reported = dto
            .length
            .filter(|n| *n > 0)
            .or_else(|| dto.contents_count.filter(|n| *n > 0));
        ChannelMetadata {
            title: dto
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| fallback_title.to_string()),
            total_item_count: reported.map(|n| n as u64).unwrap_or(fallback_count),
            updated_at: dto.updated_at.as_deref().and_then(parse_timestamp),
        }
    }
}

/// A single displayable entry. `layout_offset_pct` is assigned once per
/// fetched batch and kept for the item's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    pub id: u64,
    pub image_url: Option<String>,
    pub image_width: u32,
    pub image_height: u32,
    pub submitter_name: String,
    pub updated_at: Option<DateTime<Utc>>,
    /// Caption-ready date, e.g. "march 5, 2025"
    pub display_date: Option<String>,
    pub layout_offset_pct: u8,
    pub source_page: u32,
}

impl ContentItem {
    pub fn from_block(block: BlockDto, source_page: u32) -> Self {
        let display = block.image.as_ref().and_then(|i| i.display.as_ref());
        let original = block.image.as_ref().and_then(|i| i.original.as_ref());
        let image_url = display
            .and_then(|v| v.url.clone())
            .or_else(|| original.and_then(|v| v.url.clone()));
        let updated_at = block.updated_at.as_deref().and_then(parse_timestamp);
        ContentItem {
            id: block.id,
            image_url,
            image_width: display.and_then(|v| v.width).unwrap_or(DEFAULT_IMAGE_WIDTH),
            image_height: display.and_then(|v| v.height).unwrap_or(DEFAULT_IMAGE_HEIGHT),
            submitter_name: block
                .user
                .and_then(|u| u.username)
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| ANONYMOUS_SUBMITTER.to_string()),
            display_date: updated_at.as_ref().map(crate::utils::format_display_date),
            updated_at,
            layout_offset_pct: 0,
            source_page,
        }
    }
}

/// One fetched page of the channel. `total_pages`/`total_item_count` stay
/// `None` when the upstream omitted them; the coordinator then keeps the
/// values it already knows.
#[derive(Debug, Clone)]
pub struct ContentPage {
    pub items: Vec<ContentItem>,
    pub page_number: u32,
    pub total_pages: Option<u32>,
    pub total_item_count: Option<u64>,
}

impl ContentPage {
    pub fn from_dto(dto: ChannelContentsDto, requested_page: u32, page_size: u32) -> Self {
        let page_number = dto.current_page.filter(|p| *p >= 1).unwrap_or(requested_page);
        let total_item_count = dto.length.filter(|n| *n > 0).map(|n| n as u64);
        let total_pages = dto
            .total_pages
            .filter(|t| *t >= 1)
            .or_else(|| total_item_count.map(|count| derive_total_pages(count, page_size)));
        let items = dto
            .contents
            .unwrap_or_default()
            .into_iter()
            .map(|block| ContentItem::from_block(block, page_number))
            .collect();
        ContentPage {
            items,
            page_number,
            total_pages,
            total_item_count,
        }
    }
}

/// `ceil(count / page_size)`, never below 1
pub fn derive_total_pages(total_item_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    let pages = total_item_count.div_ceil(page_size as u64);
    (pages.max(1)).min(u32::MAX as u64) as u32
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
