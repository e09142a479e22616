//! Row types for the field tables and their conversions to domain records.

use sqlx::types::Json;
use sqlx::FromRow;

use landbook_core::color::Argb;
use landbook_core::model::{Land, Note, Point, Ring, Work, Zone};
use landbook_core::types::{DbId, Timestamp};

/// Colors are stored as their `0xAARRGGBB` value.
pub(crate) fn color_column(color: Argb) -> i64 {
    i64::from(color.0)
}

fn color_from_column(value: i64) -> Argb {
    Argb(value as u32)
}

/// A row from the `lands` table.
#[derive(Debug, Clone, FromRow)]
pub struct LandRow {
    pub id: DbId,
    pub title: String,
    pub color: i64,
    pub border: Json<Ring>,
    pub holes: Json<Vec<Ring>>,
}

impl From<LandRow> for Land {
    fn from(row: LandRow) -> Self {
        Land::new(
            row.id,
            row.title,
            color_from_column(row.color),
            row.border.0,
            row.holes.0,
        )
    }
}

/// A row from the `zones` table.
#[derive(Debug, Clone, FromRow)]
pub struct ZoneRow {
    pub id: DbId,
    pub lid: DbId,
    pub title: String,
    pub color: i64,
    pub border: Json<Ring>,
    pub holes: Json<Vec<Ring>>,
}

impl From<ZoneRow> for Zone {
    fn from(row: ZoneRow) -> Self {
        Zone::new(
            row.id,
            row.lid,
            row.title,
            color_from_column(row.color),
            row.border.0,
            row.holes.0,
        )
    }
}

/// A row from the `notes` table.
#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub id: DbId,
    pub lid: DbId,
    pub title: String,
    pub description: String,
    pub color: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub created_at: Timestamp,
    pub edited_at: Timestamp,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            lid: row.lid,
            title: row.title,
            description: row.description,
            color: color_from_column(row.color),
            center: Point::new(row.latitude, row.longitude),
            radius: row.radius,
            created_at: row.created_at,
            edited_at: row.edited_at,
        }
    }
}

/// A row from the `works` table. `scheduled_on` is derived on write and
/// not read back.
#[derive(Debug, Clone, FromRow)]
pub struct WorkRow {
    pub id: DbId,
    pub lid: Option<DbId>,
    pub zid: Option<DbId>,
    pub title: String,
    pub description: String,
    pub scheduled_at: Timestamp,
    pub created_at: Timestamp,
    pub edited_at: Timestamp,
}

impl From<WorkRow> for Work {
    fn from(row: WorkRow) -> Self {
        Work {
            id: row.id,
            lid: row.lid,
            zid: row.zid,
            title: row.title,
            description: row.description,
            scheduled_at: row.scheduled_at,
            created_at: row.created_at,
            edited_at: row.edited_at,
        }
    }
}
