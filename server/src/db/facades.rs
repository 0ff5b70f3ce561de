//! Minimal facade register. Screens are managed elsewhere; the live layer only
//! needs to tell a known facade from an unknown one.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use super::models::Facade;
use super::{format_timestamp, timestamp_column};
use crate::error::StorageError;
use crate::ws::FacadeId;

fn facade_from_row(row: &Row<'_>) -> rusqlite::Result<Facade> {
    Ok(Facade {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        address: row.get(3)?,
        width_cells: row.get(4)?,
        height_cells: row.get(5)?,
        is_active: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
    })
}

pub fn insert_facade(
    conn: &Connection,
    name: &str,
    city: &str,
    address: &str,
    width_cells: i64,
    height_cells: i64,
    created_at: DateTime<Utc>,
) -> Result<Facade, StorageError> {
    conn.execute(
        "INSERT INTO facades (name, city, address, width_cells, height_cells, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        rusqlite::params![name, city, address, width_cells, height_cells, format_timestamp(created_at)],
    )?;

    Ok(Facade {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        city: city.to_string(),
        address: address.to_string(),
        width_cells,
        height_cells,
        is_active: true,
        created_at,
    })
}

pub fn get_facade(conn: &Connection, facade_id: FacadeId) -> Result<Option<Facade>, StorageError> {
    let facade = conn
        .query_row(
            "SELECT id, name, city, address, width_cells, height_cells, is_active, created_at
             FROM facades WHERE id = ?1",
            [facade_id],
            facade_from_row,
        )
        .optional()?;
    Ok(facade)
}

pub fn list_facades(conn: &Connection) -> Result<Vec<Facade>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, city, address, width_cells, height_cells, is_active, created_at
         FROM facades ORDER BY id",
    )?;
    let facades = stmt
        .query_map([], facade_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(facades)
}

pub fn facade_exists(conn: &Connection, facade_id: FacadeId) -> Result<bool, StorageError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM facades WHERE id = ?1",
        [facade_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
