// Reference data: statuses, types, categories, subcategories
//
// Reads are plain ordered lookups. Writes only ever insert; reference rows
// are never updated or deleted.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

use crate::error::{is_constraint_violation, DdsError, Result};
use crate::models::{Category, FlowType, RefCatalog, Status, Subcategory};

fn status_from_row(row: &Row) -> rusqlite::Result<Status> {
    Ok(Status {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn type_from_row(row: &Row) -> rusqlite::Result<FlowType> {
    Ok(FlowType {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        type_id: row.get(2)?,
    })
}

fn subcategory_from_row(row: &Row) -> rusqlite::Result<Subcategory> {
    Ok(Subcategory {
        id: row.get(0)?,
        name: row.get(1)?,
        category_id: row.get(2)?,
    })
}

// ============================================================================
// Queries
// ============================================================================

pub fn list_statuses(conn: &Connection) -> Result<Vec<Status>> {
    let mut stmt = conn.prepare("SELECT id, name FROM statuses ORDER BY name, id")?;
    let statuses = stmt
        .query_map([], status_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(statuses)
}

pub fn list_types(conn: &Connection) -> Result<Vec<FlowType>> {
    let mut stmt = conn.prepare("SELECT id, name FROM types ORDER BY name, id")?;
    let types = stmt
        .query_map([], type_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(types)
}

/// Categories of one type. An unknown type simply has no categories.
pub fn list_categories(conn: &Connection, type_id: i64) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, type_id FROM categories
         WHERE type_id = ?1
         ORDER BY name, id",
    )?;
    let categories = stmt
        .query_map([type_id], category_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// Subcategories of one category. An unknown category simply has none.
pub fn list_subcategories(conn: &Connection, category_id: i64) -> Result<Vec<Subcategory>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category_id FROM subcategories
         WHERE category_id = ?1
         ORDER BY name, id",
    )?;
    let subcategories = stmt
        .query_map([category_id], subcategory_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(subcategories)
}

/// Every category, grouped by type name
pub fn list_all_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.type_id
         FROM categories c
         JOIN types t ON t.id = c.type_id
         ORDER BY t.name, c.name, c.id",
    )?;
    let categories = stmt
        .query_map([], category_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// Every subcategory, grouped by type name then category name
pub fn list_all_subcategories(conn: &Connection) -> Result<Vec<Subcategory>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.category_id
         FROM subcategories s
         JOIN categories c ON c.id = s.category_id
         JOIN types t ON t.id = c.type_id
         ORDER BY t.name, c.name, c.id, s.name, s.id",
    )?;
    let subcategories = stmt
        .query_map([], subcategory_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(subcategories)
}

pub fn reference_catalog(conn: &Connection) -> Result<RefCatalog> {
    Ok(RefCatalog {
        statuses: list_statuses(conn)?,
        types: list_types(conn)?,
        categories: list_all_categories(conn)?,
        subcategories: list_all_subcategories(conn)?,
    })
}

pub fn get_status(conn: &Connection, id: i64) -> Result<Option<Status>> {
    let status = conn
        .query_row("SELECT id, name FROM statuses WHERE id = ?1", [id], status_from_row)
        .optional()?;
    Ok(status)
}

pub fn get_type(conn: &Connection, id: i64) -> Result<Option<FlowType>> {
    let flow_type = conn
        .query_row("SELECT id, name FROM types WHERE id = ?1", [id], type_from_row)
        .optional()?;
    Ok(flow_type)
}

pub fn get_category(conn: &Connection, id: i64) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, name, type_id FROM categories WHERE id = ?1",
            [id],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

pub fn get_subcategory(conn: &Connection, id: i64) -> Result<Option<Subcategory>> {
    let subcategory = conn
        .query_row(
            "SELECT id, name, category_id FROM subcategories WHERE id = ?1",
            [id],
            subcategory_from_row,
        )
        .optional()?;
    Ok(subcategory)
}

// ============================================================================
// Mutations
// ============================================================================

fn clean_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DdsError::InvalidName);
    }
    Ok(name)
}

/// Insert into a `(id, name UNIQUE)` table, reporting duplicates as `DuplicateName`.
fn insert_unique_name(
    conn: &Connection,
    table: &'static str,
    entity: &'static str,
    name: &str,
) -> Result<i64> {
    let exists: bool = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE name = ?1)"),
        [name],
        |row| row.get(0),
    )?;
    if exists {
        warn!(entity, name, "rejected duplicate name");
        return Err(DdsError::duplicate_name(entity, name));
    }

    match conn.execute(&format!("INSERT INTO {table} (name) VALUES (?1)"), [name]) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_constraint_violation(&e) => Err(DdsError::duplicate_name(entity, name)),
        Err(e) => Err(e.into()),
    }
}

pub fn create_status(conn: &Connection, name: &str) -> Result<Status> {
    let name = clean_name(name)?;
    let id = insert_unique_name(conn, "statuses", "status", name)?;
    info!(id, name, "created status");
    Ok(Status {
        id,
        name: name.to_string(),
    })
}

pub fn create_type(conn: &Connection, name: &str) -> Result<FlowType> {
    let name = clean_name(name)?;
    let id = insert_unique_name(conn, "types", "type", name)?;
    info!(id, name, "created type");
    Ok(FlowType {
        id,
        name: name.to_string(),
    })
}

/// Category names are not unique; the same name may exist under several types.
pub fn create_category(conn: &Connection, name: &str, type_id: i64) -> Result<Category> {
    let name = clean_name(name)?;
    if get_type(conn, type_id)?.is_none() {
        warn!(type_id, "rejected category for unknown type");
        return Err(DdsError::reference_not_found("type", type_id));
    }

    conn.execute(
        "INSERT INTO categories (name, type_id) VALUES (?1, ?2)",
        params![name, type_id],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, name, type_id, "created category");

    Ok(Category {
        id,
        name: name.to_string(),
        type_id,
    })
}

pub fn create_subcategory(conn: &Connection, name: &str, category_id: i64) -> Result<Subcategory> {
    let name = clean_name(name)?;
    if get_category(conn, category_id)?.is_none() {
        warn!(category_id, "rejected subcategory for unknown category");
        return Err(DdsError::reference_not_found("category", category_id));
    }

    conn.execute(
        "INSERT INTO subcategories (name, category_id) VALUES (?1, ?2)",
        params![name, category_id],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, name, category_id, "created subcategory");

    Ok(Subcategory {
        id,
        name: name.to_string(),
        category_id,
    })
}
