// DDS entries: filtered listing and validate-then-write mutations
//
// Every read resolves the four relations in the same JOIN query, so a
// caller never receives an entry without its status, type, category and
// subcategory attached.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use crate::error::{DdsError, Result};
use crate::filter::{EntryFilter, EntryOrder};
use crate::models::{
    is_storable_date, Category, Entry, EntryInput, FlowType, ResolvedEntry, Status, Subcategory,
};
use crate::reference::{get_category, get_status, get_subcategory, get_type};

const RESOLVED_SELECT: &str = "SELECT e.id, e.date, e.status_id, e.type_id, e.category_id,
            e.subcategory_id, e.amount, e.comment,
            s.name, t.name, c.name, c.type_id, sc.name, sc.category_id
     FROM dds_entries e
     JOIN statuses s ON s.id = e.status_id
     JOIN types t ON t.id = e.type_id
     JOIN categories c ON c.id = e.category_id
     JOIN subcategories sc ON sc.id = e.subcategory_id";

fn resolved_from_row(row: &Row) -> rusqlite::Result<ResolvedEntry> {
    let entry = Entry {
        id: row.get(0)?,
        date: row.get(1)?,
        status_id: row.get(2)?,
        type_id: row.get(3)?,
        category_id: row.get(4)?,
        subcategory_id: row.get(5)?,
        amount: row.get(6)?,
        comment: row.get(7)?,
    };

    Ok(ResolvedEntry {
        status: Status {
            id: entry.status_id,
            name: row.get(8)?,
        },
        flow_type: FlowType {
            id: entry.type_id,
            name: row.get(9)?,
        },
        category: Category {
            id: entry.category_id,
            name: row.get(10)?,
            type_id: row.get(11)?,
        },
        subcategory: Subcategory {
            id: entry.subcategory_id,
            name: row.get(12)?,
            category_id: row.get(13)?,
        },
        entry,
    })
}

// ============================================================================
// Queries
// ============================================================================

/// List entries matching every present predicate of `filter`.
pub fn list_entries(
    conn: &Connection,
    filter: &EntryFilter,
    order: EntryOrder,
) -> Result<Vec<ResolvedEntry>> {
    let (conditions, params) = filter.conditions();

    let mut query = String::from(RESOLVED_SELECT);
    if !conditions.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&conditions.join(" AND "));
    }
    query.push_str(" ORDER BY ");
    query.push_str(order.sql());

    debug!(predicates = conditions.len(), ?order, "listing entries");

    let mut stmt = conn.prepare(&query)?;
    let entries = stmt
        .query_map(params_from_iter(params.iter()), resolved_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn get_entry(conn: &Connection, id: i64) -> Result<Option<ResolvedEntry>> {
    let entry = conn
        .query_row(
            &format!("{RESOLVED_SELECT} WHERE e.id = ?1"),
            [id],
            resolved_from_row,
        )
        .optional()?;
    Ok(entry)
}

pub fn count_entries(conn: &Connection) -> Result<i64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM dds_entries", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// Mutations
// ============================================================================

/// Check an entry payload before any write.
///
/// Order of checks: references exist, amount is positive, the date fits
/// the four-digit-year text form, then the category/subcategory chain
/// matches the chosen type.
fn validate(conn: &Connection, input: &EntryInput) -> Result<()> {
    get_status(conn, input.status_id)?
        .ok_or_else(|| DdsError::reference_not_found("status", input.status_id))?;
    get_type(conn, input.type_id)?
        .ok_or_else(|| DdsError::reference_not_found("type", input.type_id))?;
    let category = get_category(conn, input.category_id)?
        .ok_or_else(|| DdsError::reference_not_found("category", input.category_id))?;
    let subcategory = get_subcategory(conn, input.subcategory_id)?
        .ok_or_else(|| DdsError::reference_not_found("subcategory", input.subcategory_id))?;

    if !(input.amount.is_finite() && input.amount > 0.0) {
        return Err(DdsError::InvalidAmount(input.amount));
    }

    if !is_storable_date(input.date) {
        return Err(DdsError::InvalidDate(format!(
            "{} is outside years 0000-9999",
            input.date
        )));
    }

    if category.type_id != input.type_id {
        return Err(DdsError::HierarchyMismatch(format!(
            "category {} belongs to type {}, not {}",
            category.id, category.type_id, input.type_id
        )));
    }
    if subcategory.category_id != input.category_id {
        return Err(DdsError::HierarchyMismatch(format!(
            "subcategory {} belongs to category {}, not {}",
            subcategory.id, subcategory.category_id, input.category_id
        )));
    }

    Ok(())
}

pub fn create_entry(conn: &Connection, input: EntryInput) -> Result<ResolvedEntry> {
    let input = input.normalized();
    if let Err(e) = validate(conn, &input) {
        warn!(error = %e, "rejected new entry");
        return Err(e);
    }

    conn.execute(
        "INSERT INTO dds_entries (
            date, status_id, type_id, category_id, subcategory_id, amount, comment
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            input.date,
            input.status_id,
            input.type_id,
            input.category_id,
            input.subcategory_id,
            input.amount,
            input.comment,
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, date = %input.date, amount = input.amount, "created entry");

    get_entry(conn, id)?.ok_or(DdsError::EntryNotFound(id))
}

/// Overwrite every field of an existing entry.
pub fn update_entry(conn: &Connection, id: i64, input: EntryInput) -> Result<ResolvedEntry> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM dds_entries WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(DdsError::EntryNotFound(id));
    }

    let input = input.normalized();
    if let Err(e) = validate(conn, &input) {
        warn!(id, error = %e, "rejected entry update");
        return Err(e);
    }

    conn.execute(
        "UPDATE dds_entries
         SET date = ?1, status_id = ?2, type_id = ?3, category_id = ?4,
             subcategory_id = ?5, amount = ?6, comment = ?7
         WHERE id = ?8",
        params![
            input.date,
            input.status_id,
            input.type_id,
            input.category_id,
            input.subcategory_id,
            input.amount,
            input.comment,
            id,
        ],
    )?;
    info!(id, "updated entry");

    get_entry(conn, id)?.ok_or(DdsError::EntryNotFound(id))
}

pub fn delete_entry(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM dds_entries WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(DdsError::EntryNotFound(id));
    }
    info!(id, "deleted entry");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::reference::{create_category, create_status, create_subcategory, create_type};
    use chrono::NaiveDate;

    /// Ids of a small reference tree:
    /// Income → Salary → Bonus, Expense → Rent → Office, statuses Paid/Planned
    struct Refs {
        paid: i64,
        planned: i64,
        income: i64,
        expense: i64,
        salary: i64,
        rent: i64,
        bonus: i64,
        office: i64,
    }

    fn seed(conn: &Connection) -> Refs {
        let paid = create_status(conn, "Paid").unwrap().id;
        let planned = create_status(conn, "Planned").unwrap().id;
        let income = create_type(conn, "Income").unwrap().id;
        let expense = create_type(conn, "Expense").unwrap().id;
        let salary = create_category(conn, "Salary", income).unwrap().id;
        let rent = create_category(conn, "Rent", expense).unwrap().id;
        let bonus = create_subcategory(conn, "Bonus", salary).unwrap().id;
        let office = create_subcategory(conn, "Office", rent).unwrap().id;
        Refs {
            paid,
            planned,
            income,
            expense,
            salary,
            rent,
            bonus,
            office,
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn income_entry(refs: &Refs, day: &str, amount: f64) -> EntryInput {
        EntryInput {
            date: date(day),
            status_id: refs.paid,
            type_id: refs.income,
            category_id: refs.salary,
            subcategory_id: refs.bonus,
            amount,
            comment: None,
        }
    }

    fn expense_entry(refs: &Refs, day: &str, amount: f64) -> EntryInput {
        EntryInput {
            date: date(day),
            status_id: refs.planned,
            type_id: refs.expense,
            category_id: refs.rent,
            subcategory_id: refs.office,
            amount,
            comment: Some("office rent".to_string()),
        }
    }

    /// One input per foreign key, each pointing that key at a missing row (id 99)
    fn unknown_reference_inputs(refs: &Refs) -> Vec<(&'static str, EntryInput)> {
        let base = || income_entry(refs, "2024-01-01", 1.0);
        vec![
            ("status", EntryInput { status_id: 99, ..base() }),
            ("type", EntryInput { type_id: 99, ..base() }),
            ("category", EntryInput { category_id: 99, ..base() }),
            ("subcategory", EntryInput { subcategory_id: 99, ..base() }),
        ]
    }

    fn ids(entries: &[ResolvedEntry]) -> Vec<i64> {
        entries.iter().map(ResolvedEntry::id).collect()
    }

    #[test]
    fn test_income_scenario() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        create_entry(&conn, income_entry(&refs, "2024-01-15", 1000.0)).unwrap();
        create_entry(&conn, expense_entry(&refs, "2024-01-20", 300.0)).unwrap();

        let entries = list_entries(
            &conn,
            &EntryFilter::new().flow_type(refs.income),
            EntryOrder::default(),
        )
        .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry.amount, 1000.0);
        assert_eq!(entries[0].flow_type.name, "Income");
        assert_eq!(entries[0].category.name, "Salary");
        assert_eq!(entries[0].subcategory.name, "Bonus");
        assert_eq!(entries[0].status.name, "Paid");
    }

    #[test]
    fn test_create_then_get_round_trip() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let input = expense_entry(&refs, "2024-03-01", 450.25);

        let created = create_entry(&conn, input.clone()).unwrap();
        let fetched = get_entry(&conn, created.id()).unwrap().unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.entry.date, input.date);
        assert_eq!(fetched.entry.status_id, input.status_id);
        assert_eq!(fetched.entry.type_id, input.type_id);
        assert_eq!(fetched.entry.category_id, input.category_id);
        assert_eq!(fetched.entry.subcategory_id, input.subcategory_id);
        assert_eq!(fetched.entry.amount, input.amount);
        assert_eq!(fetched.entry.comment, input.comment);
        assert_eq!(fetched.status, get_status(&conn, refs.planned).unwrap().unwrap());
        assert_eq!(fetched.category, get_category(&conn, refs.rent).unwrap().unwrap());
        assert_eq!(fetched.subcategory, get_subcategory(&conn, refs.office).unwrap().unwrap());
    }

    #[test]
    fn test_unknown_reference_rejected_without_write() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);

        for (expected, input) in unknown_reference_inputs(&refs) {
            match create_entry(&conn, input) {
                Err(DdsError::ReferenceNotFound { entity, id }) => {
                    assert_eq!(entity, expected);
                    assert_eq!(id, 99);
                }
                other => panic!("expected ReferenceNotFound for {expected}, got {other:?}"),
            }
        }
        assert_eq!(count_entries(&conn).unwrap(), 0);
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);

        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let result = create_entry(&conn, income_entry(&refs, "2024-01-01", amount));
            assert!(matches!(result, Err(DdsError::InvalidAmount(_))), "amount {amount}");
        }
        assert_eq!(count_entries(&conn).unwrap(), 0);

        let created = create_entry(&conn, income_entry(&refs, "2024-01-01", 10.0)).unwrap();
        let result = update_entry(&conn, created.id(), income_entry(&refs, "2024-01-01", -1.0));
        assert!(matches!(result, Err(DdsError::InvalidAmount(_))));
        assert_eq!(get_entry(&conn, created.id()).unwrap().unwrap().entry.amount, 10.0);
    }

    #[test]
    fn test_mismatched_hierarchy_rejected() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);

        // Rent is an expense category
        let wrong_category = EntryInput {
            category_id: refs.rent,
            ..income_entry(&refs, "2024-01-01", 5.0)
        };
        assert!(matches!(
            create_entry(&conn, wrong_category),
            Err(DdsError::HierarchyMismatch(_))
        ));

        // Office belongs to Rent, not Salary
        let wrong_subcategory = EntryInput {
            subcategory_id: refs.office,
            ..income_entry(&refs, "2024-01-01", 5.0)
        };
        assert!(matches!(
            create_entry(&conn, wrong_subcategory),
            Err(DdsError::HierarchyMismatch(_))
        ));
        assert_eq!(count_entries(&conn).unwrap(), 0);
    }

    #[test]
    fn test_default_order_newest_first_and_stable() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let a = create_entry(&conn, income_entry(&refs, "2024-01-10", 1.0)).unwrap().id();
        let b = create_entry(&conn, income_entry(&refs, "2024-02-10", 2.0)).unwrap().id();
        let c = create_entry(&conn, income_entry(&refs, "2024-01-10", 3.0)).unwrap().id();

        let first = list_entries(&conn, &EntryFilter::new(), EntryOrder::default()).unwrap();
        let second = list_entries(&conn, &EntryFilter::new(), EntryOrder::default()).unwrap();

        assert_eq!(ids(&first), vec![b, a, c]);
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_explicit_order_overrides_default() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let small = create_entry(&conn, income_entry(&refs, "2024-03-01", 5.0)).unwrap().id();
        let big = create_entry(&conn, income_entry(&refs, "2024-01-01", 500.0)).unwrap().id();

        let by_amount = list_entries(&conn, &EntryFilter::new(), EntryOrder::AmountDesc).unwrap();
        assert_eq!(ids(&by_amount), vec![big, small]);

        let oldest_first = list_entries(&conn, &EntryFilter::new(), EntryOrder::DateAsc).unwrap();
        assert_eq!(ids(&oldest_first), vec![big, small]);
    }

    #[test]
    fn test_date_range_inclusive_on_both_ends() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        create_entry(&conn, income_entry(&refs, "2023-12-31", 1.0)).unwrap();
        let start = create_entry(&conn, income_entry(&refs, "2024-01-01", 1.0)).unwrap().id();
        let mid = create_entry(&conn, income_entry(&refs, "2024-01-15", 1.0)).unwrap().id();
        let end = create_entry(&conn, income_entry(&refs, "2024-01-31", 1.0)).unwrap().id();
        create_entry(&conn, income_entry(&refs, "2024-02-01", 1.0)).unwrap();

        let filter = EntryFilter::new()
            .date_from(date("2024-01-01"))
            .date_to(date("2024-01-31"));
        let entries = list_entries(&conn, &filter, EntryOrder::default()).unwrap();

        assert_eq!(ids(&entries), vec![end, mid, start]);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        create_entry(&conn, income_entry(&refs, "2024-01-15", 1.0)).unwrap();

        let filter = EntryFilter::new()
            .date_from(date("2024-02-01"))
            .date_to(date("2024-01-01"));
        assert!(list_entries(&conn, &filter, EntryOrder::default()).unwrap().is_empty());
    }

    #[test]
    fn test_filters_combine_with_and() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let paid_income = create_entry(&conn, income_entry(&refs, "2024-01-15", 1.0)).unwrap().id();
        create_entry(
            &conn,
            EntryInput {
                status_id: refs.planned,
                ..income_entry(&refs, "2024-01-16", 2.0)
            },
        )
        .unwrap();
        create_entry(&conn, expense_entry(&refs, "2024-01-17", 3.0)).unwrap();

        let filter = EntryFilter::new()
            .status(refs.paid)
            .flow_type(refs.income)
            .category(refs.salary)
            .subcategory(refs.bonus);
        let entries = list_entries(&conn, &filter, EntryOrder::default()).unwrap();
        assert_eq!(ids(&entries), vec![paid_income]);

        let none = EntryFilter::new().status(refs.paid).flow_type(refs.expense);
        assert!(list_entries(&conn, &none, EntryOrder::default()).unwrap().is_empty());
    }

    #[test]
    fn test_update_overwrites_all_fields() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let created = create_entry(&conn, income_entry(&refs, "2024-01-15", 1000.0)).unwrap();

        let replacement = expense_entry(&refs, "2024-04-01", 75.5);
        let updated = update_entry(&conn, created.id(), replacement.clone()).unwrap();

        assert_eq!(updated.id(), created.id());
        assert_eq!(updated.entry.date, replacement.date);
        assert_eq!(updated.entry.type_id, refs.expense);
        assert_eq!(updated.entry.amount, 75.5);
        assert_eq!(updated.entry.comment.as_deref(), Some("office rent"));
        assert_eq!(updated.flow_type.name, "Expense");
        assert_eq!(count_entries(&conn).unwrap(), 1);
    }

    #[test]
    fn test_update_can_clear_comment() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let created = create_entry(&conn, expense_entry(&refs, "2024-01-15", 10.0)).unwrap();

        let cleared = EntryInput {
            comment: Some(String::new()),
            ..expense_entry(&refs, "2024-01-15", 10.0)
        };
        let updated = update_entry(&conn, created.id(), cleared).unwrap();
        assert_eq!(updated.entry.comment, None);
    }

    #[test]
    fn test_update_unknown_reference_rejected_without_write() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let original = create_entry(&conn, expense_entry(&refs, "2024-03-01", 42.0)).unwrap();

        for (expected, input) in unknown_reference_inputs(&refs) {
            match update_entry(&conn, original.id(), input) {
                Err(DdsError::ReferenceNotFound { entity, id }) => {
                    assert_eq!(entity, expected);
                    assert_eq!(id, 99);
                }
                other => panic!("expected ReferenceNotFound for {expected}, got {other:?}"),
            }
            assert_eq!(get_entry(&conn, original.id()).unwrap(), Some(original.clone()));
        }
    }

    #[test]
    fn test_update_mismatched_hierarchy_rejected_without_write() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let original = create_entry(&conn, income_entry(&refs, "2024-01-15", 1000.0)).unwrap();

        // Income type with the expense category Rent
        let wrong_category = EntryInput {
            category_id: refs.rent,
            subcategory_id: refs.office,
            ..income_entry(&refs, "2024-02-01", 5.0)
        };
        assert!(matches!(
            update_entry(&conn, original.id(), wrong_category),
            Err(DdsError::HierarchyMismatch(_))
        ));

        // Salary with Rent's subcategory
        let wrong_subcategory = EntryInput {
            subcategory_id: refs.office,
            ..income_entry(&refs, "2024-02-01", 5.0)
        };
        assert!(matches!(
            update_entry(&conn, original.id(), wrong_subcategory),
            Err(DdsError::HierarchyMismatch(_))
        ));

        assert_eq!(get_entry(&conn, original.id()).unwrap(), Some(original));
    }

    #[test]
    fn test_out_of_range_year_rejected() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let far_future = EntryInput {
            date: NaiveDate::from_ymd_opt(10000, 1, 1).unwrap(),
            ..income_entry(&refs, "2024-01-01", 1.0)
        };

        assert!(matches!(
            create_entry(&conn, far_future.clone()),
            Err(DdsError::InvalidDate(_))
        ));
        assert_eq!(count_entries(&conn).unwrap(), 0);

        let kept = create_entry(&conn, income_entry(&refs, "2024-01-01", 1.0)).unwrap();
        assert!(matches!(
            update_entry(&conn, kept.id(), far_future),
            Err(DdsError::InvalidDate(_))
        ));
        assert_eq!(get_entry(&conn, kept.id()).unwrap(), Some(kept));
    }

    #[test]
    fn test_update_missing_entry() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);

        let result = update_entry(&conn, 42, income_entry(&refs, "2024-01-15", 1.0));
        assert!(matches!(result, Err(DdsError::EntryNotFound(42))));
    }

    #[test]
    fn test_update_missing_entry_reported_before_bad_input() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);

        let bad = EntryInput {
            status_id: 99,
            ..income_entry(&refs, "2024-01-15", -1.0)
        };
        assert!(matches!(update_entry(&conn, 42, bad), Err(DdsError::EntryNotFound(42))));
    }

    #[test]
    fn test_delete_then_list_omits_entry() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let keep = create_entry(&conn, income_entry(&refs, "2024-01-15", 1.0)).unwrap().id();
        let gone = create_entry(&conn, income_entry(&refs, "2024-01-16", 2.0)).unwrap().id();

        delete_entry(&conn, gone).unwrap();

        let entries = list_entries(&conn, &EntryFilter::new(), EntryOrder::default()).unwrap();
        assert_eq!(ids(&entries), vec![keep]);
        assert!(get_entry(&conn, gone).unwrap().is_none());
    }

    #[test]
    fn test_repeated_delete_fails_the_same_way() {
        let conn = open_in_memory().unwrap();
        let refs = seed(&conn);
        let id = create_entry(&conn, income_entry(&refs, "2024-01-15", 1.0)).unwrap().id();
        create_entry(&conn, income_entry(&refs, "2024-01-16", 1.0)).unwrap();

        delete_entry(&conn, id).unwrap();
        assert!(matches!(delete_entry(&conn, id), Err(DdsError::EntryNotFound(_))));
        assert!(matches!(delete_entry(&conn, id), Err(DdsError::EntryNotFound(_))));
        assert_eq!(count_entries(&conn).unwrap(), 1);
    }
}
