//! Airspace store operations: bulk insert, lookup, search, statistics.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use skycheck_core::models::{Airspace, AirspaceType, Vertex};
use skycheck_core::units::AltitudeLimit;

use crate::error::Result;

/// One extracted airspace with its boundary, ready for insertion.
#[derive(Debug, Clone)]
pub struct AirspaceRecord {
    pub airspace: Airspace,
    pub borders: Vec<BorderRecord>,
}

#[derive(Debug, Clone)]
pub struct BorderRecord {
    pub ordinal: i64,
    pub vertices: Vec<Vertex>,
}

/// Store-level counts reported by `stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub total_airspaces: usize,
    pub with_geometry: usize,
    pub geometry_coverage_pct: f64,
    pub by_type: Vec<(String, usize)>,
}

/// Insert extracted records in one transaction. A record whose `code_id`
/// already exists replaces the earlier one, geometry included.
pub async fn bulk_insert(pool: &SqlitePool, records: &[AirspaceRecord]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for record in records {
        let airspace = &record.airspace;
        let (min_ft, min_unit) = altitude_columns(airspace.min_altitude);
        let (max_ft, max_unit) = altitude_columns(airspace.max_altitude);
        let class: Option<String> = airspace.airspace_class.map(String::from);

        // Replace-by-code: drop the earlier record's geometry first.
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM airspaces WHERE code_id = ?1")
                .bind(&airspace.code_id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some((old_id,)) = existing {
            sqlx::query(
                "DELETE FROM vertices WHERE border_id IN (SELECT id FROM borders WHERE airspace_id = ?1)",
            )
            .bind(old_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM borders WHERE airspace_id = ?1")
                .bind(old_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO airspaces (
                code_id, code_type, name, airspace_class,
                min_altitude_ft, max_altitude_ft, min_altitude_unit, max_altitude_unit,
                operating_hours, remarks, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, CURRENT_TIMESTAMP)
            ON CONFLICT(code_id) DO UPDATE SET
                code_type = ?2, name = ?3, airspace_class = ?4,
                min_altitude_ft = ?5, max_altitude_ft = ?6,
                min_altitude_unit = ?7, max_altitude_unit = ?8,
                operating_hours = ?9, remarks = ?10,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&airspace.code_id)
        .bind(airspace.code_type.as_str())
        .bind(&airspace.name)
        .bind(&class)
        .bind(min_ft)
        .bind(max_ft)
        .bind(min_unit)
        .bind(max_unit)
        .bind(&airspace.operating_hours)
        .bind(&airspace.remarks)
        .execute(&mut *tx)
        .await?;

        let (airspace_id,): (i64,) =
            sqlx::query_as("SELECT id FROM airspaces WHERE code_id = ?1")
                .bind(&airspace.code_id)
                .fetch_one(&mut *tx)
                .await?;

        for border in &record.borders {
            let border_id = sqlx::query("INSERT INTO borders (airspace_id, ordinal) VALUES (?1, ?2)")
                .bind(airspace_id)
                .bind(border.ordinal)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();

            for vertex in &border.vertices {
                sqlx::query(
                    "INSERT INTO vertices (border_id, ordinal, lat, lon) VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(border_id)
                .bind(vertex.ordinal)
                .bind(vertex.lat)
                .bind(vertex.lon)
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    tx.commit().await?;
    info!("Inserted {} airspace record(s)", records.len());
    Ok(())
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Airspace>> {
    let row = sqlx::query_as::<_, AirspaceRow>(&format!(
        "{SELECT_AIRSPACE} WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Airspace::from))
}

pub async fn get_by_code(pool: &SqlitePool, code_id: &str) -> Result<Option<Airspace>> {
    let row = sqlx::query_as::<_, AirspaceRow>(&format!(
        "{SELECT_AIRSPACE} WHERE code_id = ?1"
    ))
    .bind(code_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Airspace::from))
}

/// Substring search on name or code, ordered by `(code_type, code_id)`.
pub async fn search_by_keyword(
    pool: &SqlitePool,
    keyword: &str,
    case_sensitive: bool,
    limit: u32,
) -> Result<Vec<Airspace>> {
    let rows = if case_sensitive {
        sqlx::query_as::<_, AirspaceRow>(&format!(
            "{SELECT_AIRSPACE} WHERE instr(name, ?1) > 0 OR instr(code_id, ?1) > 0 \
             ORDER BY code_type, code_id LIMIT ?2"
        ))
        .bind(keyword)
        .bind(limit)
        .fetch_all(pool)
        .await?
    } else {
        let pattern = format!("%{}%", keyword);
        sqlx::query_as::<_, AirspaceRow>(&format!(
            "{SELECT_AIRSPACE} WHERE name LIKE ?1 OR code_id LIKE ?1 \
             ORDER BY code_type, code_id LIMIT ?2"
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?
    };
    Ok(rows.into_iter().map(Airspace::from).collect())
}

/// All airspaces that have at least one border with vertices, in id order.
/// This feeds the spatial index build.
pub async fn iter_all_with_geometry(pool: &SqlitePool) -> Result<Vec<Airspace>> {
    let rows = sqlx::query_as::<_, AirspaceRow>(
        r#"
        SELECT DISTINCT a.id, a.code_id, a.code_type, a.name, a.airspace_class,
               a.min_altitude_ft, a.max_altitude_ft, a.min_altitude_unit, a.max_altitude_unit,
               a.operating_hours, a.remarks
        FROM airspaces a
        JOIN borders b ON a.id = b.airspace_id
        JOIN vertices v ON b.id = v.border_id
        ORDER BY a.id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Airspace::from).collect())
}

/// Boundary of one airspace: borders by ordinal, vertices by ordinal.
pub async fn load_geometry(pool: &SqlitePool, airspace_id: i64) -> Result<Vec<BorderRecord>> {
    let border_rows: Vec<(i64, i64)> =
        sqlx::query_as("SELECT id, ordinal FROM borders WHERE airspace_id = ?1 ORDER BY ordinal, id")
            .bind(airspace_id)
            .fetch_all(pool)
            .await?;

    let mut borders = Vec::with_capacity(border_rows.len());
    for (border_id, ordinal) in border_rows {
        let vertex_rows: Vec<(i64, f64, f64)> = sqlx::query_as(
            "SELECT ordinal, lat, lon FROM vertices WHERE border_id = ?1 ORDER BY ordinal, id",
        )
        .bind(border_id)
        .fetch_all(pool)
        .await?;

        borders.push(BorderRecord {
            ordinal,
            vertices: vertex_rows
                .into_iter()
                .map(|(ordinal, lat, lon)| Vertex { ordinal, lat, lon })
                .collect(),
        });
    }
    Ok(borders)
}

pub async fn get_statistics(pool: &SqlitePool) -> Result<StoreStatistics> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM airspaces")
        .fetch_one(pool)
        .await?;
    let (with_geometry,): (i64,) = sqlx::query_as(
        "SELECT COUNT(DISTINCT a.id) FROM airspaces a \
         JOIN borders b ON a.id = b.airspace_id \
         JOIN vertices v ON b.id = v.border_id",
    )
    .fetch_one(pool)
    .await?;
    let by_type: Vec<(String, i64)> = sqlx::query_as(
        "SELECT code_type, COUNT(*) FROM airspaces GROUP BY code_type ORDER BY code_type",
    )
    .fetch_all(pool)
    .await?;

    let coverage = if total > 0 {
        with_geometry as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    Ok(StoreStatistics {
        total_airspaces: total as usize,
        with_geometry: with_geometry as usize,
        geometry_coverage_pct: coverage,
        by_type: by_type
            .into_iter()
            .map(|(t, c)| (t, c as usize))
            .collect(),
    })
}

const SELECT_AIRSPACE: &str = "SELECT id, code_id, code_type, name, airspace_class, \
     min_altitude_ft, max_altitude_ft, min_altitude_unit, max_altitude_unit, \
     operating_hours, remarks FROM airspaces";

fn altitude_columns(limit: Option<AltitudeLimit>) -> (Option<f64>, Option<&'static str>) {
    match limit {
        None => (None, None),
        Some(limit) => {
            let feet = limit.to_feet();
            let stored = if feet.is_finite() { Some(feet) } else { None };
            (stored, Some(limit.unit_str()))
        }
    }
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct AirspaceRow {
    id: i64,
    code_id: String,
    code_type: String,
    name: String,
    airspace_class: Option<String>,
    min_altitude_ft: Option<f64>,
    max_altitude_ft: Option<f64>,
    min_altitude_unit: Option<String>,
    max_altitude_unit: Option<String>,
    operating_hours: Option<String>,
    remarks: Option<String>,
}

impl From<AirspaceRow> for Airspace {
    fn from(row: AirspaceRow) -> Self {
        let min_altitude = row
            .min_altitude_unit
            .as_deref()
            .and_then(|unit| AltitudeLimit::from_feet_and_unit(row.min_altitude_ft, unit));
        let max_altitude = row
            .max_altitude_unit
            .as_deref()
            .and_then(|unit| AltitudeLimit::from_feet_and_unit(row.max_altitude_ft, unit));

        Airspace {
            id: row.id,
            code_id: row.code_id,
            code_type: AirspaceType::from_code(&row.code_type),
            airspace_class: row.airspace_class.and_then(|c| c.chars().next()),
            name: row.name,
            min_altitude,
            max_altitude,
            operating_hours: row.operating_hours,
            remarks: row.remarks,
        }
    }
}
