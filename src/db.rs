use std::collections::HashSet;

use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::cohort::DEFAULT_IDEAL_BMI;
use crate::models::{
    IdealBmiEntry, SportRecord, StudentProfile, StudentRecord, SubCategory, TeacherProfile,
};
use crate::validation::{self, sanitize_input};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const SPORTS: [(&str, &str, &str); 9] = [
    ("Futsal", "Futsal", "futsal"),
    ("Basquete", "Basquete", "basquete"),
    ("Voleibol", "Voleibol", "voleibol"),
    ("Handebol", "Handebol", "handebol"),
    ("Judo", "Judô", "judo"),
    ("Karate", "Karatê", "karate"),
    ("Gr", "Ginástica Rítmica", "gr"),
    ("Danca", "Dança", "danca"),
    ("Natacao", "Natação", "natacao"),
];

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    for (name, alter_name, route) in SPORTS {
        sqlx::query(
            r#"
            INSERT INTO school_health.sports (name, alter_name, route)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET alter_name = EXCLUDED.alter_name, route = EXCLUDED.route
            "#,
        )
        .bind(name)
        .bind(alter_name)
        .bind(route)
        .execute(pool)
        .await?;
    }

    for (sub_category, bmi_value) in DEFAULT_IDEAL_BMI {
        sqlx::query(
            r#"
            INSERT INTO school_health.ideal_bmi (sub_category, bmi_value)
            VALUES ($1, $2)
            ON CONFLICT (sub_category) DO UPDATE SET bmi_value = EXCLUDED.bmi_value
            "#,
        )
        .bind(sub_category.label())
        .bind(bmi_value)
        .execute(pool)
        .await?;
    }

    let students = vec![
        ("Avery Lima", "2026-0001", "Futsal", "Sub-10", 10, 31.5, 1.38, "Manhã"),
        ("Bruno Costa", "2026-0002", "Futsal", "Sub-10", 10, 44.0, 1.36, "Manhã"),
        ("Clara Nunes", "2026-0003", "Futsal", "Sub-10", 9, 26.0, 1.33, "Tarde"),
        ("Davi Rocha", "2026-0004", "Natacao", "Sub-12", 12, 40.0, 1.50, "Tarde"),
        ("Elisa Prado", "2026-0005", "Natacao", "Sub-12", 12, 43.5, 1.52, "Tarde"),
        ("Felipe Dias", "2026-0006", "Basquete", "Sub-14", 14, 68.0, 1.62, "Noite"),
        ("Gabi Torres", "2026-0007", "Basquete", "Sub-14", 13, 47.0, 1.58, "Noite"),
        ("Heitor Melo", "2026-0008", "Judo", "Sub-8", 8, 26.5, 1.27, "Manhã"),
    ];

    for (name, registration_code, sport, sub, age, weight, height, shift) in students {
        sqlx::query(
            r#"
            INSERT INTO school_health.students
            (id, name, registration_code, age, weight, height, sport_name, sub_category, shift)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (registration_code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(registration_code)
        .bind(age)
        .bind(weight)
        .bind(height)
        .bind(sport)
        .bind(sub)
        .bind(shift)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO school_health.teachers
        (id, name, email, registration_code, sport_name, sub_category, shift)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("Carla Mendes")
    .bind("carla.mendes@sebsa.com.br")
    .bind("P-0001")
    .bind("Futsal")
    .bind("Sub-10")
    .bind("Manhã")
    .execute(pool)
    .await?;

    Ok(())
}

fn student_record_from_row(row: &PgRow) -> anyhow::Result<StudentRecord> {
    let sub_category: String = row.try_get("sub_category")?;
    let age: i32 = row.try_get("age")?;

    Ok(StudentRecord {
        sport_name: row.try_get("sport_name")?,
        sport_display_name: row.try_get("alter_name")?,
        sub_category: sub_category.parse::<SubCategory>()?,
        age: u32::try_from(age).with_context(|| format!("negative age {age}"))?,
        weight: row.try_get("weight")?,
        height: row.try_get("height")?,
    })
}

/// Rows that fail conversion or validation are logged and skipped.
fn accept_student(row: &PgRow) -> Option<StudentRecord> {
    let record = match student_record_from_row(row) {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(error = %err, "skipping unreadable student row");
            return None;
        }
    };

    match validation::validate_student(&record) {
        Ok(()) => Some(record),
        Err(err) => {
            tracing::warn!(
                error = %err,
                sport = %record.sport_name,
                sub_category = %record.sub_category,
                "skipping invalid student row"
            );
            None
        }
    }
}

const STUDENT_COLUMNS: &str = "st.id, st.name, st.registration_code, st.phone_number, st.shift, \
     st.sport_name, sp.alter_name, st.sub_category, st.age, st.weight, st.height";

pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<StudentRecord>> {
    let query = format!(
        "SELECT {STUDENT_COLUMNS} \
         FROM school_health.students st \
         JOIN school_health.sports sp ON sp.name = st.sport_name"
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .context("failed to fetch students")?;

    let students: Vec<StudentRecord> = rows.iter().filter_map(accept_student).collect();
    tracing::info!(fetched = rows.len(), accepted = students.len(), "loaded students");
    Ok(students)
}

fn search_pattern(search: &str) -> String {
    format!("%{}%", sanitize_input(search))
}

/// Placeholders are numbered in bind order: search, sport, ids.
fn student_profile_query(search: bool, sport: bool, ids: bool) -> String {
    let mut query = format!(
        "SELECT {STUDENT_COLUMNS} \
         FROM school_health.students st \
         JOIN school_health.sports sp ON sp.name = st.sport_name \
         WHERE TRUE"
    );

    let mut next_param = 1;
    if search {
        query.push_str(&format!(
            " AND (st.name ILIKE ${next_param} OR st.registration_code ILIKE ${next_param} \
             OR sp.alter_name ILIKE ${next_param})"
        ));
        next_param += 1;
    }
    if sport {
        query.push_str(&format!(" AND st.sport_name = ${next_param}"));
        next_param += 1;
    }
    if ids {
        query.push_str(&format!(" AND st.id = ANY(${next_param})"));
    }
    query.push_str(" ORDER BY st.name ASC");
    query
}

pub async fn fetch_student_profiles(
    pool: &PgPool,
    search: Option<&str>,
    sport: Option<&str>,
    ids: &[Uuid],
) -> anyhow::Result<Vec<StudentProfile>> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let query = student_profile_query(search.is_some(), sport.is_some(), !ids.is_empty());

    let mut rows = sqlx::query(&query);
    if let Some(value) = search {
        rows = rows.bind(search_pattern(value));
    }
    if let Some(value) = sport {
        rows = rows.bind(value);
    }
    if !ids.is_empty() {
        rows = rows.bind(ids);
    }

    let records = rows
        .fetch_all(pool)
        .await
        .context("failed to fetch student profiles")?;
    let mut profiles = Vec::with_capacity(records.len());

    for row in records.iter() {
        let Some(record) = accept_student(row) else {
            continue;
        };
        profiles.push(StudentProfile {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            registration_code: row.try_get("registration_code")?,
            phone_number: row.try_get("phone_number")?,
            shift: row.try_get("shift")?,
            record,
        });
    }

    Ok(profiles)
}

fn teacher_profile_query(search: bool, ids: bool) -> String {
    let mut query = String::from(
        "SELECT t.id, t.name, t.email, t.registration_code, sp.alter_name, t.sub_category, t.shift \
         FROM school_health.teachers t \
         JOIN school_health.sports sp ON sp.name = t.sport_name \
         WHERE TRUE",
    );

    let mut next_param = 1;
    if search {
        query.push_str(&format!(
            " AND (t.name ILIKE ${next_param} OR t.email ILIKE ${next_param} \
             OR t.registration_code ILIKE ${next_param} OR sp.alter_name ILIKE ${next_param})"
        ));
        next_param += 1;
    }
    if ids {
        query.push_str(&format!(" AND t.id = ANY(${next_param})"));
    }
    query.push_str(" ORDER BY t.name ASC");
    query
}

pub async fn fetch_teacher_profiles(
    pool: &PgPool,
    search: Option<&str>,
    ids: &[Uuid],
) -> anyhow::Result<Vec<TeacherProfile>> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let query = teacher_profile_query(search.is_some(), !ids.is_empty());

    let mut rows = sqlx::query(&query);
    if let Some(value) = search {
        rows = rows.bind(search_pattern(value));
    }
    if !ids.is_empty() {
        rows = rows.bind(ids);
    }

    let records = rows
        .fetch_all(pool)
        .await
        .context("failed to fetch teachers")?;
    let mut teachers = Vec::with_capacity(records.len());

    for row in records {
        let sub_category: String = row.try_get("sub_category")?;
        let sub_category = match sub_category.parse::<SubCategory>() {
            Ok(sub) => sub,
            Err(err) => {
                tracing::warn!(error = %err, "skipping teacher row");
                continue;
            }
        };
        teachers.push(TeacherProfile {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            registration_code: row.try_get("registration_code")?,
            sport_display_name: row.try_get("alter_name")?,
            sub_category,
            shift: row.try_get("shift")?,
        });
    }

    Ok(teachers)
}

fn sport_from_row(row: &PgRow) -> anyhow::Result<SportRecord> {
    Ok(SportRecord {
        name: row.try_get("name")?,
        route: row.try_get("route")?,
        alter_name: row.try_get("alter_name")?,
    })
}

pub async fn fetch_sports(pool: &PgPool) -> anyhow::Result<Vec<SportRecord>> {
    let rows = sqlx::query(
        "SELECT name, route, alter_name FROM school_health.sports ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch sports")?;

    rows.iter().map(sport_from_row).collect()
}

pub async fn fetch_sport_by_route(
    pool: &PgPool,
    route: &str,
) -> anyhow::Result<Option<SportRecord>> {
    let row = sqlx::query(
        "SELECT name, route, alter_name FROM school_health.sports WHERE route = $1",
    )
    .bind(route)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(sport_from_row).transpose()
}

pub async fn fetch_ideal_bmi(pool: &PgPool) -> anyhow::Result<Vec<IdealBmiEntry>> {
    let rows = sqlx::query("SELECT sub_category, bmi_value FROM school_health.ideal_bmi")
        .fetch_all(pool)
        .await
        .context("failed to fetch ideal BMI table")?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let label: String = row.try_get("sub_category")?;
        match label.parse::<SubCategory>() {
            Ok(sub_category) => entries.push(IdealBmiEntry {
                sub_category,
                bmi_value: row.try_get("bmi_value")?,
            }),
            Err(err) => tracing::warn!(error = %err, "ignoring ideal BMI row"),
        }
    }

    Ok(entries)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub rejected: usize,
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    name: String,
    registration_code: String,
    phone_number: Option<String>,
    age: u32,
    weight: f64,
    height: f64,
    sport_name: String,
    sub_category: String,
    shift: String,
}

/// A CSV row that passed validation and is ready to be written.
#[derive(Debug, Clone, PartialEq)]
struct ImportRow {
    line: usize,
    name: String,
    registration_code: String,
    phone_number: Option<String>,
    shift: String,
    record: StudentRecord,
}

/// Parses and validates every row. Rows that fail to deserialise or validate are logged
/// and counted, only an I/O failure aborts.
fn read_student_rows<R: std::io::Read>(input: R) -> anyhow::Result<(Vec<ImportRow>, usize)> {
    let mut reader = csv::Reader::from_reader(input);
    let mut rows = Vec::new();
    let mut rejected = 0;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) if err.is_io_error() => {
                return Err(anyhow::Error::new(err).context("failed to read student CSV"))
            }
            Err(err) => {
                tracing::warn!(line, error = %err, "rejecting student row");
                rejected += 1;
                continue;
            }
        };

        let sub_category = match row.sub_category.parse::<SubCategory>() {
            Ok(sub) => sub,
            Err(err) => {
                tracing::warn!(line, error = %err, "rejecting student row");
                rejected += 1;
                continue;
            }
        };

        let record = StudentRecord {
            sport_name: row.sport_name.trim().to_string(),
            sport_display_name: String::new(),
            sub_category,
            age: row.age,
            weight: row.weight,
            height: row.height,
        };
        if let Err(err) = validation::validate_student(&record) {
            tracing::warn!(line, error = %err, "rejecting student row");
            rejected += 1;
            continue;
        }

        rows.push(ImportRow {
            line,
            name: sanitize_input(&row.name),
            registration_code: row.registration_code.trim().to_string(),
            phone_number: row.phone_number.filter(|p| !p.trim().is_empty()),
            shift: sanitize_input(&row.shift),
            record,
        });
    }

    Ok((rows, rejected))
}

/// Upserts students keyed by registration code. All writes share one transaction, so a
/// failed insert leaves the table as it was.
pub async fn import_students_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportOutcome> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let (rows, rejected) = read_student_rows(file)?;
    let mut outcome = ImportOutcome {
        rejected,
        ..ImportOutcome::default()
    };
    if rows.is_empty() {
        return Ok(outcome);
    }

    let known_sports: HashSet<String> = fetch_sports(pool)
        .await?
        .into_iter()
        .map(|sport| sport.name)
        .collect();

    let mut tx = pool
        .begin()
        .await
        .context("failed to start student import")?;

    for row in rows {
        if !known_sports.contains(&row.record.sport_name) {
            tracing::warn!(
                line = row.line,
                sport = %row.record.sport_name,
                "rejecting student row with unknown sport"
            );
            outcome.rejected += 1;
            continue;
        }

        let age = i32::try_from(row.record.age)?;
        let written = sqlx::query(
            r#"
            INSERT INTO school_health.students
            (id, name, registration_code, phone_number, age, weight, height, sport_name, sub_category, shift)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (registration_code) DO UPDATE
            SET name = EXCLUDED.name, phone_number = EXCLUDED.phone_number, age = EXCLUDED.age,
                weight = EXCLUDED.weight, height = EXCLUDED.height,
                sport_name = EXCLUDED.sport_name, sub_category = EXCLUDED.sub_category,
                shift = EXCLUDED.shift, updated_at = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.name)
        .bind(&row.registration_code)
        .bind(&row.phone_number)
        .bind(age)
        .bind(row.record.weight)
        .bind(row.record.height)
        .bind(&row.record.sport_name)
        .bind(row.record.sub_category.label())
        .bind(&row.shift)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to insert student on line {}", row.line))?;

        if written.try_get::<bool, _>("inserted")? {
            outcome.inserted += 1;
        } else {
            outcome.updated += 1;
        }
    }

    tx.commit()
        .await
        .context("failed to commit student import")?;
    tracing::info!(
        inserted = outcome.inserted,
        updated = outcome.updated,
        rejected = outcome.rejected,
        "student import finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use sqlx::postgres::PgPoolOptions;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "name,registration_code,phone_number,age,weight,height,sport_name,sub_category,shift\n";

    #[test]
    fn malformed_rows_are_rejected_not_fatal() {
        let data = format!(
            "{HEADER}\
             Ana  Souza,MAT-001,,12,40.5,1.45,Futsal,Sub-12,Manhã\n\
             Bruno Lima,MAT-002,,doze,38,1.40,Futsal,Sub-12,Tarde\n\
             Carla Dias,MAT-003,,10,,1.38,Basquete,Sub-10,Manhã\n\
             Davi Reis,MAT-004,,11,35,1.40,Judo,Sub-20,Tarde\n\
             Eva Melo,MAT-005,,30,60,1.60,Judo,Sub-17,Tarde\n\
             Caio Rocha, MAT-006 ,11 99999-0000,9,30,1.30, Natacao ,Sub-10,Tarde\n"
        );

        let (rows, rejected) = read_student_rows(data.as_bytes()).unwrap();
        assert_eq!(rejected, 4);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].name, "Ana Souza");
        assert_eq!(rows[0].phone_number, None);
        assert_eq!(rows[0].record.sub_category, SubCategory::Sub12);

        assert_eq!(rows[1].line, 7);
        assert_eq!(rows[1].registration_code, "MAT-006");
        assert_eq!(rows[1].record.sport_name, "Natacao");
        assert_eq!(rows[1].phone_number.as_deref(), Some("11 99999-0000"));
    }

    #[test]
    fn negative_age_is_a_rejected_row() {
        let data = format!("{HEADER}Lia,MAT-010,,-3,30,1.30,Futsal,Sub-10,Tarde\n");
        let (rows, rejected) = read_student_rows(data.as_bytes()).unwrap();
        assert!(rows.is_empty());
        assert_eq!(rejected, 1);
    }

    #[test]
    fn profile_queries_number_placeholders_in_bind_order() {
        let all = student_profile_query(true, true, true);
        assert!(all.contains("st.name ILIKE $1"));
        assert!(all.contains("st.sport_name = $2"));
        assert!(all.contains("st.id = ANY($3)"));
        assert!(all.ends_with(" ORDER BY st.name ASC"));

        let ids_only = student_profile_query(false, false, true);
        assert!(ids_only.contains("WHERE TRUE AND st.id = ANY($1)"));
        assert!(!ids_only.contains("ILIKE"));

        let plain = student_profile_query(false, false, false);
        assert!(plain.contains("WHERE TRUE ORDER BY"));

        let teachers = teacher_profile_query(true, true);
        assert!(teachers.contains("t.email ILIKE $1"));
        assert!(teachers.contains("t.id = ANY($2)"));
        assert!(teacher_profile_query(false, true).contains("WHERE TRUE AND t.id = ANY($1)"));
    }

    #[tokio::test]
    async fn import_of_only_invalid_rows_never_touches_the_database() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "{HEADER}Bruno Lima,MAT-002,,doze,38,1.40,Futsal,Sub-12,Tarde\n\
             Eva Melo,MAT-005,,30,60,1.60,Judo,Sub-17,Tarde\n"
        )
        .unwrap();

        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://school_health@localhost:1/unreachable")
            .unwrap();
        let outcome = import_students_csv(&pool, file.path()).await.unwrap();

        assert_eq!(
            outcome,
            ImportOutcome {
                inserted: 0,
                updated: 0,
                rejected: 2,
            }
        );
    }
}
