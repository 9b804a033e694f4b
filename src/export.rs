use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::bmi::body_mass_index;
use crate::models::{AlertItem, StudentProfile, TeacherProfile};

/// Byte order mark so spreadsheet tools detect UTF-8.
pub const UTF8_BOM: &str = "\u{feff}";

pub const ALERT_HEADER: [&str; 10] = [
    "Severidade",
    "Esporte",
    "Subcategoria",
    "% Fora",
    "IMC Médio",
    "IMC Ideal",
    "Gap IMC",
    "Taxa Normal",
    "Total Estudantes",
    "Recomendação",
];

pub const STUDENT_HEADER: [&str; 11] = [
    "ID",
    "Nome",
    "Matrícula",
    "Telefone",
    "Idade",
    "Esporte",
    "Subcategoria",
    "Turno",
    "Peso",
    "Altura",
    "IMC",
];

pub const TEACHER_HEADER: [&str; 7] = [
    "ID",
    "Nome",
    "E-mail",
    "Matrícula",
    "Esporte",
    "Subcategoria",
    "Turno",
];

/// Every field is quoted with inner quotes doubled; rows are joined by `\n`
/// without a trailing newline.
fn write_table<I>(header: &[&str], rows: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.as_bytes().to_vec());

    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv buffer: {}", err.error()))?;
    let mut output = String::from_utf8(bytes).context("csv output is not valid UTF-8")?;
    if output.ends_with('\n') {
        output.pop();
    }
    Ok(output)
}

pub fn alerts_to_csv(alerts: &[AlertItem]) -> anyhow::Result<String> {
    write_table(
        &ALERT_HEADER,
        alerts.iter().map(|alert| {
            vec![
                alert.severity.label().to_string(),
                alert.sport_display_name.clone(),
                alert.sub_category.label().to_string(),
                format!("{:.1}%", alert.out_of_range_rate),
                format!("{:.2}", alert.avg_bmi),
                format!("{:.2}", alert.ideal_bmi),
                format!("{:.2}", alert.bmi_gap),
                format!("{:.1}%", alert.normal_rate),
                alert.students_count.to_string(),
                alert.recommendation.clone(),
            ]
        }),
    )
}

pub fn students_to_csv(students: &[StudentProfile]) -> anyhow::Result<String> {
    write_table(
        &STUDENT_HEADER,
        students.iter().map(|student| {
            let record = &student.record;
            vec![
                student.id.to_string(),
                student.name.clone(),
                student.registration_code.clone(),
                student.phone_number.clone().unwrap_or_default(),
                record.age.to_string(),
                record.sport_display_name.clone(),
                record.sub_category.label().to_string(),
                student.shift.clone(),
                format!("{:.1}", record.weight),
                format!("{:.2}", record.height),
                format!("{:.2}", body_mass_index(record.weight, record.height)),
            ]
        }),
    )
}

pub fn teachers_to_csv(teachers: &[TeacherProfile]) -> anyhow::Result<String> {
    write_table(
        &TEACHER_HEADER,
        teachers.iter().map(|teacher| {
            vec![
                teacher.id.to_string(),
                teacher.name.clone(),
                teacher.email.clone(),
                teacher.registration_code.clone(),
                teacher.sport_display_name.clone(),
                teacher.sub_category.label().to_string(),
                teacher.shift.clone(),
            ]
        }),
    )
}

/// `<prefix>-YYYY-MM-DDTHH-MM-SS.csv`, colons replaced so the name is portable.
pub fn export_filename(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}-{}.csv", at.format("%Y-%m-%dT%H-%M-%S"))
}
