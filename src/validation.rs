use crate::models::StudentRecord;

pub const MIN_AGE: u32 = 5;
pub const MAX_AGE: u32 = 18;
pub const MAX_WEIGHT_KG: f64 = 200.0;
pub const MAX_HEIGHT_M: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("age {0} outside 5..=18")]
    Age(u32),
    #[error("weight {0} kg outside (0, 200)")]
    Weight(f64),
    #[error("height {0} m outside (0, 3)")]
    Height(f64),
    #[error("sport name is empty")]
    EmptySport,
}

pub fn is_valid_age(age: u32) -> bool {
    (MIN_AGE..=MAX_AGE).contains(&age)
}

pub fn is_valid_weight(weight: f64) -> bool {
    weight > 0.0 && weight < MAX_WEIGHT_KG
}

pub fn is_valid_height(height: f64) -> bool {
    height > 0.0 && height < MAX_HEIGHT_M
}

/// Rejects rows the pipeline cannot classify safely, notably zero height.
pub fn validate_student(record: &StudentRecord) -> Result<(), ValidationError> {
    if record.sport_name.trim().is_empty() {
        return Err(ValidationError::EmptySport);
    }
    if !is_valid_age(record.age) {
        return Err(ValidationError::Age(record.age));
    }
    if !is_valid_weight(record.weight) {
        return Err(ValidationError::Weight(record.weight));
    }
    if !is_valid_height(record.height) {
        return Err(ValidationError::Height(record.height));
    }
    Ok(())
}

/// Collapses runs of whitespace and trims, as free-text inputs are stored.
pub fn sanitize_input(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubCategory;

    fn record(age: u32, weight: f64, height: f64) -> StudentRecord {
        StudentRecord {
            sport_name: "Handebol".to_string(),
            sport_display_name: "Handebol".to_string(),
            sub_category: SubCategory::Sub14,
            age,
            weight,
            height,
        }
    }

    #[test]
    fn accepts_plausible_rows() {
        assert_eq!(validate_student(&record(14, 52.0, 1.62)), Ok(()));
        assert_eq!(validate_student(&record(5, 18.0, 1.05)), Ok(()));
        assert_eq!(validate_student(&record(18, 70.0, 1.80)), Ok(()));
    }

    #[test]
    fn rejects_zero_height() {
        assert_eq!(
            validate_student(&record(12, 40.0, 0.0)),
            Err(ValidationError::Height(0.0))
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(validate_student(&record(4, 20.0, 1.1)), Err(ValidationError::Age(4)));
        assert_eq!(validate_student(&record(19, 60.0, 1.7)), Err(ValidationError::Age(19)));
        assert_eq!(
            validate_student(&record(12, 0.0, 1.4)),
            Err(ValidationError::Weight(0.0))
        );
        assert_eq!(
            validate_student(&record(12, 40.0, 3.0)),
            Err(ValidationError::Height(3.0))
        );
    }

    #[test]
    fn rejects_blank_sport() {
        let mut row = record(12, 40.0, 1.4);
        row.sport_name = "  ".to_string();
        assert_eq!(validate_student(&row), Err(ValidationError::EmptySport));
    }

    #[test]
    fn sanitizes_whitespace() {
        assert_eq!(sanitize_input("  Ana   Clara \t Souza "), "Ana Clara Souza");
    }
}
