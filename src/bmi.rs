use crate::models::BmiClassification;

/// Weight in kilograms over height in meters squared.
///
/// Height must be positive; zero height yields infinity and is rejected upstream
/// by `validation::validate_student`.
pub fn body_mass_index(weight: f64, height: f64) -> f64 {
    weight / (height * height)
}

/// Classifies a BMI value. Minors (under 18) use a simplified pediatric scale, adults the
/// standard 18.5 / 25 / 30 cut-offs. A value on a threshold falls into the higher bracket.
pub fn classify(bmi: f64, age: u32) -> BmiClassification {
    let (underweight, healthy, overweight) = if age < 18 {
        (14.0, 23.0, 27.0)
    } else {
        (18.5, 25.0, 30.0)
    };

    if bmi < underweight {
        BmiClassification::Underweight
    } else if bmi < healthy {
        BmiClassification::Healthy
    } else if bmi < overweight {
        BmiClassification::Overweight
    } else {
        BmiClassification::Obese
    }
}

pub fn is_out_of_range(bmi: f64, age: u32) -> bool {
    classify(bmi, age) != BmiClassification::Healthy
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl BmiClassification {
    pub fn label(&self) -> &'static str {
        match self {
            BmiClassification::Underweight => "Abaixo do peso",
            BmiClassification::Healthy => "Normal",
            BmiClassification::Overweight => "Sobrepeso",
            BmiClassification::Obese => "Obesidade",
        }
    }
}

impl std::fmt::Display for BmiClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
