use serde::{Deserialize, Serialize};

use crate::error::GradeError;

pub const LETTER_SCALE_SETTING: &str = "grading.letterScale";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterBand {
    pub letter: String,
    pub min_percent: f64,
}

/// Percentage -> letter table used when a course grade is finalized.
///
/// Bands are checked top-down; a percentage lands in the first band whose
/// `min_percent` it reaches (ties go to the band that starts there), and
/// below the last band it gets `floor_letter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterScale {
    pub bands: Vec<LetterBand>,
    pub floor_letter: String,
}

impl Default for LetterScale {
    fn default() -> Self {
        let bands = [
            ("A+", 97.0),
            ("A", 93.0),
            ("A-", 90.0),
            ("B+", 87.0),
            ("B", 83.0),
            ("B-", 80.0),
            ("C+", 77.0),
            ("C", 73.0),
            ("C-", 70.0),
            ("D+", 67.0),
            ("D", 63.0),
            ("D-", 60.0),
        ]
        .into_iter()
        .map(|(letter, min_percent)| LetterBand {
            letter: letter.to_string(),
            min_percent,
        })
        .collect();
        Self {
            bands,
            floor_letter: "F".to_string(),
        }
    }
}

impl LetterScale {
    pub fn validate(&self) -> Result<(), GradeError> {
        if self.bands.is_empty() {
            return Err(GradeError::InvalidScale("at least one band is required".into()));
        }
        if self.floor_letter.trim().is_empty() {
            return Err(GradeError::InvalidScale("floorLetter must not be empty".into()));
        }
        let mut prev: Option<f64> = None;
        for (i, band) in self.bands.iter().enumerate() {
            if band.letter.trim().is_empty() {
                return Err(GradeError::InvalidScale(format!(
                    "bands[{}].letter must not be empty",
                    i
                )));
            }
            if !band.min_percent.is_finite() {
                return Err(GradeError::InvalidScale(format!(
                    "bands[{}].minPercent must be a finite number",
                    i
                )));
            }
            if let Some(p) = prev {
                if band.min_percent >= p {
                    return Err(GradeError::InvalidScale(format!(
                        "bands[{}].minPercent must be below {}",
                        i, p
                    )));
                }
            }
            prev = Some(band.min_percent);
        }
        Ok(())
    }

    pub fn letter_for(&self, percent: f64) -> &str {
        self.bands
            .iter()
            .find(|b| percent >= b.min_percent)
            .map(|b| b.letter.as_str())
            .unwrap_or(self.floor_letter.as_str())
    }
}

/// 4.0-scale grade points for a letter grade.
///
/// Input is trimmed and case-insensitive. Unrecognized letters, empty input
/// and `D-` all map to 0.0, same as `F`; there is no failure path.
pub fn grade_points(letter: Option<&str>) -> f64 {
    let Some(letter) = letter else {
        return 0.0;
    };
    match letter.trim().to_ascii_uppercase().as_str() {
        "A+" | "A" => 4.0,
        "A-" => 3.7,
        "B+" => 3.3,
        "B" => 3.0,
        "B-" => 2.7,
        "C+" => 2.3,
        "C" => 2.0,
        "C-" => 1.7,
        "D+" => 1.3,
        "D" => 1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scale_boundaries_go_to_lower_bound() {
        let s = LetterScale::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.letter_for(100.0), "A+");
        assert_eq!(s.letter_for(97.0), "A+");
        assert_eq!(s.letter_for(96.99), "A");
        assert_eq!(s.letter_for(93.0), "A");
        assert_eq!(s.letter_for(90.0), "A-");
        assert_eq!(s.letter_for(89.9), "B+");
        assert_eq!(s.letter_for(80.0), "B-");
        assert_eq!(s.letter_for(73.0), "C");
        assert_eq!(s.letter_for(60.0), "D-");
        assert_eq!(s.letter_for(59.99), "F");
        assert_eq!(s.letter_for(0.0), "F");
    }

    #[test]
    fn extra_credit_stays_in_top_band() {
        assert_eq!(LetterScale::default().letter_for(112.5), "A+");
    }

    #[test]
    fn validate_rejects_non_descending_bands() {
        let scale = LetterScale {
            bands: vec![
                LetterBand {
                    letter: "P".into(),
                    min_percent: 50.0,
                },
                LetterBand {
                    letter: "H".into(),
                    min_percent: 80.0,
                },
            ],
            floor_letter: "F".into(),
        };
        let e = scale.validate().unwrap_err();
        assert_eq!(e.code(), "invalid_scale");
    }

    #[test]
    fn validate_rejects_blank_letters() {
        let mut scale = LetterScale::default();
        scale.floor_letter = "  ".into();
        assert!(scale.validate().is_err());

        let mut scale = LetterScale::default();
        scale.bands[3].letter = String::new();
        assert!(scale.validate().is_err());

        let empty = LetterScale {
            bands: vec![],
            floor_letter: "F".into(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn grade_points_table() {
        assert_eq!(grade_points(Some("A+")), 4.0);
        assert_eq!(grade_points(Some("A")), 4.0);
        assert_eq!(grade_points(Some("A-")), 3.7);
        assert_eq!(grade_points(Some("B+")), 3.3);
        assert_eq!(grade_points(Some("B")), 3.0);
        assert_eq!(grade_points(Some("B-")), 2.7);
        assert_eq!(grade_points(Some("C+")), 2.3);
        assert_eq!(grade_points(Some("C")), 2.0);
        assert_eq!(grade_points(Some("C-")), 1.7);
        assert_eq!(grade_points(Some("D+")), 1.3);
        assert_eq!(grade_points(Some("D")), 1.0);
        assert_eq!(grade_points(Some("F")), 0.0);
    }

    #[test]
    fn grade_points_degrades_silently() {
        assert_eq!(grade_points(Some(" b+ ")), 3.3);
        assert_eq!(grade_points(Some("D-")), 0.0);
        assert_eq!(grade_points(Some("")), 0.0);
        assert_eq!(grade_points(Some("Z")), 0.0);
        assert_eq!(grade_points(None), 0.0);
    }
}
