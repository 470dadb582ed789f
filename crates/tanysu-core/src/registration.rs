//! Onboarding input: a photo captioned with nickname, gender and age, then a
//! shared location.

use crate::profile::Gender;

pub const INSTRUCTIONS: &str = "To register, send a photo of yourself with this caption:\n\n\
@nickname\nMale or Female\n25\n\nThen share your location.";

const FORMAT_HINT: &str = "Expected format:\n@nickname\nMale or Female\n25";

pub const MAX_AGE: u32 = 120;

/// Same bound Telegram puts on usernames.
pub const MAX_NICKNAME_LEN: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationForm {
    pub nickname: String,
    pub gender: Gender,
    pub age: u32,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Wrong format: the caption must have exactly three lines.")]
    LineCount,

    #[error("Wrong format: the nickname is empty.")]
    EmptyNickname,

    #[error("Wrong format: the nickname must be at most 32 characters, got {0}.")]
    NicknameTooLong(usize),

    #[error("Wrong format: the second line must be Male or Female (Еркек or Әйел), got {0:?}.")]
    Gender(String),

    #[error("Wrong format: the age must be a number between 1 and 120, got {0:?}.")]
    Age(String),
}

impl RegistrationError {
    /// Reply for the participant: what went wrong plus the expected format.
    pub fn notice(&self) -> String {
        format!("{self}\n{FORMAT_HINT}")
    }
}

/// Parse a registration caption. Blank lines and surrounding spaces are ignored.
pub fn parse_caption(caption: &str) -> Result<RegistrationForm, RegistrationError> {
    let lines: Vec<&str> = caption
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let [nickname, gender, age] = lines.as_slice() else {
        return Err(RegistrationError::LineCount);
    };

    let nickname = nickname.trim_start_matches('@').trim();
    if nickname.is_empty() {
        return Err(RegistrationError::EmptyNickname);
    }
    let len = nickname.chars().count();
    if len > MAX_NICKNAME_LEN {
        return Err(RegistrationError::NicknameTooLong(len));
    }

    let gender = gender
        .parse::<Gender>()
        .map_err(|_| RegistrationError::Gender(gender.to_string()))?;

    let age = age
        .parse::<u32>()
        .ok()
        .filter(|a| (1..=MAX_AGE).contains(a))
        .ok_or_else(|| RegistrationError::Age(age.to_string()))?;

    Ok(RegistrationForm {
        nickname: nickname.to_string(),
        gender,
        age,
    })
}

/// `lat,lon` with five decimals, as stored on the profile.
pub fn format_geo(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.5},{longitude:.5}")
}

pub fn summary(form: &RegistrationForm) -> String {
    format!(
        "Nickname: @{}\nGender: {}\nAge: {}\nTo change your details, send the photo again.",
        form.nickname, form.gender, form.age
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_caption() {
        let form = parse_caption("@aruzhan\r\nӘйел\r\n23").unwrap();
        assert_eq!(
            form,
            RegistrationForm {
                nickname: "aruzhan".to_string(),
                gender: Gender::Female,
                age: 23,
            }
        );
    }

    #[test]
    fn tolerates_blank_lines_and_spaces() {
        let form = parse_caption("\n  @arman \n\nMale\n 31 \n").unwrap();
        assert_eq!(form.nickname, "arman");
        assert_eq!(form.age, 31);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse_caption("@a\nMale"), Err(RegistrationError::LineCount));
        assert_eq!(parse_caption("@\nMale\n20"), Err(RegistrationError::EmptyNickname));
        assert!(matches!(
            parse_caption("@a\nrobot\n20"),
            Err(RegistrationError::Gender(_))
        ));
        assert!(matches!(
            parse_caption("@a\nMale\ntwenty"),
            Err(RegistrationError::Age(_))
        ));
        assert!(matches!(
            parse_caption("@a\nMale\n0"),
            Err(RegistrationError::Age(_))
        ));
        assert!(matches!(
            parse_caption("@a\nMale\n121"),
            Err(RegistrationError::Age(_))
        ));
    }

    #[test]
    fn nickname_is_capped() {
        let at_cap = format!("@{}\nMale\n20", "ә".repeat(MAX_NICKNAME_LEN));
        assert_eq!(
            parse_caption(&at_cap).unwrap().nickname.chars().count(),
            MAX_NICKNAME_LEN
        );

        let over = format!("@{}\nMale\n20", "n".repeat(2000));
        let err = parse_caption(&over).unwrap_err();
        assert_eq!(err, RegistrationError::NicknameTooLong(2000));
        assert!(err.notice().contains("at most 32"));
    }

    #[test]
    fn geo_has_five_decimals() {
        assert_eq!(format_geo(43.2389498, 76.8897), "43.23895,76.88970");
    }
}
