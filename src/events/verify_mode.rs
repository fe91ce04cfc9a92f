//! Verification modes reported in `currentVerifyMode`.
//!
//! Devices add modes with firmware updates, so unknown values are kept
//! verbatim in [`VerifyMode::Other`] instead of failing the whole event.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VerifyMode {
    Card,
    CardAndPw,
    CardOrPw,
    CardOrFace,
    CardOrFaceOrPw,
    CardOrFaceOrFp,
    CardOrFpOrPw,
    Face,
    FaceAndPw,
    FaceAndCard,
    FaceAndFp,
    FaceOrPw,
    FaceOrFpOrCardOrPw,
    Fp,
    FpAndPw,
    FpOrCard,
    FpAndCard,
    FpOrPw,
    FpOrFace,
    EmployeeNoAndPw,
    EmployeeNoAndFp,
    EmployeeNoAndFace,
    Invalid,
    Other(String),
}

const KNOWN_MODES: [(&str, VerifyMode); 23] = [
    ("card", VerifyMode::Card),
    ("cardAndPw", VerifyMode::CardAndPw),
    ("cardOrPw", VerifyMode::CardOrPw),
    ("cardOrFace", VerifyMode::CardOrFace),
    ("cardOrfaceOrPw", VerifyMode::CardOrFaceOrPw),
    ("cardOrFaceOrFp", VerifyMode::CardOrFaceOrFp),
    ("cardOrFpOrPw", VerifyMode::CardOrFpOrPw),
    ("face", VerifyMode::Face),
    ("faceAndPw", VerifyMode::FaceAndPw),
    ("faceAndCard", VerifyMode::FaceAndCard),
    ("faceAndFp", VerifyMode::FaceAndFp),
    ("faceOrPw", VerifyMode::FaceOrPw),
    ("faceOrFpOrCardOrPw", VerifyMode::FaceOrFpOrCardOrPw),
    ("fp", VerifyMode::Fp),
    ("fpAndPw", VerifyMode::FpAndPw),
    ("fpOrCard", VerifyMode::FpOrCard),
    ("fpAndCard", VerifyMode::FpAndCard),
    ("fpOrPw", VerifyMode::FpOrPw),
    ("fpOrface", VerifyMode::FpOrFace),
    ("employeeNoAndPw", VerifyMode::EmployeeNoAndPw),
    ("employeeNoAndFp", VerifyMode::EmployeeNoAndFp),
    ("employeeNoAndFace", VerifyMode::EmployeeNoAndFace),
    ("invalid", VerifyMode::Invalid),
];

impl VerifyMode {
    /// Device spelling of the mode
    pub fn as_str(&self) -> &str {
        if let Self::Other(raw) = self {
            return raw;
        }
        KNOWN_MODES
            .iter()
            .find(|(_, mode)| mode == self)
            .map(|(name, _)| *name)
            .unwrap_or("invalid")
    }

    pub fn involves_face(&self) -> bool {
        self.as_str().to_ascii_lowercase().contains("face")
    }
}

impl FromStr for VerifyMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(KNOWN_MODES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, mode)| mode.clone())
            .unwrap_or_else(|| VerifyMode::Other(s.to_string())))
    }
}

impl From<String> for VerifyMode {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(mode) => mode,
            Err(never) => match never {},
        }
    }
}

impl From<VerifyMode> for String {
    fn from(mode: VerifyMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
