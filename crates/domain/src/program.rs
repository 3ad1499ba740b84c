//! Uploaded firmware images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::ProgramId;

/// Executable/binary formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramFormat {
    Elf,
    Bin,
    Hex,
    Uf2,
}

impl ProgramFormat {
    /// Guess the format from a file name, defaulting to raw binary.
    pub fn from_file_name(name: &str) -> Self {
        match name.rsplit('.').next() {
            Some("elf") | Some("axf") => Self::Elf,
            Some("hex") | Some("ihex") => Self::Hex,
            Some("uf2") => Self::Uf2,
            _ => Self::Bin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Elf => "elf",
            Self::Bin => "bin",
            Self::Hex => "hex",
            Self::Uf2 => "uf2",
        }
    }
}

impl std::str::FromStr for ProgramFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "elf" => Ok(Self::Elf),
            "bin" => Ok(Self::Bin),
            "hex" => Ok(Self::Hex),
            "uf2" => Ok(Self::Uf2),
            other => Err(CoreError::internal(format!(
                "unknown program format: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ProgramFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded firmware image, stored content-addressed on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub format: ProgramFormat,
    pub size_bytes: u64,
    /// SHA-256 of the stored content, hex-encoded.
    pub sha256: String,
    /// Path at which the content is stored; stable until explicit delete.
    pub path: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_guessed_from_extension() {
        assert_eq!(ProgramFormat::from_file_name("blink.elf"), ProgramFormat::Elf);
        assert_eq!(ProgramFormat::from_file_name("app.hex"), ProgramFormat::Hex);
        assert_eq!(ProgramFormat::from_file_name("fw.uf2"), ProgramFormat::Uf2);
        assert_eq!(ProgramFormat::from_file_name("image"), ProgramFormat::Bin);
    }
}
