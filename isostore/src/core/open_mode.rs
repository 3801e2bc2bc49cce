//! Stream open modes.

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;

use super::errors::PersistenceError;

/// How an output stream relates to existing file content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Position at end of file, creating it if absent
    Append,
    /// Always start from an empty file, replacing existing content
    Create,
    /// Fail if the file already exists
    CreateNew,
    /// Fail if the file does not exist
    Open,
    /// Open existing content or create an empty file
    OpenOrCreate,
    /// Require the file to exist and truncate it to zero length
    Truncate,
}

impl OpenMode {
    pub const ALL: [OpenMode; 6] = [
        OpenMode::Append,
        OpenMode::Create,
        OpenMode::CreateNew,
        OpenMode::Open,
        OpenMode::OpenOrCreate,
        OpenMode::Truncate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMode::Append => "append",
            OpenMode::Create => "create",
            OpenMode::CreateNew => "create_new",
            OpenMode::Open => "open",
            OpenMode::OpenOrCreate => "open_or_create",
            OpenMode::Truncate => "truncate",
        }
    }

    /// Whether the mode may bring a missing file into existence
    pub fn creates(&self) -> bool {
        match self {
            OpenMode::Append | OpenMode::Create | OpenMode::CreateNew | OpenMode::OpenOrCreate => {
                true
            }
            OpenMode::Open | OpenMode::Truncate => false,
        }
    }

    /// Whether existing content is discarded on open
    pub fn truncates(&self) -> bool {
        match self {
            OpenMode::Create | OpenMode::Truncate => true,
            OpenMode::Append | OpenMode::CreateNew | OpenMode::Open | OpenMode::OpenOrCreate => {
                false
            }
        }
    }

    /// Write-only host open options for this mode
    pub fn to_open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Append => options.append(true).create(true),
            OpenMode::Create => options.write(true).create(true).truncate(true),
            OpenMode::CreateNew => options.write(true).create_new(true),
            OpenMode::Open => options.write(true),
            OpenMode::OpenOrCreate => options.write(true).create(true),
            OpenMode::Truncate => options.write(true).truncate(true),
        };
        options
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for OpenMode {
    type Error = PersistenceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OpenMode::Append),
            2 => Ok(OpenMode::Create),
            3 => Ok(OpenMode::CreateNew),
            4 => Ok(OpenMode::Open),
            5 => Ok(OpenMode::OpenOrCreate),
            6 => Ok(OpenMode::Truncate),
            other => Err(PersistenceError::InvalidOpenMode {
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for OpenMode {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "append" => Ok(OpenMode::Append),
            "create" => Ok(OpenMode::Create),
            "create_new" | "createnew" => Ok(OpenMode::CreateNew),
            "open" => Ok(OpenMode::Open),
            "open_or_create" | "openorcreate" => Ok(OpenMode::OpenOrCreate),
            "truncate" => Ok(OpenMode::Truncate),
            _ => Err(PersistenceError::InvalidOpenMode {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_numeric_codes() {
        for (code, mode) in (1u8..=6).zip(OpenMode::ALL) {
            assert_eq!(OpenMode::try_from(code).unwrap(), mode);
        }

        for code in [0u8, 7, 255] {
            let err = OpenMode::try_from(code).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Append".parse::<OpenMode>().unwrap(), OpenMode::Append);
        assert_eq!("CreateNew".parse::<OpenMode>().unwrap(), OpenMode::CreateNew);
        assert_eq!(
            "open-or-create".parse::<OpenMode>().unwrap(),
            OpenMode::OpenOrCreate
        );

        for mode in OpenMode::ALL {
            assert_eq!(mode.as_str().parse::<OpenMode>().unwrap(), mode);
        }

        assert!(matches!(
            "overwrite".parse::<OpenMode>(),
            Err(PersistenceError::InvalidOpenMode { .. })
        ));
    }

    #[test]
    fn test_mode_properties() {
        assert!(OpenMode::Append.creates());
        assert!(!OpenMode::Open.creates());
        assert!(!OpenMode::Truncate.creates());
        assert!(OpenMode::Create.truncates());
        assert!(OpenMode::Truncate.truncates());
        assert!(!OpenMode::OpenOrCreate.truncates());
    }
}
