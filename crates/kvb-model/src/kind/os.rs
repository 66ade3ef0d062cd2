use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};

use crate::ModelError;

/// Guest operating system family being installed.
///
/// The family decides the disk layout of the build VM:
/// - `Linux`   — auxiliary media is exposed as a labelled config drive.
/// - `Windows` — auxiliary media is exposed as a sysprep volume and the
///   VirtIO driver disk is attached ahead of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OsType {
    #[default]
    Linux,
    Windows,
}

impl OsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Linux => "linux",
            OsType::Windows => "windows",
        }
    }
}

impl FromStr for OsType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            _ => Err(ModelError::UnsupportedOsType(s.to_string())),
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OsType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OsType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_families() {
        assert_eq!("linux".parse::<OsType>().unwrap(), OsType::Linux);
        assert_eq!("windows".parse::<OsType>().unwrap(), OsType::Windows);
    }

    #[test]
    fn rejects_everything_else() {
        for bad in ["", "freebsd", "Linux", "win"] {
            let err = bad.parse::<OsType>().unwrap_err();
            assert!(matches!(err, ModelError::UnsupportedOsType(_)), "{bad:?}");
        }
    }

    #[test]
    fn default_is_linux() {
        assert_eq!(OsType::default(), OsType::Linux);
        assert_eq!(OsType::Windows.to_string(), "windows");
    }
}
