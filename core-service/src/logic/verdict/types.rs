use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{NORMAL_MESSAGE, WARNING_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Normal,
    Warning,
}

impl Status {
    pub fn message(self) -> &'static str {
        match self {
            Status::Normal => NORMAL_MESSAGE,
            Status::Warning => WARNING_MESSAGE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Normal => "Normal",
            Status::Warning => "Warning",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session-level classification of one scored series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: Status,
    pub average_score: f64,
    pub message: String,
}
