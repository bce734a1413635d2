use std::fmt;

/// An XML-RPC `<fault>` outcome.
///
/// Faults are an expected business result reported by the server, not a
/// transport or parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i64,
    pub string: String,
}

impl Fault {
    pub fn new(code: i64, string: impl Into<String>) -> Self {
        Self {
            code,
            string: string.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fault code:{} ({})", self.code, self.string)
    }
}
