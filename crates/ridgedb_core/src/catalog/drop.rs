use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropObject {
    Table,
    Sequence,
}

impl fmt::Display for DropObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Sequence => write!(f, "sequence"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropInfo {
    pub schema: String,
    pub name: String,
    pub object: DropObject,
    pub if_exists: bool,
}
