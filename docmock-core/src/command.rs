//! Database commands as accepted by `command`.

use bson::{Bson, Document};

/// A database command, given either as a bare command name or as a command document.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Name(String),
    Document(Document),
}

impl Command {
    /// The command name: the bare string, or the first key of the command document.
    pub fn name(&self) -> Option<&str> {
        match self {
            Command::Name(name) => Some(name),
            Command::Document(document) => document.keys().next().map(String::as_str),
        }
    }

    /// Case-insensitive comparison of the command name.
    pub fn is(&self, name: &str) -> bool {
        self.name()
            .is_some_and(|own| own.eq_ignore_ascii_case(name))
    }

    /// The command argument: the value of the first key, or `1` for a bare name.
    pub fn argument(&self) -> Bson {
        match self {
            Command::Name(_) => Bson::Int32(1),
            Command::Document(document) => document
                .iter()
                .next()
                .map(|(_, value)| value.clone())
                .unwrap_or(Bson::Int32(1)),
        }
    }

    /// The command as a document (`{ name: 1 }` for a bare name).
    pub fn to_document(&self) -> Document {
        match self {
            Command::Name(name) => {
                let mut document = Document::new();
                document.insert(name.clone(), 1);
                document
            }
            Command::Document(document) => document.clone(),
        }
    }
}

impl From<&str> for Command {
    fn from(name: &str) -> Self {
        Command::Name(name.to_string())
    }
}

impl From<String> for Command {
    fn from(name: String) -> Self {
        Command::Name(name)
    }
}

impl From<Document> for Command {
    fn from(document: Document) -> Self {
        Command::Document(document)
    }
}
