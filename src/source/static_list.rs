use crate::core::Identifier;
use crate::error::AppError;
use crate::source::IdentifierSource;

/// Views listed inline in the config file
pub(crate) struct StaticIdentifiers {
    identifiers: Vec<Identifier>,
}

impl StaticIdentifiers {
    pub(crate) fn new(identifiers: Vec<Identifier>) -> Self {
        Self { identifiers }
    }
}

impl IdentifierSource for StaticIdentifiers {
    fn name(&self) -> &'static str {
        "config"
    }

    fn fetch(&self) -> Result<Vec<Identifier>, AppError> {
        Ok(self.identifiers.clone())
    }
}
