//! Storage error type.

/// Semantic error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    /// Page or revision does not exist.
    NotFound,
    /// Resource already exists (for create operations).
    AlreadyExists,
    /// Page name that does not survive normalization.
    InvalidName,
    /// Backend is temporarily unavailable.
    Unavailable,
    /// Other/unknown error category.
    Other,
}

/// Storage error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct StorageError {
    /// Semantic error category.
    pub kind: StorageErrorKind,
    /// Page the operation was about.
    pub page: Option<String>,
    /// Backend identifier (e.g., "Memory").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            page: None,
            backend: None,
            source: None,
        }
    }

    /// Attach page context.
    #[must_use]
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Downcast the source error to a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref()?.downcast_ref()
    }

    #[must_use]
    pub fn not_found(page: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_page(page)
    }

    #[must_use]
    pub fn invalid_name(page: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::InvalidName).with_page(page)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StorageErrorKind::NotFound
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message (page: Foo/Bar)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            StorageErrorKind::NotFound => "Not found",
            StorageErrorKind::AlreadyExists => "Already exists",
            StorageErrorKind::InvalidName => "Invalid page name",
            StorageErrorKind::Unavailable => "Unavailable",
            StorageErrorKind::Other => "Error",
        };
        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        if let Some(page) = &self.page {
            write!(f, " (page: {page})")?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_with_context() {
        let error = StorageError::not_found("Wiki/Start").with_backend("Memory");
        assert_eq!(error.to_string(), "[Memory] Not found (page: Wiki/Start)");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_source_is_kept() {
        let io = std::io::Error::other("disk gone");
        let error = StorageError::new(StorageErrorKind::Unavailable).with_source(io);
        assert_eq!(error.to_string(), "Unavailable: disk gone");
        assert!(error.downcast_source::<std::io::Error>().is_some());
    }
}
