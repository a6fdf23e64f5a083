use crate::handlers::{CHandler, CppHandler, JavaHandler, PythonHandler};
use crate::LanguageHandler;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Unsupported language tag: {0}")]
pub struct UnsupportedLanguage(pub String);

/// Language tag → handler. Built once at startup and read-only afterwards,
/// so concurrent resolution needs no synchronization. Unknown tags fail;
/// there is never a default handler to fall through to.
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn LanguageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Arc<dyn LanguageHandler>> = HashMap::new();
        for handler in [
            Arc::new(CHandler) as Arc<dyn LanguageHandler>,
            Arc::new(JavaHandler),
            Arc::new(PythonHandler),
        ] {
            handlers.insert(handler.tag(), handler);
        }

        // "c++" is accepted as a spelled-out alias for the canonical tag.
        let cpp: Arc<dyn LanguageHandler> = Arc::new(CppHandler);
        handlers.insert("c++", Arc::clone(&cpp));
        handlers.insert(cpp.tag(), cpp);

        HandlerRegistry { handlers }
    }

    pub fn resolve(&self, tag: &str) -> Result<Arc<dyn LanguageHandler>, UnsupportedLanguage> {
        self.handlers
            .get(tag)
            .cloned()
            .ok_or_else(|| UnsupportedLanguage(tag.to_string()))
    }

    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_tags() {
        let registry = HandlerRegistry::new();
        for tag in ["c", "cpp", "java", "py"] {
            let handler = registry.resolve(tag).unwrap();
            assert_eq!(handler.tag(), tag);
        }
    }

    #[test]
    fn spelled_out_cpp_tag_is_an_alias() {
        let registry = HandlerRegistry::new();
        let handler = registry.resolve("c++").unwrap();
        assert_eq!(handler.tag(), "cpp");
        assert_eq!(handler.extension(), "cpp");
    }

    #[test]
    fn unknown_tag_is_an_error_not_a_fallback() {
        let registry = HandlerRegistry::new();
        let err = registry.resolve("rb").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported language tag: rb");
    }

    #[test]
    fn tags_are_stable() {
        let registry = HandlerRegistry::new();
        assert_eq!(registry.tags(), vec!["c", "c++", "cpp", "java", "py"]);
    }
}
