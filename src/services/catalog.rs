use std::collections::HashSet;
use std::path::Path;

use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::StyleDefinition,
    services::providers::{ChatMessage, ChatRequest, VisionModel},
};

const GENERATION_MAX_TOKENS: u32 = 2000;

/// Immutable list of design styles, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct StyleCatalog {
    styles: Vec<StyleDefinition>,
}

impl StyleCatalog {
    /// Validates and wraps a list of styles
    ///
    /// Names must be non-empty and unique once mapped to directory names, and
    /// every style needs at least one non-blank keyword.
    pub fn new(styles: Vec<StyleDefinition>) -> AppResult<Self> {
        if styles.is_empty() {
            return Err(AppError::Config("Style catalog contains no styles".to_string()));
        }

        let mut seen = HashSet::new();
        for (index, style) in styles.iter().enumerate() {
            if style.name.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Style #{} has an empty name",
                    index + 1
                )));
            }
            if !seen.insert(style.dir_name()) {
                return Err(AppError::Config(format!(
                    "Style '{}' is declared more than once",
                    style.name
                )));
            }
            if style.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(AppError::Config(format!(
                    "Style '{}' has no search keywords",
                    style.name
                )));
            }
        }

        let styles = styles
            .into_iter()
            .map(|mut style| {
                style.name = style.name.trim().to_string();
                style.keywords = style
                    .keywords
                    .into_iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect();
                style
            })
            .collect();

        Ok(Self { styles })
    }

    /// Parses `{"styles": [...]}` or a bare array of styles
    pub fn from_json(text: &str) -> AppResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| AppError::Config(format!("Style catalog is not valid JSON: {}", e)))?;

        let styles = match value {
            Value::Object(mut map) => map.remove("styles").ok_or_else(|| {
                AppError::Config("Style catalog is missing the 'styles' list".to_string())
            })?,
            array @ Value::Array(_) => array,
            _ => {
                return Err(AppError::Config(
                    "Style catalog must be an object or an array".to_string(),
                ))
            }
        };

        let styles: Vec<StyleDefinition> = serde_json::from_value(styles)
            .map_err(|e| AppError::Config(format!("Malformed style entry: {}", e)))?;

        Self::new(styles)
    }

    /// Loads the catalog file; any problem is a configuration error
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Cannot read style catalog {}: {}. Run `abode collect --generate-styles 15` to create one.",
                path.display(),
                e
            ))
        })?;

        let catalog = Self::from_json(&text).map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;

        tracing::info!(
            path = %path.display(),
            styles = catalog.len(),
            "Style catalog loaded"
        );

        Ok(catalog)
    }

    /// Writes the catalog in the same format `load` reads
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&json!({ "styles": self.styles }))
            .map_err(|e| AppError::Internal(e.to_string()))?;
        std::fs::write(path, text)?;

        tracing::info!(path = %path.display(), styles = self.len(), "Style catalog saved");
        Ok(())
    }

    pub fn list_styles(&self) -> &[StyleDefinition] {
        &self.styles
    }

    pub fn get(&self, name: &str) -> Option<&StyleDefinition> {
        self.styles.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

fn generation_prompt(count: usize) -> String {
    format!(
        r#"Generate {count} distinct interior design styles for home decor.
For each style, provide:
1. A concise, search-friendly name (e.g., 'Scandinavian Minimalism', 'Industrial Loft')
2. A brief description (1-2 sentences)
3. 5 search keywords well suited to finding photos of this style

Your response must be a valid JSON object with the following structure:
{{
  "styles": [
    {{
      "name": "Style Name 1",
      "description": "Style description 1",
      "search_keywords": ["keyword1", "keyword2", "keyword3", "keyword4", "keyword5"]
    }}
  ]
}}

Include diverse styles from different regions, time periods, and design philosophies."#
    )
}

/// Asks the model for a fresh catalog of `count` styles
pub async fn generate_catalog(model: &dyn VisionModel, count: usize) -> AppResult<StyleCatalog> {
    tracing::info!(count, "Generating style catalog");

    let request = ChatRequest::new(
        vec![
            ChatMessage::system(
                "You are an expert interior designer with extensive knowledge of global design styles.",
            ),
            ChatMessage::user_text(generation_prompt(count)),
        ],
        GENERATION_MAX_TOKENS,
    )
    .json();

    let content = model.complete(request).await?;

    let catalog = StyleCatalog::from_json(&content).map_err(|e| {
        tracing::error!(error = %e, "Generated catalog was unusable");
        AppError::Parse(format!("Model returned an unusable style catalog: {}", e))
    })?;

    if catalog.len() != count {
        tracing::warn!(
            requested = count,
            received = catalog.len(),
            "Model returned a different number of styles"
        );
    }

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockVisionModel;

    const CATALOG: &str = r#"{
        "styles": [
            {
                "name": "Japanese Zen",
                "description": "Calm, natural materials",
                "search_keywords": ["tatami", "shoji screen", "bonsai"]
            },
            {
                "name": "Industrial Loft",
                "description": "Exposed brick and metal",
                "search_keywords": ["exposed brick", "steel beams"]
            }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let catalog = StyleCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.list_styles()[0].name, "Japanese Zen");
        assert_eq!(catalog.list_styles()[1].keywords.len(), 2);
        assert!(catalog.list_styles().iter().all(|s| !s.keywords.is_empty()));
        assert!(catalog.get("Industrial Loft").is_some());
        assert!(catalog.get("Boho").is_none());
    }

    #[test]
    fn test_bare_array_accepted() {
        let json = r#"[{"name": "Boho", "keywords": ["rattan"]}]"#;
        let catalog = StyleCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = StyleCatalog::from_json("{not json").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_missing_field_is_config_error() {
        let json = r#"{"styles": [{"description": "no name", "search_keywords": ["x"]}]}"#;
        let err = StyleCatalog::from_json(json).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_empty_keywords_rejected() {
        let json = r#"{"styles": [{"name": "Boho", "search_keywords": ["  "]}]}"#;
        assert!(StyleCatalog::from_json(json).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"[
            {"name": "Japanese Zen", "keywords": ["a"]},
            {"name": "japanese zen", "keywords": ["b"]}
        ]"#;
        let err = StyleCatalog::from_json(json).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StyleCatalog::load(&dir.path().join("styles.json")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles.json");
        std::fs::write(&path, CATALOG).unwrap();

        let first = StyleCatalog::load(&path).unwrap();
        let second = StyleCatalog::load(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("styles.json");
        let catalog = StyleCatalog::from_json(CATALOG).unwrap();

        catalog.save(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("search_keywords"));
        assert_eq!(StyleCatalog::load(&path).unwrap(), catalog);
    }

    #[tokio::test]
    async fn test_generate_catalog() {
        let mut model = MockVisionModel::new();
        model
            .expect_complete()
            .withf(|request| request.json_response && request.messages.len() == 2)
            .times(1)
            .returning(|_| Ok(CATALOG.to_string()));

        let catalog = generate_catalog(&model, 2).await.unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_catalog_unusable_response() {
        let mut model = MockVisionModel::new();
        model
            .expect_complete()
            .returning(|_| Ok(r#"{"ideas": []}"#.to_string()));

        let err = generate_catalog(&model, 15).await.unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }
}
