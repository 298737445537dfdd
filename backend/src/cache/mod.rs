//! Rule template registry - named rule lists kept on disk
//!
//! A template is applied only when a caller names it. Column matching is
//! offered as a suggestion (`template match`) and never changes a run on
//! its own.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::models::ValidationRule;

/// Directory where templates are stored (relative to current dir)
const DEFAULT_REGISTRY_DIR: &str = ".rowcheck/rules";

/// Minimum share of a template's fields an upload must carry to be suggested.
const MIN_COVERAGE: f64 = 0.5;

/// A stored rule template with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTemplate {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Rules appended after the header-derived ones
    pub rules: Vec<ValidationRule>,
    /// Fields the rules refer to
    pub csv_columns: Vec<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last time the template was applied
    pub last_used: Option<String>,
    /// Number of runs the template was applied to
    #[serde(default)]
    pub use_count: u32,
}

/// A template suggested for a header list.
#[derive(Debug, Clone)]
pub struct TemplateMatch<'a> {
    pub template: &'a RuleTemplate,
    /// Share of the template's fields present in the headers (0.0 to 1.0)
    pub coverage: f64,
}

/// Registry for managing rule templates
pub struct RuleTemplateRegistry {
    registry_dir: PathBuf,
    templates: BTreeMap<String, RuleTemplate>,
}

impl RuleTemplateRegistry {
    /// Open the registry in the default directory
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Open the registry in a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            templates: BTreeMap::new(),
        };
        registry.load_all();
        registry
    }

    /// Read every `*.json` template. Unreadable files are skipped.
    fn load_all(&mut self) {
        let Ok(entries) = fs::read_dir(&self.registry_dir) else {
            return;
        };

        for path in entries.flatten().map(|e| e.path()) {
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match read_template(&path) {
                Ok(template) => {
                    self.templates.insert(template.id.clone(), template);
                }
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Skipping unreadable rule template",
                ),
            }
        }
        debug!(count = self.templates.len(), "Rule templates loaded");
    }

    /// All templates, sorted by name then id
    pub fn list(&self) -> Vec<&RuleTemplate> {
        let mut all: Vec<_> = self.templates.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn get(&self, id: &str) -> Option<&RuleTemplate> {
        self.templates.get(id)
    }

    /// Rules of the named template, or none when no template is named.
    pub fn rules_for(&self, id: Option<&str>) -> RegistryResult<Vec<ValidationRule>> {
        match id {
            None => Ok(Vec::new()),
            Some(id) => self
                .get(id)
                .map(|t| t.rules.clone())
                .ok_or_else(|| RegistryError::NotFound(id.to_string())),
        }
    }

    /// Templates whose fields are mostly present in `headers`,
    /// highest coverage first.
    pub fn suggest(&self, headers: &[String]) -> Vec<TemplateMatch<'_>> {
        let mut matches: Vec<_> = self
            .list()
            .into_iter()
            .filter_map(|template| {
                let coverage = coverage(&template.csv_columns, headers);
                (coverage > MIN_COVERAGE).then_some(TemplateMatch { template, coverage })
            })
            .collect();

        // stable: ties keep name order
        matches.sort_by(|a, b| b.coverage.total_cmp(&a.coverage));
        matches
    }

    /// Store `rules` under a new id derived from `name`
    pub fn save(&mut self, rules: Vec<ValidationRule>, name: &str) -> RegistryResult<String> {
        fs::create_dir_all(&self.registry_dir)?;

        let mut csv_columns: Vec<String> = rules.iter().map(|r| r.field.clone()).collect();
        csv_columns.sort();
        csv_columns.dedup();

        let template = RuleTemplate {
            id: template_id(name),
            name: name.to_string(),
            rules,
            csv_columns,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            use_count: 0,
        };

        self.write(&template)?;
        let id = template.id.clone();
        self.templates.insert(id.clone(), template);
        Ok(id)
    }

    /// Import a JSON array of rules; the file stem names it by default
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let rules: Vec<ValidationRule> = serde_json::from_str(&content)?;

        let name = name
            .or_else(|| path.file_stem().and_then(|s| s.to_str()))
            .unwrap_or("imported");
        self.save(rules, name)
    }

    /// Record that a run applied the template
    pub fn record_use(&mut self, id: &str) -> RegistryResult<()> {
        let template = self
            .templates
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        template.last_used = Some(chrono::Utc::now().to_rfc3339());
        template.use_count += 1;

        let template = template.clone();
        self.write(&template)
    }

    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.templates.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn write(&self, template: &RuleTemplate) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(template)?;
        fs::write(self.path_for(&template.id), content)?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }
}

impl Default for RuleTemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn read_template(path: &Path) -> RegistryResult<RuleTemplate> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Share of `fields` found in `headers`, case-insensitive
fn coverage(fields: &[String], headers: &[String]) -> f64 {
    if fields.is_empty() {
        return 0.0;
    }
    let present: HashSet<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let hits = fields
        .iter()
        .filter(|f| present.contains(&f.to_lowercase()))
        .count();
    hits as f64 / fields.len() as f64
}

/// `<slug>-<8 hex chars>`, e.g. `customer-export-3f2a9c1e`
fn template_id(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slug, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RuleConfig, RuleType};
    use tempfile::tempdir;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn age_rule() -> ValidationRule {
        ValidationRule::new("age", "Age range", RuleType::Range, "age").with_config(RuleConfig {
            max: Some(120.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_coverage() {
        let score = coverage(&cols(&["email", "age", "country"]), &cols(&["email", "age"]));
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(coverage(&cols(&["EMAIL"]), &cols(&["Email"])), 1.0);
        assert_eq!(coverage(&[], &cols(&["a"])), 0.0);
    }

    #[test]
    fn test_template_id_slug() {
        let id = template_id("Customer Export (v2)");
        assert!(id.starts_with("customer-export-v2-"));
        assert_eq!(id.len(), "customer-export-v2-".len() + 8);
    }

    #[test]
    fn test_no_template_named_means_no_rules() {
        let dir = tempdir().unwrap();
        let mut registry = RuleTemplateRegistry::with_dir(dir.path());
        let id = registry.save(vec![age_rule()], "ages").unwrap();

        // a fully compatible template exists, yet nothing applies unless named
        let headers = cols(&["name", "age"]);
        assert_eq!(registry.suggest(&headers).len(), 1);
        assert!(registry.rules_for(None).unwrap().is_empty());

        assert_eq!(registry.rules_for(Some(&id)).unwrap(), vec![age_rule()]);
        assert!(matches!(
            registry.rules_for(Some("missing")),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_use_does_not_change_suggestions() {
        let dir = tempdir().unwrap();
        let mut registry = RuleTemplateRegistry::with_dir(dir.path());
        let first = registry.save(vec![age_rule()], "a-ages").unwrap();
        let second = registry.save(vec![age_rule()], "b-ages").unwrap();

        for _ in 0..3 {
            registry.record_use(&second).unwrap();
        }

        let headers = cols(&["age"]);
        let order: Vec<&str> = registry
            .suggest(&headers)
            .iter()
            .map(|m| m.template.id.as_str())
            .collect();
        assert_eq!(order, vec![first.as_str(), second.as_str()]);
        assert_eq!(registry.get(&second).map(|t| t.use_count), Some(3));
    }

    #[test]
    fn test_save_reload_and_suggest() {
        let dir = tempdir().unwrap();
        {
            let mut registry = RuleTemplateRegistry::with_dir(dir.path());
            registry.save(vec![age_rule()], "Customer Export").unwrap();
        }

        let registry = RuleTemplateRegistry::with_dir(dir.path());
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.suggest(&cols(&["Age", "city"])).len(), 1);
        assert!(registry.suggest(&cols(&["email"])).is_empty());
    }

    #[test]
    fn test_import_and_delete() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("orders.json");
        fs::write(
            &file,
            r#"[{"id":"q","name":"Qty","type":"range","field":"qty","config":{"min":1}}]"#,
        )
        .unwrap();

        let mut registry = RuleTemplateRegistry::with_dir(dir.path().join("store"));
        let id = registry.import(&file, None).unwrap();
        let template = registry.get(&id).unwrap();
        assert_eq!(template.name, "orders");
        assert_eq!(template.csv_columns, vec!["qty"]);

        registry.delete(&id).unwrap();
        assert!(registry.get(&id).is_none());
        assert!(matches!(
            registry.delete(&id),
            Err(RegistryError::NotFound(_))
        ));
    }
}
