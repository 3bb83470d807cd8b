//! Source registry: configured definitions built into pipelines on demand.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, instrument};

use recipeloader_shared::{RecipeError, Result, SourceSpec, SourcesConfig};

use crate::factory::{SourceStep, make_source};
use crate::pipeline::LazyPipeline;

/// Named source definitions, each built at most once.
pub struct SourceRegistry<T> {
    default_base: String,
    step: Arc<dyn SourceStep<T>>,
    slots: BTreeMap<String, Slot<T>>,
}

struct Slot<T> {
    spec: SourceSpec,
    built: OnceCell<LazyPipeline<T>>,
}

impl<T: Send + 'static> SourceRegistry<T> {
    pub fn new(
        defs: BTreeMap<String, SourceSpec>,
        default_base: impl Into<String>,
        step: Arc<dyn SourceStep<T>>,
    ) -> Self {
        let slots = defs
            .into_iter()
            .map(|(key, spec)| {
                (
                    key,
                    Slot {
                        spec,
                        built: OnceCell::new(),
                    },
                )
            })
            .collect();
        Self {
            default_base: default_base.into(),
            step,
            slots,
        }
    }

    /// Registry over the `[sources]` table of the loaded config.
    pub fn from_config(config: &SourcesConfig, step: Arc<dyn SourceStep<T>>) -> Self {
        Self::new(config.defs.clone(), config.default_base.clone(), step)
    }

    /// The pipeline for `key`, built on first access.
    #[instrument(skip(self))]
    pub fn get(&self, key: &str) -> Result<LazyPipeline<T>> {
        let slot = self
            .slots
            .get(key)
            .ok_or_else(|| RecipeError::config(format!("no source defined for `{key}`")))?;

        slot.built
            .get_or_try_init(|| {
                debug!("building source");
                make_source(&slot.spec, Arc::clone(&self.step), &self.default_base)
                    .map_err(|e| RecipeError::for_source(key, e))
            })
            .cloned()
    }

    /// Configured keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Raw definition for `key`, if configured.
    pub fn spec(&self, key: &str) -> Option<&SourceSpec> {
        self.slots.get(key).map(|slot| &slot.spec)
    }

    pub fn default_base(&self) -> &str {
        &self.default_base
    }

    /// Build every definition; fails on the first bad key.
    pub fn build_all(&self) -> Result<Vec<(String, LazyPipeline<T>)>> {
        self.slots
            .keys()
            .map(|key| Ok((key.clone(), self.get(key)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::StreamExt;
    use futures::stream;
    use serde_json::json;

    use crate::factory::SourceOptions;
    use crate::pipeline::PipeStream;

    fn step() -> Arc<dyn SourceStep<String>> {
        Arc::new(|patterns: &[String], _: &SourceOptions| -> PipeStream<String> {
            stream::iter(patterns.to_vec().into_iter().map(Ok)).boxed()
        })
    }

    fn registry(defs: &[(&str, serde_json::Value)]) -> SourceRegistry<String> {
        let defs = defs
            .iter()
            .map(|(k, v)| (k.to_string(), SourceSpec::from(v.clone())))
            .collect();
        SourceRegistry::new(defs, "app/", step())
    }

    #[test]
    fn builds_on_first_access_and_memoizes() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let counting: Arc<dyn SourceStep<String>> =
            Arc::new(move |_: &[String], _: &SourceOptions| -> PipeStream<String> {
                counter.fetch_add(1, Ordering::SeqCst);
                stream::empty().boxed()
            });
        let defs = [("scripts".to_string(), SourceSpec::from("app/*.js"))]
            .into_iter()
            .collect();
        let registry = SourceRegistry::new(defs, "app/", counting);

        let first = registry.get("scripts").expect("first");
        let second = registry.get("scripts").expect("second");
        // both handles share the one built pipeline
        assert!(std::ptr::eq(first.meta(), second.meta()));
        assert_eq!(first.globs(), ["app/*.js"]);
        // building never opens the step
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_key_is_config_error() {
        let registry = registry(&[("scripts", json!("app/*.js"))]);
        let err = registry.get("styles").unwrap_err();
        assert!(matches!(err, RecipeError::Config { .. }));
    }

    #[test]
    fn bad_definition_reports_its_key() {
        let registry = registry(&[("broken", json!({"base": "x/"}))]);
        let err = registry.get("broken").unwrap_err();
        assert!(err.is_invalid_spec());
        assert!(err.to_string().starts_with("source `broken`:"));
        // failure is not memoized
        assert!(registry.get("broken").is_err());
    }

    #[test]
    fn build_all_and_keys() {
        let registry = registry(&[("b", json!("b/*.js")), ("a", json!(["a/*.js"]))]);
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        let built = registry.build_all().expect("build all");
        assert_eq!(built.len(), 2);
        assert_eq!(built[0].1.globs(), ["a/*.js"]);

        let broken = registry_with_bad();
        assert!(broken.build_all().is_err());
    }

    fn registry_with_bad() -> SourceRegistry<String> {
        registry(&[("good", json!("x")), ("bad", json!(7))])
    }
}
