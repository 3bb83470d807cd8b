//! Pipe catalog: recipes publish named pipes that other recipes collect by
//! name prefix and hand to a composition operator.

use tracing::debug;

use crate::compose::ComposeInput;

struct RecipePipes<T> {
    recipe: String,
    pipes: Vec<(String, ComposeInput<T>)>,
}

/// Named pipes grouped by the recipe that published them.
pub struct PipeCatalog<T> {
    recipes: Vec<RecipePipes<T>>,
}

impl<T> Default for PipeCatalog<T> {
    fn default() -> Self {
        Self {
            recipes: Vec::new(),
        }
    }
}

impl<T> PipeCatalog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `input` under `name` for `recipe`. Republishing a name
    /// replaces the earlier pipe in place.
    pub fn publish(
        &mut self,
        recipe: &str,
        name: impl Into<String>,
        input: impl Into<ComposeInput<T>>,
    ) {
        let name = name.into();
        let slot = match self.recipes.iter().position(|r| r.recipe == recipe) {
            Some(i) => &mut self.recipes[i],
            None => {
                self.recipes.push(RecipePipes {
                    recipe: recipe.to_string(),
                    pipes: Vec::new(),
                });
                let last = self.recipes.len() - 1;
                &mut self.recipes[last]
            }
        };

        let input = input.into();
        match slot.pipes.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = input,
            None => slot.pipes.push((name, input)),
        }
    }

    /// Every pipe whose name starts with `prefix`, in recipe registration
    /// order then publication order. An empty prefix selects all.
    pub fn with_prefix(&self, prefix: &str) -> Vec<ComposeInput<T>> {
        let selected: Vec<ComposeInput<T>> = self
            .recipes
            .iter()
            .flat_map(|r| r.pipes.iter())
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, input)| input.clone())
            .collect();
        debug!(prefix, selected = selected.len(), "pipes collected");
        selected
    }

    pub fn recipes(&self) -> impl Iterator<Item = &str> {
        self.recipes.iter().map(|r| r.recipe.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.iter().all(|r| r.pipes.is_empty())
    }
}
