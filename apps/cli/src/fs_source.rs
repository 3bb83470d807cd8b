//! Filesystem source step backed by the `glob` crate.

use std::collections::HashSet;
use std::path::PathBuf;

use futures::stream::{self, StreamExt, TryStreamExt};
use recipeloader_core::{PipeStream, SourceOptions, SourceStep};
use recipeloader_shared::{RecipeError, Result, SourceFile};
use tracing::debug;

/// Expands a group's patterns against the filesystem and emits one
/// [`SourceFile`] per matched file. Patterns starting with `!` exclude.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct GlobSource;

impl SourceStep<SourceFile> for GlobSource {
    fn open(&self, patterns: &[String], options: &SourceOptions) -> PipeStream<SourceFile> {
        let patterns = patterns.to_vec();
        let base = PathBuf::from(&options.base);
        let read = options.read;

        stream::once(async move {
            let paths = tokio::task::spawn_blocking(move || expand(&patterns))
                .await
                .map_err(|e| RecipeError::step(format!("glob task failed: {e}")))??;
            debug!(files = paths.len(), base = %base.display(), "patterns expanded");

            Ok::<_, RecipeError>(
                stream::iter(paths).then(move |path| load(path, base.clone(), read)),
            )
        })
        .try_flatten()
        .boxed()
    }
}

fn expand(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut excluded = Vec::new();
    let mut included = Vec::new();
    for pattern in patterns {
        match pattern.strip_prefix('!') {
            Some(negated) => excluded.push(
                glob::Pattern::new(negated)
                    .map_err(|e| RecipeError::step(format!("bad pattern `{pattern}`: {e}")))?,
            ),
            None => included.push(pattern.as_str()),
        }
    }

    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    for pattern in included {
        let matches = glob::glob(pattern)
            .map_err(|e| RecipeError::step(format!("bad pattern `{pattern}`: {e}")))?;
        for entry in matches {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                RecipeError::io(path, e.into())
            })?;
            if !path.is_file() || excluded.iter().any(|p| p.matches_path(&path)) {
                continue;
            }
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }
    Ok(paths)
}

async fn load(path: PathBuf, base: PathBuf, read: bool) -> Result<SourceFile> {
    let contents = if read {
        Some(
            tokio::fs::read(&path)
                .await
                .map_err(|e| RecipeError::io(&path, e))?,
        )
    } else {
        None
    };
    Ok(SourceFile {
        path,
        base,
        contents,
    })
}
