//! Stock transform stages.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use recipeloader_shared::{SourceFile, SourceMeta};

use crate::pipeline::{LazyPipeline, after_drain, replay};

/// Items that carry a filesystem path.
pub trait HasPath {
    fn path(&self) -> &Path;
}

impl HasPath for SourceFile {
    fn path(&self) -> &Path {
        &self.path
    }
}

/// Buffer a whole run, then re-emit it sorted by `cmp`. The sort is
/// stable; an upstream error is forwarded instead.
pub fn sort_items<T, F>(cmp: F) -> LazyPipeline<T>
where
    T: Send + 'static,
    F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
{
    let cmp = Arc::new(cmp);
    LazyPipeline::from_step(SourceMeta::default(), move |input| {
        let cmp = Arc::clone(&cmp);
        after_drain(input, move |mut items| {
            items.sort_by(|a, b| cmp(a, b));
            replay(items)
        })
    })
}

/// Sort file-like items by path, greatest first.
pub fn sort_by_path_desc<T: HasPath + Send + 'static>() -> LazyPipeline<T> {
    sort_items(|a: &T, b: &T| b.path().cmp(a.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use futures::StreamExt;
    use futures::executor::block_on;

    use crate::pipeline::test_support::{collect_ok, failing, items};

    fn file(path: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            base: PathBuf::from("app"),
            contents: None,
        }
    }

    #[test]
    fn sorts_whole_run() {
        let sorted = items(&["b", "c", "a"]).pipe(&sort_items(|a: &String, b: &String| a.cmp(b)));
        assert_eq!(block_on(collect_ok(sorted.invoke())), vec!["a", "b", "c"]);
    }

    #[test]
    fn sort_is_stable() {
        let by_len = sort_items(|a: &String, b: &String| a.len().cmp(&b.len()));
        let sorted = items(&["bb", "a2", "c", "a1"]).pipe(&by_len);
        assert_eq!(block_on(collect_ok(sorted.invoke())), vec!["c", "bb", "a2", "a1"]);
    }

    #[test]
    fn paths_descending() {
        let files = vec![file("app/a.js"), file("app/c.js"), file("app/b/x.js")];
        let sorted: Vec<PathBuf> = block_on(
            sort_by_path_desc::<SourceFile>()
                .run(replay(files))
                .map(|f| f.expect("file").path)
                .collect::<Vec<_>>(),
        );
        assert_eq!(
            sorted,
            vec![
                PathBuf::from("app/c.js"),
                PathBuf::from("app/b/x.js"),
                PathBuf::from("app/a.js"),
            ]
        );
    }

    #[test]
    fn upstream_error_is_forwarded() {
        let sorted = failing(&["z", "a"]).pipe(&sort_items(|a: &String, b: &String| a.cmp(b)));
        let produced: Vec<_> = block_on(sorted.invoke().collect::<Vec<_>>());
        assert_eq!(produced.len(), 1);
        assert!(produced[0].is_err());
    }
}
