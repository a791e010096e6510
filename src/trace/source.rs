use std::{
    cell::OnceCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Source text of traced files, read on first use.
#[derive(Debug, Default)]
pub(crate) struct SourceCache {
    files: HashMap<&'static str, SourceFile>,
}

#[derive(Debug)]
struct SourceFile {
    root: &'static str,

    /// `None` once reading has failed.
    lines: OnceCell<Option<Vec<String>>>,
}

impl SourceCache {
    /// Remembers where `file` can be found without reading it.
    #[inline]
    pub fn register(&mut self, file: &'static str, root: &'static str) {
        self.files.entry(file).or_insert_with(|| SourceFile { root, lines: OnceCell::new() });
    }

    /// Returns the text of each line, dedented by the indentation of the
    /// first line. Missing lines are `None`.
    pub fn snippets(&self, file: &str, lines: &[u32]) -> Vec<Option<String>> {
        let Some(source) = self.files.get(file).and_then(|entry| entry.lines(file)) else {
            return vec![None; lines.len()];
        };

        let mut indent = None;

        lines
            .iter()
            .map(|&line| {
                let text = source.get((line as usize).checked_sub(1)?)?;
                let indent = *indent.get_or_insert_with(|| indent_width(text));
                Some(dedent(text, indent).trim_end().to_owned())
            })
            .collect()
    }
}

impl SourceFile {
    fn lines(&self, file: &str) -> Option<&[String]> {
        self.lines
            .get_or_init(|| {
                let path = resolve(file, self.root)?;
                match fs::read_to_string(&path) {
                    Ok(text) => Some(text.lines().map(str::to_owned).collect()),
                    Err(error) => {
                        tracing::debug!(
                            path = %path.display(),
                            %error,
                            "failed to read traced source"
                        );
                        None
                    }
                }
            })
            .as_deref()
    }
}

/// Finds `file` relative to `root` or one of its ancestors.
///
/// Workspace members see `file!()` relative to the workspace root, which is an
/// ancestor of their manifest directory.
fn resolve(file: &str, root: &str) -> Option<PathBuf> {
    let file = Path::new(file);
    if file.is_absolute() {
        return Some(file.to_owned());
    }

    Path::new(root).ancestors().map(|dir| dir.join(file)).find(|path| path.is_file())
}

fn indent_width(text: &str) -> usize {
    text.chars().take_while(|c| c.is_whitespace()).count()
}

/// Strips up to `width` chars of leading whitespace.
fn dedent(text: &str, width: usize) -> &str {
    let strip = text
        .char_indices()
        .take_while(|(_, c)| c.is_whitespace())
        .take(width)
        .last()
        .map_or(0, |(i, c)| i + c.len_utf8());

    &text[strip..]
}
