//! Traces a small word-count pipeline line by line.
//!
//! Run with:
//!
//! ```sh
//! cargo run -q -p demos --bin lines
//! cargo run -q -p demos --bin lines -- --out target/stint/lines.csv
//! cargo run -q -p demos --bin lines -- --line-filter 'lines\.rs$'
//! ```

use std::collections::BTreeMap;

use stint::{Config, LineProfiler, Subject};
use tracing_subscriber::EnvFilter;

const TEXT: &str = "the quick brown fox jumps over the lazy dog the end";

#[stint::lines]
fn count_words(text: &str) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for word in text.split_whitespace() {
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
}

fn main() -> stint::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_args();

    let top = LineProfiler::new()
        .config(&config)?
        .subject(Subject::new("word_count").arg("words", TEXT.split_whitespace().count()))
        .run(|| stint::traced! {
            let text = TEXT.repeat(100);
            let counts = count_words(&text);
            let mut ranked: Vec<_> = counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
            ranked.truncate(3);
            ranked.into_iter().map(|(word, n)| format!("{word}={n}")).collect::<Vec<_>>()
        })?;

    println!("top words: {}", top.join(", "));

    Ok(())
}
