//! User-facing terminal output
//!
//! Status messages go to stderr in color without log decoration; search
//! hits go to stdout so they can be piped.

use owo_colors::OwoColorize;

use crate::models::SearchHit;

/// Yellow message on stderr, e.g. "3 pages could not be fetched"
pub fn warn(message: &str) {
    eprintln!("\n{}\n", message.yellow());
}

/// Red message on stderr, e.g. "No index found. Run 'dirdex refresh'."
pub fn error(message: &str) {
    eprintln!("\n{}\n", message.red());
}

pub fn info(message: &str) {
    eprintln!("\n{}\n", message);
}

/// One search hit: extension tag, decoded file name, then the URL dimmed
pub fn hit(hit: &SearchHit, plain: bool) {
    let tag = if hit.extension.is_empty() { "-".to_string() } else { hit.extension.clone() };
    if plain {
        println!("[{}] {}\t{}", tag, hit.name, hit.url);
    } else {
        println!("{} {}\n    {}", format!("[{}]", tag).cyan(), hit.name.bold(), hit.url.dimmed());
    }
}
