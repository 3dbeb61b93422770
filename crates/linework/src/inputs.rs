//! Input discovery: expand directories and order files naturally.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Extensions the image decoder is built with.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Expand `inputs` into a list of image files.
///
/// Files are taken as given. Directories contribute their image files
/// (non-recursive) in natural order, so `map_2.png` precedes
/// `map_10.png`.
///
/// # Errors
///
/// Returns the I/O error of the first directory that cannot be read.
pub fn collect_inputs(inputs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() && is_image(&path) {
                    entries.push(path);
                }
            }
            entries.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk<'a> {
    // Numbers sort before text at the same position.
    Number(u128, usize),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(first) = rest.chars().next() {
        let digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digit)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        out.push(match head.parse::<u128>() {
            // Shorter zero-padding first, so "7" < "07".
            Ok(n) if digit => Chunk::Number(n, head.len()),
            _ => Chunk::Text(head),
        });
        rest = tail;
    }
    out
}

/// Compare names treating digit runs as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    chunks(a).cmp(&chunks(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_by_value() {
        let mut names = vec!["map_10.png", "map_2.png", "map_1.png", "map_1_3.png"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, ["map_1.png", "map_1_3.png", "map_2.png", "map_10.png"]);
    }

    #[test]
    fn text_and_padding() {
        assert_eq!(natural_cmp("a", "b"), Ordering::Less);
        assert_eq!(natural_cmp("7", "07"), Ordering::Less);
        assert_eq!(natural_cmp("9", "x"), Ordering::Less);
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
    }

    #[test]
    fn directories_expand_to_sorted_images() {
        let dir = std::env::temp_dir().join(format!("linework-inputs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["s_10.png", "s_9.PNG", "notes.txt", "s_1.jpg"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let files = collect_inputs(std::slice::from_ref(&dir)).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, ["s_1.jpg", "s_9.PNG", "s_10.png"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn files_pass_through_in_order() {
        let inputs = [PathBuf::from("b.png"), PathBuf::from("a.png")];
        assert_eq!(collect_inputs(&inputs).unwrap(), inputs);
    }
}
