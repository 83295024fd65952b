//! Disambiguating names for keep-both and rename-all resolutions
//!
//! Produces `name (n).ext` with the smallest `n` not already taken,
//! so the second copy of `report.docx` becomes `report (1).docx`.

/// Generates non-colliding sibling names
pub struct StallNamer;

impl StallNamer {
    /// Produce `name (n).ext` for a given counter
    #[must_use]
    pub fn numbered(original_name: &str, n: u32) -> String {
        if let Some(dot_pos) = original_name.rfind('.') {
            let stem = &original_name[..dot_pos];
            let ext = &original_name[dot_pos..];
            format!("{stem} ({n}){ext}")
        } else {
            format!("{original_name} ({n})")
        }
    }

    /// The smallest-numbered variant that does not collide
    ///
    /// `exists` is probed with each candidate; the first free one wins.
    /// Starts at `(1)` and keeps counting, so a directory already
    /// holding `a (1).txt` and `a (2).txt` yields `a (3).txt`.
    pub fn generate_unique<F>(original_name: &str, mut exists: F) -> String
    where
        F: FnMut(&str) -> bool,
    {
        let mut n = 1u32;
        loop {
            let candidate = Self::numbered(original_name, n);
            if !exists(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_with_extension() {
        assert_eq!(StallNamer::numbered("report.docx", 1), "report (1).docx");
    }

    #[test]
    fn test_numbered_without_extension() {
        assert_eq!(StallNamer::numbered("Makefile", 2), "Makefile (2)");
    }

    #[test]
    fn test_numbered_with_multiple_dots() {
        assert_eq!(
            StallNamer::numbered("archive.tar.gz", 1),
            "archive.tar (1).gz"
        );
    }

    #[test]
    fn test_generate_unique_no_collision() {
        let name = StallNamer::generate_unique("a.txt", |_| false);
        assert_eq!(name, "a (1).txt");
    }

    #[test]
    fn test_generate_unique_smallest_free_slot() {
        let taken = ["a (1).txt", "a (2).txt"];
        let name = StallNamer::generate_unique("a.txt", |c| taken.contains(&c));
        assert_eq!(name, "a (3).txt");
    }

    #[test]
    fn test_generate_unique_fills_gap() {
        let taken = ["a (2).txt"];
        let name = StallNamer::generate_unique("a.txt", |c| taken.contains(&c));
        assert_eq!(name, "a (1).txt");
    }
}
