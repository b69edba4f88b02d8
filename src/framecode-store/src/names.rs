//! Channel name helpers

/// Return `name` if it is not taken, otherwise the first free `name-N` (N >= 2).
///
/// A name that already ends in `-N` keeps counting from N.
pub fn fix_name<'a, I>(name: &str, taken: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: Vec<&str> = taken.into_iter().collect();
    if !taken.contains(&name) {
        return name.to_string();
    }

    let (stem, mut n) = match name.rsplit_once('-') {
        Some((stem, suffix)) if !stem.is_empty() => match suffix.parse::<u64>() {
            Ok(n) => (stem, n + 1),
            Err(_) => (name, 2),
        },
        _ => (name, 2),
    };

    loop {
        let candidate = format!("{}-{}", stem, n);
        if !taken.contains(&candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_name_is_kept() {
        assert_eq!(fix_name("grooming", ["rearing"]), "grooming");
    }

    #[test]
    fn test_taken_name_gets_suffix() {
        assert_eq!(fix_name("grooming", ["grooming"]), "grooming-2");
        assert_eq!(
            fix_name("grooming", ["grooming", "grooming-2"]),
            "grooming-3"
        );
    }

    #[test]
    fn test_existing_suffix_continues() {
        assert_eq!(fix_name("nose-4", ["nose-4"]), "nose-5");
        assert_eq!(fix_name("left-ear", ["left-ear"]), "left-ear-2");
    }
}
