//! Tag conversion from PBF string pairs.
use mapcache_core::Tags;

pub(super) fn collect_tags<'a, T>(tags: T) -> Tags
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn later_duplicates_win() {
        let tags = collect_tags([("name", "old"), ("highway", "path"), ("name", "new")]);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("name").map(String::as_str), Some("new"));
    }
}
