//! Word splitting for command lines.

/// Split `input` into non-empty words separated by runs of whitespace.
///
/// There is no quoting or escape syntax, so a word containing whitespace
/// cannot be represented. Empty or all-whitespace input yields no words.
pub fn split_words(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::split_words;

    #[test]
    fn empty_input_yields_no_words() {
        assert!(split_words("").is_empty());
        assert!(split_words(" \t ").is_empty());
    }

    #[test]
    fn words_split_on_whitespace_runs() {
        assert_eq!(split_words("a  b\tc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(split_words("  ls -l "), vec!["ls", "-l"]);
    }
}
