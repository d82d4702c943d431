pub trait Named {
    fn get_name(&self) -> &str;
    fn get_aliases(&self) -> &[String];

    fn matches(&self, str: &str) -> bool {
        self.get_name().eq_ignore_ascii_case(str)
            || self.get_aliases().iter().any(|alias| alias.eq_ignore_ascii_case(str))
    }

    /// `gob` finds the goblin; `old` finds the old rat.
    fn matches_prefix(&self, str: &str) -> bool {
        let str = str.to_ascii_lowercase();
        !str.is_empty()
            && (self.matches(&str)
                || self
                    .get_name()
                    .split_whitespace()
                    .any(|word| word.to_ascii_lowercase().starts_with(&str)))
    }
}
