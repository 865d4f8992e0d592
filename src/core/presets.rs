/// Activity name suggestions: most recent first, case-insensitively unique, capped.
pub const MAX_PRESETS: usize = 15;

pub const DEFAULT_PRESETS: [&str; 9] = [
    "breakfast", "commute", "work", "lunch", "exercise", "relax", "cooking", "reading",
    "errands",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetList {
    names: Vec<String>,
}

impl PresetList {
    pub fn with_defaults() -> Self {
        Self {
            names: DEFAULT_PRESETS.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Builds a list from stored or remote names, dropping case-insensitive duplicates while
    /// keeping first occurrences, and enforcing the cap.
    pub fn from_names(names: Vec<String>) -> Self {
        let mut list = Self { names: Vec::new() };
        for name in names {
            let name = name.trim().to_string();
            if name.is_empty() || list.contains(&name) {
                continue;
            }
            list.names.push(name);
            if list.names.len() == MAX_PRESETS {
                break;
            }
        }
        list
    }

    /// Remembers a just-used activity name. New names go to the front; a name already on the
    /// list leaves it untouched. Returns whether the list changed.
    pub fn remember(&mut self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        if name.is_empty() || self.contains(&name) {
            return false;
        }
        self.names.insert(0, name);
        self.names.truncate(MAX_PRESETS);
        true
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|v| v.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_prepends_new_names() {
        let mut list = PresetList::from_names(vec!["work".into(), "lunch".into()]);
        assert!(list.remember("Reading"));
        assert_eq!(list.names(), ["reading", "work", "lunch"]);
    }

    #[test]
    fn remember_is_case_insensitive() {
        let mut list = PresetList::from_names(vec!["Work".into()]);
        assert!(!list.remember("work"));
        assert!(!list.remember("WORK"));
        assert_eq!(list.names(), ["Work"]);
    }

    #[test]
    fn list_is_capped() {
        let mut list = PresetList::from_names((0..MAX_PRESETS).map(|i| format!("a{i}")).collect());
        assert_eq!(list.names().len(), MAX_PRESETS);

        assert!(list.remember("fresh"));
        assert_eq!(list.names().len(), MAX_PRESETS);
        assert_eq!(list.names()[0], "fresh");
        assert!(!list.names().contains(&format!("a{}", MAX_PRESETS - 1)));
    }

    #[test]
    fn from_names_deduplicates_and_trims() {
        let list = PresetList::from_names(vec![
            "work".into(),
            " Work ".into(),
            "".into(),
            "lunch".into(),
        ]);
        assert_eq!(list.names(), ["work", "lunch"]);
    }

    #[test]
    fn defaults_are_available_when_nothing_is_stored() {
        assert_eq!(PresetList::with_defaults().names().len(), DEFAULT_PRESETS.len());
    }
}
