//! Module-qualified section and action names
//!
//! A configuration may name the module it belongs to with a top-level
//! `"module"` key (or inherit a default module name from its caller). Its
//! sections are then registered as `<module>.<section>` and its actions as
//! `<module>.<section>.<action>`, so that pipelines from different modules can
//! share section and action names. Without a module, names are left as
//! written. Section and action names themselves may not contain the separator.

use std::fmt;

pub const NAME_SEPARATOR: char = '.';

/// A parsed `[module.]section.action` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionName<'a> {
    pub module: Option<&'a str>,
    pub short_section: &'a str,
    pub short_action: &'a str,
    /// The name as given.
    pub full: &'a str,
}

impl<'a> ActionName<'a> {
    /// Split a qualified action name. Returns `None` unless the name has two
    /// or three non-empty components.
    pub fn parse(name: &'a str) -> Option<Self> {
        let parts: Vec<&str> = name.split(NAME_SEPARATOR).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        match parts.as_slice() {
            [module, section, action] => Some(Self {
                module: Some(module),
                short_section: section,
                short_action: action,
                full: name,
            }),
            [section, action] => Some(Self {
                module: None,
                short_section: section,
                short_action: action,
                full: name,
            }),
            _ => None,
        }
    }

    /// The section the action is registered under.
    pub fn section(&self) -> String {
        qualify_section(self.module, self.short_section)
    }

    /// The key the action is registered under within its section. Actions of
    /// a module keep their full name; others are stored by short name.
    pub fn key(&self) -> &'a str {
        match self.module {
            Some(_) => self.full,
            None => self.short_action,
        }
    }
}

impl fmt::Display for ActionName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full)
    }
}

/// `module.section`, or the section alone without a module.
pub fn qualify_section(module: Option<&str>, section: &str) -> String {
    match module {
        Some(module) => format!("{}{}{}", module, NAME_SEPARATOR, section),
        None => section.to_string(),
    }
}

/// `section.action` for a module-qualified section.
pub fn qualify_action(section: &str, action: &str) -> String {
    format!("{}{}{}", section, NAME_SEPARATOR, action)
}

/// The last component of a possibly qualified name.
pub fn short_name(name: &str) -> &str {
    name.rsplit(NAME_SEPARATOR).next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_names() {
        let name = ActionName::parse("xdmod.ingestors.jobs").unwrap();
        assert_eq!(name.module, Some("xdmod"));
        assert_eq!(name.short_section, "ingestors");
        assert_eq!(name.short_action, "jobs");
        assert_eq!(name.section(), "xdmod.ingestors");
        assert_eq!(name.key(), "xdmod.ingestors.jobs");

        let name = ActionName::parse("ingestors.jobs").unwrap();
        assert_eq!(name.module, None);
        assert_eq!(name.section(), "ingestors");
        assert_eq!(name.key(), "jobs");

        for malformed in ["jobs", "a.b.c.d", "a..b", ".a", ""] {
            assert!(ActionName::parse(malformed).is_none(), "{malformed}");
        }
    }

    #[test]
    fn test_qualify_and_shorten() {
        assert_eq!(qualify_section(Some("supremm"), "ingestors"), "supremm.ingestors");
        assert_eq!(qualify_section(None, "ingestors"), "ingestors");
        assert_eq!(qualify_action("supremm.ingestors", "jobs"), "supremm.ingestors.jobs");
        assert_eq!(short_name("supremm.ingestors.jobs"), "jobs");
        assert_eq!(short_name("jobs"), "jobs");
    }
}
