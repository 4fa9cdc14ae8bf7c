//! Message resolution by code and locale.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::errors::{ContextError, LookupKind};

/// Locale tag such as `en_US`. The empty tag is the root locale.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale(String);

impl Locale {
    /// Accepts `en-US` and `en_US` alike.
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().replace('-', "_"))
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// `en_US_POSIX` → [`en_US_POSIX`, `en_US`, `en`, root].
    pub fn fallback_chain(&self) -> Vec<Locale> {
        let mut chain = Vec::new();
        let mut tag = self.0.as_str();
        while !tag.is_empty() {
            chain.push(Locale(tag.to_string()));
            tag = match tag.rfind('_') {
                Some(idx) => &tag[..idx],
                None => "",
            };
        }
        chain.push(Locale::root());
        chain
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("root")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for Locale {
    fn from(tag: &str) -> Self {
        Locale::new(tag)
    }
}

/// A message described by candidate codes, arguments and an optional default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageResolvable {
    pub codes: Vec<String>,
    pub args: Vec<String>,
    pub default_message: Option<String>,
}

impl MessageResolvable {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            codes: vec![code.into()],
            ..Self::default()
        }
    }

    pub fn or_code(mut self, code: impl Into<String>) -> Self {
        self.codes.push(code.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default(mut self, message: impl Into<String>) -> Self {
        self.default_message = Some(message.into());
        self
    }
}

/// Substitute `{0}`, `{1}`, … with positional arguments. Unknown or
/// out-of-range placeholders are left untouched.
pub fn format_message(template: &str, args: &[&str]) -> String {
    if args.is_empty() {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let idx: usize = after[..close].parse().ok()?;
            args.get(idx).map(|arg| (*arg, close))
        });
        match substituted {
            Some((arg, close)) => {
                out.push_str(arg);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub trait MessageResolver: Send + Sync {
    /// Resolve `code` for `locale`, failing with `NotFound` when no catalog has it.
    fn message(&self, code: &str, args: &[&str], locale: &Locale) -> Result<String, ContextError>;

    /// Resolve `code`, falling back to `default` (also formatted with `args`).
    fn message_or(
        &self,
        code: &str,
        args: &[&str],
        default: &str,
        locale: &Locale,
    ) -> Result<String, ContextError> {
        match self.message(code, args, locale) {
            Err(e) if e.is_not_found() => Ok(format_message(default, args)),
            other => other,
        }
    }

    /// Try each code in order, then the default message.
    fn resolve(&self, resolvable: &MessageResolvable, locale: &Locale) -> Result<String, ContextError> {
        let args: Vec<&str> = resolvable.args.iter().map(String::as_str).collect();
        for code in &resolvable.codes {
            match self.message(code, &args, locale) {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }
        if let Some(default) = &resolvable.default_message {
            return Ok(format_message(default, &args));
        }
        let key = resolvable.codes.last().cloned().unwrap_or_default();
        Err(ContextError::not_found(LookupKind::Message, key))
    }
}

/// Catalog of message templates keyed by (locale, code), with locale fallback
/// and an optional parent resolver consulted when nothing matches locally.
#[derive(Default)]
pub struct StaticMessageSource {
    catalog: DashMap<(Locale, String), String>,
    parent: Option<Arc<dyn MessageResolver>>,
    use_code_as_default: bool,
}

impl fmt::Debug for StaticMessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticMessageSource")
            .field("messages", &self.catalog.len())
            .field("has_parent", &self.parent.is_some())
            .field("use_code_as_default", &self.use_code_as_default)
            .finish()
    }
}

impl StaticMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: Arc<dyn MessageResolver>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Return the code itself instead of failing when nothing matches.
    pub fn use_code_as_default(mut self, enabled: bool) -> Self {
        self.use_code_as_default = enabled;
        self
    }

    pub fn add_message(&self, code: impl Into<String>, locale: &Locale, template: impl Into<String>) {
        self.catalog
            .insert((locale.clone(), code.into()), template.into());
    }

    pub fn add_messages<I, C, T>(&self, locale: &Locale, messages: I)
    where
        I: IntoIterator<Item = (C, T)>,
        C: Into<String>,
        T: Into<String>,
    {
        for (code, template) in messages {
            self.add_message(code, locale, template);
        }
    }

    fn lookup(&self, code: &str, locale: &Locale) -> Option<String> {
        locale.fallback_chain().into_iter().find_map(|candidate| {
            self.catalog
                .get(&(candidate, code.to_string()))
                .map(|entry| entry.value().clone())
        })
    }
}

impl MessageResolver for StaticMessageSource {
    fn message(&self, code: &str, args: &[&str], locale: &Locale) -> Result<String, ContextError> {
        if let Some(template) = self.lookup(code, locale) {
            return Ok(format_message(&template, args));
        }
        if let Some(parent) = &self.parent {
            match parent.message(code, args, locale) {
                Err(e) if e.is_not_found() => {}
                other => return other,
            }
        }
        if self.use_code_as_default {
            return Ok(code.to_string());
        }
        Err(ContextError::not_found(LookupKind::Message, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_chain() {
        let chain: Vec<String> = Locale::new("en-US-POSIX")
            .fallback_chain()
            .iter()
            .map(|l| l.to_string())
            .collect();
        assert_eq!(chain, vec!["en_US_POSIX", "en_US", "en", "root"]);
        assert_eq!(Locale::root().fallback_chain(), vec![Locale::root()]);
    }

    #[test]
    fn format_positional_args() {
        assert_eq!(format_message("Hi {0}, you are {1}", &["Ann", "42"]), "Hi Ann, you are 42");
        assert_eq!(format_message("{0}{0}", &["x"]), "xx");
        assert_eq!(format_message("keep {2} and {x}", &["a"]), "keep {2} and {x}");
        assert_eq!(format_message("no args {0}", &[]), "no args {0}");
    }

    #[test]
    fn locale_fallback_resolution() {
        let src = StaticMessageSource::new();
        src.add_message("greeting", &Locale::root(), "Hello {0}");
        src.add_message("greeting", &Locale::new("de"), "Hallo {0}");

        let de_at = Locale::new("de_AT");
        assert_eq!(src.message("greeting", &["Max"], &de_at).unwrap(), "Hallo Max");
        assert_eq!(
            src.message("greeting", &["Max"], &Locale::new("fr")).unwrap(),
            "Hello Max"
        );
        assert!(src
            .message("missing", &[], &de_at)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn parent_and_defaults() {
        let parent = StaticMessageSource::new();
        parent.add_message("shared", &Locale::root(), "from parent");
        let child = StaticMessageSource::new().with_parent(Arc::new(parent));

        let root = Locale::root();
        assert_eq!(child.message("shared", &[], &root).unwrap(), "from parent");
        assert_eq!(
            child.message_or("nope", &["z"], "default {0}", &root).unwrap(),
            "default z"
        );

        let lenient = StaticMessageSource::new().use_code_as_default(true);
        assert_eq!(lenient.message("raw.code", &[], &root).unwrap(), "raw.code");
    }

    #[test]
    fn resolvable_tries_codes_in_order() {
        let src = StaticMessageSource::new();
        src.add_message("second", &Locale::root(), "got {0}");

        let r = MessageResolvable::new("first").or_code("second").with_args(["it"]);
        assert_eq!(src.resolve(&r, &Locale::root()).unwrap(), "got it");

        let d = MessageResolvable::new("none").with_default("fallback");
        assert_eq!(src.resolve(&d, &Locale::root()).unwrap(), "fallback");

        let err = src
            .resolve(&MessageResolvable::new("none"), &Locale::root())
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
