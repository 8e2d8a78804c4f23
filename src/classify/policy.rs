// src/classify/policy.rs

use std::collections::BTreeMap;

use super::normalize::normalize_message;

/// Name of the policy with no overrides at all.
pub const DEFAULT_POLICY: &str = "default";
/// Name of the policy tuned for the component installer.
pub const INSTALLER_POLICY: &str = "installer";

/// Case-insensitive failure keywords with a list of benign exceptions.
///
/// A stderr line matches when it contains any keyword and none of the benign
/// phrases. Listing a keyword itself as benign disables it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordRule {
    keywords: Vec<String>,
    benign: Vec<String>,
}

/// The first stderr line that tripped a keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub keyword: String,
    /// The matching line, normalized for display.
    pub context: String,
}

impl KeywordRule {
    pub fn new<K, B>(keywords: K, benign: B) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        Self {
            keywords: lowered(keywords),
            benign: lowered(benign),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn scan(&self, text: &str) -> Option<KeywordMatch> {
        if self.keywords.is_empty() {
            return None;
        }

        text.lines().find_map(|line| {
            let lower = line.to_lowercase();
            if self.benign.iter().any(|b| lower.contains(b.as_str())) {
                return None;
            }
            self.keywords
                .iter()
                .find(|k| lower.contains(k.as_str()))
                .map(|k| KeywordMatch {
                    keyword: k.clone(),
                    context: normalize_message(line),
                })
        })
    }
}

fn lowered<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Per-invocation classification rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierPolicy {
    /// Exit code that means "already present, replaced" when the request
    /// carries the `overwrite` flag.
    pub overwrite_sentinel: Option<i32>,
    pub keywords: KeywordRule,
}

impl ClassifierPolicy {
    /// Plain exit-code semantics.
    pub fn exit_code_only() -> Self {
        Self::default()
    }

    /// Rules for the shadcn-style installer: exit code 1 under `--overwrite`
    /// is success, and "already exists" on stderr is a failure.
    pub fn installer() -> Self {
        Self {
            overwrite_sentinel: Some(1),
            keywords: KeywordRule::new(["already exists"], Vec::<String>::new()),
        }
    }

    pub fn with_sentinel(mut self, code: Option<i32>) -> Self {
        self.overwrite_sentinel = code;
        self
    }

    pub fn with_keywords(mut self, rule: KeywordRule) -> Self {
        self.keywords = rule;
        self
    }
}

/// Named policies, selectable per call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    policies: BTreeMap<String, ClassifierPolicy>,
}

impl Default for PolicySet {
    /// The built-in `default` and `installer` policies.
    fn default() -> Self {
        let mut policies = BTreeMap::new();
        policies.insert(DEFAULT_POLICY.to_string(), ClassifierPolicy::exit_code_only());
        policies.insert(INSTALLER_POLICY.to_string(), ClassifierPolicy::installer());
        Self { policies }
    }
}

impl PolicySet {
    /// Add or replace a named policy.
    pub fn insert(&mut self, name: impl Into<String>, policy: ClassifierPolicy) {
        self.policies.insert(name.into(), policy);
    }

    pub fn get(&self, name: &str) -> Option<&ClassifierPolicy> {
        self.policies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// The policy used when a call site does not name one.
    pub fn fallback(&self) -> ClassifierPolicy {
        self.get(DEFAULT_POLICY).cloned().unwrap_or_default()
    }

    /// Look up `name`, or the fallback when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Option<ClassifierPolicy> {
        match name {
            Some(name) => self.get(name).cloned(),
            None => Some(self.fallback()),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }
}
