use crate::shell::quote;
use std::collections::BTreeMap;
use std::fmt;

const SECRET_MARKERS: [&str; 4] = ["PASSWORD", "PASS", "SECRET", "KEY"];

/// Immutable set of named parameters for one invocation
///
/// Parameters are rendered into the command line as an `env` prefix, the
/// orchestrator's own environment is never touched.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ParamBag(BTreeMap<String, String>);

impl ParamBag {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new bag with `other` layered on top of this one
    pub fn merged(&self, other: &ParamBag) -> ParamBag {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        ParamBag(merged)
    }

    /// `env K='v' ... command`, or the bare command when there is nothing to pass
    pub fn render(&self, command: &str) -> String {
        self.render_with(command, |_, v| quote(v))
    }

    /// Like [`ParamBag::render`] but with secret values blanked out
    pub fn render_redacted(&self, command: &str) -> String {
        self.render_with(command, |k, v| {
            if is_secret(k) {
                "'****'".to_string()
            } else {
                quote(v)
            }
        })
    }

    fn render_with(&self, command: &str, value: impl Fn(&str, &str) -> String) -> String {
        if self.0.is_empty() {
            return command.to_string();
        }
        let assignments: Vec<String> = self
            .iter()
            .map(|(k, v)| format!("{}={}", k, value(k, v)))
            .collect();
        format!("env {} {}", assignments.join(" "), command)
    }
}

fn is_secret(name: &str) -> bool {
    SECRET_MARKERS.iter().any(|marker| name.contains(marker))
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ParamBag(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Debug for ParamBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.iter()
                    .map(|(k, v)| (k, if is_secret(k) { "****" } else { v })),
            )
            .finish()
    }
}
