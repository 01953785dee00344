//! User-facing notices.
//!
//! The core never renders text itself. It builds a [`Notice`] (a message key
//! plus structured arguments) and hands it to a [`Notifier`]; a
//! [`Localizer`] turns the key and arguments into text.

use std::collections::HashMap;
use std::sync::Arc;

/// Key of the notice sent when stored settings had to be repaired.
pub const MALFORMED_DATA: &str = "malformed-data";

/// A message key with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub key: &'static str,
    pub args: Vec<(&'static str, String)>,
}

impl Notice {
    pub fn new(key: &'static str) -> Self {
        Self { key, args: Vec::new() }
    }

    pub fn arg(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.args.push((name, value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Notice for settings data that failed validation.
    pub fn malformed_data(source: &str, location: &str) -> Self {
        Self::new(MALFORMED_DATA)
            .arg("source", source)
            .arg("location", location)
    }
}

/// Renders notice text.
pub trait Localizer: Send + Sync + 'static {
    fn localize(&self, key: &str, args: &[(&'static str, String)]) -> String;
}

/// Surfaces notices to the end user.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notice: &Notice);
}

/// Template-based localizer. `{name}` placeholders are replaced by arguments.
#[derive(Debug, Clone)]
pub struct TemplateLocalizer {
    templates: HashMap<String, String>,
}

impl TemplateLocalizer {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Built-in English templates.
    pub fn english() -> Self {
        Self::new().with_template(
            MALFORMED_DATA,
            "Settings in {location} ({source}) were malformed and have been repaired.",
        )
    }

    pub fn with_template(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(key.into(), template.into());
        self
    }
}

impl Default for TemplateLocalizer {
    fn default() -> Self {
        Self::english()
    }
}

impl Localizer for TemplateLocalizer {
    fn localize(&self, key: &str, args: &[(&'static str, String)]) -> String {
        match self.templates.get(key) {
            Some(template) => args.iter().fold(template.clone(), |text, (name, value)| {
                text.replace(&format!("{{{name}}}"), value)
            }),
            // Unknown key: fall back to the key and raw arguments.
            None => {
                let rendered: Vec<String> = args.iter().map(|(n, v)| format!("{n}={v}")).collect();
                format!("{key}: {}", rendered.join(", "))
            }
        }
    }
}

/// Notifier that writes localized notices to the log.
#[derive(Clone)]
pub struct LogNotifier {
    localizer: Arc<dyn Localizer>,
}

impl LogNotifier {
    pub fn new(localizer: Arc<dyn Localizer>) -> Self {
        Self { localizer }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(Arc::new(TemplateLocalizer::english()))
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        let text = self.localizer.localize(notice.key, &notice.args);
        tracing::warn!(notice = notice.key, "{}", text);
    }
}
