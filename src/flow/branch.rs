//! Branch resolver — static lookup of dependent valid options keyed by a
//! prior answer (chosen date → available times).

use serde::Deserialize;

use crate::error::ConfigError;

/// Read-only table mapping a coarse selector (a date label) to the finite
/// ordered list of dependent options (time labels) valid for it.
#[derive(Debug, Clone)]
pub struct BranchTable {
    entries: Vec<(String, Vec<String>)>,
}

impl BranchTable {
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Self {
        Self { entries }
    }

    /// Parse a table from the `INTAKE_SCHEDULE` JSON override:
    /// `[["15 марта", ["10:00", "14:00"]], ...]`. Order is preserved.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct Entry(String, Vec<String>);

        let entries: Vec<Entry> =
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidValue {
                key: "INTAKE_SCHEDULE".into(),
                message: e.to_string(),
            })?;
        Ok(Self::new(
            entries.into_iter().map(|Entry(k, v)| (k, v)).collect(),
        ))
    }

    /// The valid dependent options for `selector`, in display order.
    ///
    /// Unknown selectors yield an empty slice, not an error — the engine
    /// treats "no valid options" as a validation failure for the dependent
    /// step.
    pub fn options_for(&self, selector: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(key, _)| key == selector)
            .map(|(_, options)| options.as_slice())
            .unwrap_or(&[])
    }

    /// All selectors, in display order.
    pub fn selectors(&self) -> Vec<String> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }
}

impl Default for BranchTable {
    /// Built-in schedule, used unless `INTAKE_SCHEDULE` overrides it.
    fn default() -> Self {
        Self::new(vec![
            (
                "Суббота, 15 марта".into(),
                vec!["10:00".into(), "14:00".into(), "18:00".into()],
            ),
            (
                "Воскресенье, 16 марта".into(),
                vec!["12:00".into(), "16:00".into()],
            ),
        ])
    }
}
