//! Presentation of macro-factor attribution results.
//!
//! [`AttributionReport`] renders an [`Attribution`] for one portfolio as a
//! terminal table or a Markdown document, with the factors that move with the
//! portfolio listed apart from those that move against it.

use albany_analytics::{Attribution, FactorCoefficient, FactorKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribution of one portfolio's returns to macro factors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributionReport {
    /// Portfolio the returns belong to.
    pub portfolio_id: String,

    /// Fitted attribution.
    pub attribution: Attribution,

    /// Display names by factor id.
    #[serde(default)]
    pub factor_names: BTreeMap<String, String>,

    /// Number of factors listed per direction; `None` lists all.
    #[serde(default)]
    pub top: Option<usize>,
}

impl AttributionReport {
    /// Create a report listing every factor.
    pub fn new(portfolio_id: impl Into<String>, attribution: Attribution) -> Self {
        Self {
            portfolio_id: portfolio_id.into(),
            attribution,
            factor_names: BTreeMap::new(),
            top: None,
        }
    }

    /// Attach display names for factor ids.
    pub fn with_factor_names<I, K, V>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.factor_names
            .extend(names.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// List at most `n` factors per direction.
    pub const fn with_top(mut self, n: usize) -> Self {
        self.top = Some(n);
        self
    }

    /// Factors with the largest positive coefficients, strongest first.
    pub fn positive(&self) -> &[FactorCoefficient] {
        self.limit(&self.attribution.positive)
    }

    /// Factors with the most negative coefficients, strongest first.
    pub fn negative(&self) -> &[FactorCoefficient] {
        self.limit(&self.attribution.negative)
    }

    fn limit<'a>(&self, items: &'a [FactorCoefficient]) -> &'a [FactorCoefficient] {
        match self.top {
            Some(n) => &items[..n.min(items.len())],
            None => items,
        }
    }

    /// Display label for a factor: its name when known, otherwise its id.
    pub fn label(&self, key: &FactorKey) -> String {
        let factor = self
            .factor_names
            .get(&key.factor_id)
            .map_or(key.factor_id.as_str(), String::as_str);
        format!("{} ({})", factor, key.region_id)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let a = &self.attribution;
        let mut output = String::new();

        output.push_str(&format!("\nMacro Factor Attribution: {}\n", self.portfolio_id));
        output.push_str(&format!(
            "Window: {} to {} ({} months used)\n",
            a.window.start(),
            a.window.end(),
            a.observations
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        for (title, items) in [
            ("Positive drivers", self.positive()),
            ("Negative drivers", self.negative()),
        ] {
            output.push_str(&format!("{title}\n"));
            output.push_str(&format!("{:<4} {:<62} {:>12}\n", "#", "Factor", "Coefficient"));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            if items.is_empty() {
                output.push_str("     (none)\n");
            }
            for (i, c) in items.iter().enumerate() {
                output.push_str(&format!(
                    "{:<4} {:<62} {:>12.4}\n",
                    i + 1,
                    truncate(&self.label(&c.key), 62),
                    c.coefficient
                ));
            }
            output.push('\n');
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!("Alpha: {}\n", a.alpha));
        output.push_str(&format!("Intercept: {:.6}\n", a.intercept));
        if !a.dropped.is_empty() {
            output.push_str(&format!("Dropped (no data in window): {}\n", a.dropped.len()));
        }

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let a = &self.attribution;
        let mut output = String::new();

        output.push_str(&format!("# Macro Factor Attribution: {}\n\n", self.portfolio_id));
        output.push_str(&format!(
            "**Window:** {} to {} ({} months used)\n\n",
            a.window.start(),
            a.window.end(),
            a.observations
        ));

        for (title, items) in [
            ("Positive Drivers", self.positive()),
            ("Negative Drivers", self.negative()),
        ] {
            output.push_str(&format!("## {title}\n\n"));
            output.push_str("| # | Factor | Region | Coefficient |\n");
            output.push_str("|---|--------|--------|-------------|\n");
            for (i, c) in items.iter().enumerate() {
                let name = self
                    .factor_names
                    .get(&c.key.factor_id)
                    .unwrap_or(&c.key.factor_id);
                output.push_str(&format!(
                    "| {} | {} | {} | {:.4} |\n",
                    i + 1,
                    name,
                    c.key.region_id,
                    c.coefficient
                ));
            }
            output.push('\n');
        }

        output.push_str("## Model\n\n");
        output.push_str(&format!("- **Alpha:** {}\n", a.alpha));
        output.push_str(&format!("- **Intercept:** {:.6}\n", a.intercept));
        output.push_str(&format!("- **Factors fitted:** {}\n", a.coefficients.len()));
        output.push_str(&format!("- **Factors dropped:** {}\n", a.dropped.len()));

        output
    }
}

impl fmt::Display for AttributionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Attribution for {} ({}):",
            self.portfolio_id, self.attribution.window
        )?;
        for c in self.positive() {
            writeln!(f, "  + {}: {:.4}", self.label(&c.key), c.coefficient)?;
        }
        for c in self.negative() {
            writeln!(f, "  - {}: {:.4}", self.label(&c.key), c.coefficient)?;
        }
        Ok(())
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}
