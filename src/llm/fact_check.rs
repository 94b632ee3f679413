use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub is_accurate: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Verification {
    pub fn accurate() -> Self {
        Self {
            is_accurate: true,
            issues: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Text appended to a flagged summary. Only the first two issues are
    /// spelled out.
    pub fn warning(&self) -> Option<String> {
        if self.is_accurate {
            return None;
        }

        let suggestion = self
            .suggestions
            .first()
            .map(String::as_str)
            .unwrap_or("Review for accuracy");

        if self.issues.is_empty() {
            return Some(format!(
                "\n[FACT CHECK WARNING: accuracy issues detected. {}]",
                suggestion
            ));
        }

        let mut issues_text = self
            .issues
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");
        if self.issues.len() > 2 {
            issues_text.push_str(&format!("; +{} more issues", self.issues.len() - 2));
        }

        Some(format!(
            "\n[FACT CHECK WARNING: {} accuracy issues - {}. {}]",
            self.issues.len(),
            issues_text,
            suggestion
        ))
    }
}

pub trait FactChecker: Send + Sync {
    fn verify(&self, source: &str, summary: &str) -> Verification;
}

/// Flags figures (amounts, percentages, years, counts) quoted in a summary
/// that never appear in the source text.
pub struct FigureChecker {
    figure: Regex,
}

impl FigureChecker {
    pub fn new() -> Self {
        Self {
            figure: Regex::new(r"\$?\d[\d,]*(?:\.\d+)?%?").expect("figure pattern is valid"),
        }
    }

    fn is_significant(token: &str) -> bool {
        let digits = token.chars().filter(|c| c.is_ascii_digit()).count();
        digits >= 2 || token.starts_with('$') || token.ends_with('%')
    }
}

impl Default for FigureChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(text: &str) -> String {
    text.replace(',', "")
}

impl FactChecker for FigureChecker {
    fn verify(&self, source: &str, summary: &str) -> Verification {
        let source = normalize(source);
        let mut issues = Vec::new();

        for m in self.figure.find_iter(summary) {
            let token = m.as_str().trim_end_matches(|c: char| c == ',' || c == '.');
            if !Self::is_significant(token) {
                continue;
            }
            let bare = normalize(token.trim_start_matches('$').trim_end_matches('%'));
            if bare.is_empty() || source.contains(&bare) {
                continue;
            }
            let issue = format!("figure '{}' not found in source", token);
            if !issues.contains(&issue) {
                issues.push(issue);
            }
        }

        if issues.is_empty() {
            Verification::accurate()
        } else {
            Verification {
                is_accurate: false,
                issues,
                suggestions: vec!["Review for accuracy".to_string()],
            }
        }
    }
}
