//! Line grammar for the goal file.
//!
//! Every line of a goal document classifies into exactly one [`Line`]
//! variant.  Folding the classified lines produces a [`Goal`]; rendering is
//! the pure inverse, so `parse(render(goal)) == goal` holds for any goal
//! whose texts stay on one line and avoid the literal weight marker.
//! Mutations work on the classified form and carry [`Line::Other`] entries
//! through verbatim, which is what keeps interleaved prose intact.

use crate::model::{Goal, KeyResult};

const OBJECTIVE_PREFIX: &str = "## 主要目标";
const KR_HEADING: &str = "## 关键结果:";
const WEIGHT_OPEN: &str = " (权重: ";
const TIME_SEP: &str = ", 完成时间: ";

/// One classified line of a goal document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `## 主要目标: <text>`
    Objective(String),
    /// `- [ ] KR<n>: <content> (权重: <w>%[, 完成时间: <HH:MM>])`
    Kr(KrLine),
    /// Anything else: headings, blank lines, interleaved prose.
    Other(String),
}

/// The fields of one parsed checklist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrLine {
    pub completed: bool,
    /// 1-based display ordinal as written in the file.
    pub ordinal: usize,
    pub content: String,
    pub weight: u8,
    pub completion_time: Option<String>,
}

impl KrLine {
    /// A fresh unchecked entry.  Ordinal and weight are placeholders until
    /// the next renumber pass.
    pub fn unchecked(content: impl Into<String>) -> Self {
        Self {
            completed: false,
            ordinal: 0,
            content: content.into(),
            weight: 0,
            completion_time: None,
        }
    }

    pub fn into_kr(self) -> KeyResult {
        KeyResult {
            content: self.content,
            weight: self.weight,
            completed: self.completed,
            completion_time: self.completion_time,
        }
    }

    pub fn from_kr(ordinal: usize, kr: &KeyResult) -> Self {
        Self {
            completed: kr.completed,
            ordinal,
            content: kr.content.clone(),
            weight: kr.weight,
            completion_time: kr.completion_time.clone(),
        }
    }
}

/// Classify one raw line.  Never fails: a line that almost looks like a
/// checklist entry but does not parse falls back to [`Line::Other`] and is
/// carried untouched.
pub fn classify(raw: &str) -> Line {
    if let Some(rest) = raw.strip_prefix(OBJECTIVE_PREFIX) {
        // ASCII and full-width colons both occur in hand-edited files.
        if let Some(text) = rest.strip_prefix(':').or_else(|| rest.strip_prefix('：')) {
            return Line::Objective(text.trim().to_string());
        }
    }
    if raw.starts_with("- [") {
        match parse_kr_line(raw) {
            Some(kr) => return Line::Kr(kr),
            None => {
                tracing::debug!(line = raw, "checklist-like line did not parse, kept verbatim");
            }
        }
    }
    Line::Other(raw.to_string())
}

fn parse_kr_line(raw: &str) -> Option<KrLine> {
    let rest = raw.strip_prefix("- [")?;
    let mut chars = rest.chars();
    let completed = match chars.next()? {
        'x' => true,
        ' ' => false,
        _ => return None,
    };
    let rest = chars.as_str().strip_prefix("] KR")?;

    let colon = rest.find(": ")?;
    let ordinal: usize = rest[..colon].parse().ok()?;
    let rest = &rest[colon + 2..];

    // Content runs to the first weight marker; a content containing the
    // literal marker cannot round-trip and is documented as out of scope.
    let open = rest.find(WEIGHT_OPEN)?;
    let content = rest[..open].to_string();
    let tail = &rest[open + WEIGHT_OPEN.len()..];

    let percent = tail.find('%')?;
    let weight: u8 = tail[..percent].parse().ok()?;
    let tail = &tail[percent + 1..];

    let (completion_time, tail) = match tail.strip_prefix(TIME_SEP) {
        Some(timed) => {
            let close = timed.find(')')?;
            let stamp = &timed[..close];
            if stamp.is_empty() || !stamp.chars().all(|c| c.is_ascii_digit() || c == ':') {
                return None;
            }
            (Some(stamp.to_string()), &timed[close + 1..])
        }
        None => (None, tail.strip_prefix(')')?),
    };
    if !tail.trim().is_empty() {
        return None;
    }

    Some(KrLine {
        completed,
        ordinal,
        content,
        weight,
        completion_time,
    })
}

/// Render one classified line back to its file form.  Exact inverse of
/// [`classify`] for lines that parse.
pub fn render_line(line: &Line) -> String {
    match line {
        Line::Objective(text) => format!("{OBJECTIVE_PREFIX}: {text}"),
        Line::Kr(kr) => render_kr_line(kr),
        Line::Other(raw) => raw.clone(),
    }
}

fn render_kr_line(kr: &KrLine) -> String {
    let mark = if kr.completed { 'x' } else { ' ' };
    match &kr.completion_time {
        Some(time) => format!(
            "- [{mark}] KR{}: {}{WEIGHT_OPEN}{}%{TIME_SEP}{time})",
            kr.ordinal, kr.content, kr.weight
        ),
        None => format!(
            "- [{mark}] KR{}: {}{WEIGHT_OPEN}{}%)",
            kr.ordinal, kr.content, kr.weight
        ),
    }
}

/// Render a goal as a complete canonical document: date heading, objective
/// heading, checklist block.  Ordinals are assigned from sequence order.
pub fn render_goal(goal: &Goal) -> String {
    let mut lines = Vec::with_capacity(goal.key_results.len() + 6);
    lines.push(format!("# {} 的目标与任务", goal.date));
    lines.push(String::new());
    lines.push(format!("{OBJECTIVE_PREFIX}: {}", goal.objective));
    lines.push(String::new());
    lines.push(KR_HEADING.to_string());
    lines.push(String::new());
    for (idx, kr) in goal.key_results.iter().enumerate() {
        lines.push(render_kr_line(&KrLine::from_kr(idx + 1, kr)));
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// A goal file as a sequence of classified lines.
///
/// This is the working form for every mutation: read the file, reshape the
/// `Kr` entries, write all lines back.  `Other` lines pass through verbatim
/// and keep their positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub lines: Vec<Line>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(classify).collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut text = self
            .lines
            .iter()
            .map(render_line)
            .collect::<Vec<_>>()
            .join("\n");
        text.push('\n');
        text
    }

    /// Fold into a goal.  The last objective line wins; checklist entries
    /// contribute in file order regardless of their written ordinals; other
    /// lines are ignored.
    pub fn goal(&self, date: impl Into<String>) -> Goal {
        let mut objective = String::new();
        let mut key_results = Vec::new();
        for line in &self.lines {
            match line {
                Line::Objective(text) => objective = text.clone(),
                Line::Kr(kr) => key_results.push(kr.clone().into_kr()),
                Line::Other(_) => {}
            }
        }
        Goal {
            date: date.into(),
            objective,
            key_results,
        }
    }

    /// Indices into `lines` of every checklist entry, in file order.
    pub fn kr_positions(&self) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(idx, line)| matches!(line, Line::Kr(_)).then_some(idx))
            .collect()
    }

    /// Rewrite every checklist entry's ordinal to its sequence position and
    /// its weight per [`crate::model::rebalance`].  Runs after any mutation
    /// that changes the set or order of entries.
    pub fn renumber_and_rebalance(&mut self) {
        let count = self.kr_positions().len();
        let mut weights = crate::model::rebalance(count).into_iter();
        let mut ordinal = 0;
        for line in &mut self.lines {
            if let Line::Kr(kr) = line {
                ordinal += 1;
                kr.ordinal = ordinal;
                if let Some(weight) = weights.next() {
                    kr.weight = weight;
                }
            }
        }
    }
}
